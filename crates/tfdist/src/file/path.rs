// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! File-name patterns and session directories for the file sink.

use chrono::{DateTime, Local};
use std::io;
use std::path::{Path, PathBuf};

/// Expand a sink file-name pattern.
///
/// Tokens: `%n` zero-padded six-digit file index, `%D` date (`%F`),
/// `%T` time (`%H_%M_%S`).
pub fn expand_file_name(pattern: &str, index: u64, now: DateTime<Local>) -> String {
    pattern
        .replace("%n", &format!("{index:06}"))
        .replace("%D", &now.format("%F").to_string())
        .replace("%T", &now.format("%H_%M_%S").to_string())
}

/// Pick the next session directory name under `root`: one past the largest
/// numeric child name, starting at `0`.
pub fn next_session_dir(root: &Path) -> io::Result<PathBuf> {
    let mut next: u64 = 0;
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if let Some(n) = entry
            .file_name()
            .to_str()
            .and_then(|s| s.parse::<u64>().ok())
        {
            next = next.max(n + 1);
        }
    }
    Ok(root.join(next.to_string()))
}
