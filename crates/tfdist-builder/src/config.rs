// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! STF builder configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tfdist::file::SinkConfig;
use tfdist::ser::WireLayout;
use thiserror::Error;

/// Builder device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Name of the readout-facing input channel.
    #[serde(default = "default_input_channel")]
    pub input_channel_name: String,

    /// Name of the sender-facing output channel.
    #[serde(default = "default_output_channel")]
    pub output_channel_name: String,

    /// Number of readout links (one input thread each), in `[1, 32]`.
    #[serde(default = "default_cru_count")]
    pub cru_count: u32,

    /// Wire layout: "interleaved" or "split".
    #[serde(default = "default_wire_layout")]
    pub wire_layout: String,

    /// Enable writing of (Sub)TimeFrames to disk.
    #[serde(default)]
    pub stf_sink_enable: bool,

    /// Destination directory for (Sub)TimeFrame files.
    #[serde(default)]
    pub stf_sink_dir: PathBuf,

    /// File name pattern: %n - file index, %D - date, %T - time.
    #[serde(default = "default_sink_file_name")]
    pub stf_sink_file_name: String,

    /// Number of (Sub)TimeFrames per file.
    #[serde(default = "default_stfs_per_file")]
    pub stf_sink_max_stfs_per_file: u64,

    /// Target size for (Sub)TimeFrame files.
    #[serde(default = "default_max_file_size")]
    pub stf_sink_max_file_size: u64,
}

fn default_input_channel() -> String {
    "readout".to_string()
}

fn default_output_channel() -> String {
    "builder-stf-channel".to_string()
}

fn default_cru_count() -> u32 {
    1
}

fn default_wire_layout() -> String {
    "interleaved".to_string()
}

fn default_sink_file_name() -> String {
    "%n".to_string()
}

fn default_stfs_per_file() -> u64 {
    1
}

fn default_max_file_size() -> u64 {
    4 << 30
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            input_channel_name: default_input_channel(),
            output_channel_name: default_output_channel(),
            cru_count: default_cru_count(),
            wire_layout: default_wire_layout(),
            stf_sink_enable: false,
            stf_sink_dir: PathBuf::new(),
            stf_sink_file_name: default_sink_file_name(),
            stf_sink_max_stfs_per_file: default_stfs_per_file(),
            stf_sink_max_file_size: default_max_file_size(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),
}

impl BuilderConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cru_count < 1 || self.cru_count > 32 {
            return Err(ConfigError::InvalidValue(format!(
                "cru-count must be in [1, 32], got {}",
                self.cru_count
            )));
        }
        self.layout()?;
        if self.stf_sink_enable && self.stf_sink_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue(
                "stf-sink-dir must be specified when the sink is enabled".into(),
            ));
        }
        Ok(())
    }

    pub fn layout(&self) -> Result<WireLayout, ConfigError> {
        self.wire_layout
            .parse()
            .map_err(ConfigError::InvalidValue)
    }

    pub fn sink_config(&self) -> SinkConfig {
        SinkConfig {
            enabled: self.stf_sink_enable,
            root_dir: self.stf_sink_dir.clone(),
            file_name_pattern: self.stf_sink_file_name.clone(),
            stfs_per_file: self.stf_sink_max_stfs_per_file,
            max_file_size: self.stf_sink_max_file_size,
        }
    }
}
