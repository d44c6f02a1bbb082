// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! On-disk STF stream.
//!
//! A file is a plain concatenation of STF records; each record is
//! self-describing and the stream is append-only.
//!
//! # File Layout
//!
//! ```text
//! File      := { StfRecord }*
//! StfRecord := FileDataHeader | Meta | { BlockRecord }*
//!
//! FileDataHeader := DataHeader {                       (80 bytes)
//!     data_description = "FILESUBTIMEFRAME",
//!     data_origin      = "FLP",
//!     payload_size     = 24,
//! }
//! Meta        := version (8) | stf_size_in_file (8)    (24 bytes)
//!              | write_time_ms (8)
//! BlockRecord := DataHeader (80) | payload[payload_size]
//! ```
//!
//! `stf_size_in_file` counts from the start of the FileDataHeader to the end
//! of the record's last payload. All integers little-endian, no padding.

mod meta;
mod path;
mod reader;
mod sink;
mod writer;

pub use meta::{file_data_header, StfFileMeta, STF_FILE_VERSION};
pub use path::{expand_file_name, next_session_dir};
pub use reader::StfFileReader;
pub use sink::{SinkConfig, SinkHandle, StfFileSink};
pub use writer::StfFileWriter;

use crate::data::StfError;
use crate::headers::HeaderError;
use std::io;
use thiserror::Error;

/// STF file format errors.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("header decode failed: {0}")]
    Header(#[from] HeaderError),

    #[error("not an STF record (bad file-level header)")]
    BadSentinel,

    #[error("not enough data in file: required {required}, available {available}")]
    ShortFile { required: u64, available: u64 },

    #[error("record block sizes exceed the record size: expected {expected}, got {got}")]
    BlockOverrun { expected: u64, got: u64 },

    #[error("meta-only record: STF has no equipment data")]
    EmptyRecord,

    #[error("reader is unusable after a previous failure")]
    Unusable,

    #[error("sink configuration invalid: {0}")]
    Config(String),

    #[error(transparent)]
    Stf(#[from] StfError),
}
