// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! STF file meta record and the file-level sentinel header.

use crate::headers::{DataDescription, DataHeader, DataOrigin};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// Version of the STF file format.
pub const STF_FILE_VERSION: u64 = 1;

/// File-level header opening every STF record. The reader validates the
/// record against this sentinel before trusting the meta that follows.
pub fn file_data_header() -> DataHeader {
    DataHeader::new(
        DataDescription::FILE_SUB_TIME_FRAME,
        DataOrigin::FLP,
        0,
        StfFileMeta::SIZE as u64,
    )
}

/// Meta record following the file-level header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StfFileMeta {
    /// Format version, monotonically increasing.
    pub version: u64,
    /// Size of the record in the file, including the leading file-level
    /// header and this meta record.
    pub stf_size_in_file: u64,
    /// Wall-clock write time in milliseconds since the epoch.
    pub write_time_ms: u64,
}

impl StfFileMeta {
    pub const SIZE: usize = 24;

    pub fn new(stf_size_in_file: u64) -> Self {
        let write_time_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            version: STF_FILE_VERSION,
            stf_size_in_file,
            write_time_ms,
        }
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.version)?;
        w.write_u64::<LittleEndian>(self.stf_size_in_file)?;
        w.write_u64::<LittleEndian>(self.write_time_ms)?;
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            version: r.read_u64::<LittleEndian>()?,
            stf_size_in_file: r.read_u64::<LittleEndian>()?,
            write_time_ms: r.read_u64::<LittleEndian>()?,
        })
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        let _ = self.write(&mut buf);
        buf
    }
}
