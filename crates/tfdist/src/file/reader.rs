// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Positional STF file reader.
//!
//! Validates the file-level sentinel of each record, then rebuilds the STF
//! block by block, allocating a fresh transport message per payload. Any
//! framing mismatch closes the file and marks the reader unusable; the
//! caller receives an error and no partial STF.
//!
//! The record stream does not carry STF ids; the caller supplies the id for
//! each record it reads.

use super::meta::{file_data_header, StfFileMeta};
use super::FormatError;
use crate::data::{EquipmentIdentifier, SubTimeFrame};
use crate::headers::DataHeader;
use crate::transport::Message;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::warn;

/// Reader over one STF file.
pub struct StfFileReader {
    file: Option<BufReader<File>>,
    file_size: u64,
}

impl StfFileReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FormatError> {
        let file = File::open(path.as_ref())?;
        let file_size = file.metadata()?.len();

        Ok(Self {
            file: Some(BufReader::new(file)),
            file_size,
        })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Whether a previous failure made the reader unusable.
    pub fn is_usable(&self) -> bool {
        self.file.is_some()
    }

    /// Read the next STF record, assigning it the given id.
    ///
    /// Returns `Ok(None)` at a clean end of file. Any framing error closes
    /// the file; further reads report [`FormatError::Unusable`].
    pub fn read(&mut self, stf_id: u64) -> Result<Option<SubTimeFrame>, FormatError> {
        match self.read_inner(stf_id) {
            Ok(v) => Ok(v),
            Err(e) => {
                self.file = None;
                Err(e)
            }
        }
    }

    fn read_inner(&mut self, stf_id: u64) -> Result<Option<SubTimeFrame>, FormatError> {
        let file_size = self.file_size;
        let file = self.file.as_mut().ok_or(FormatError::Unusable)?;

        let start = file.stream_position()?;
        if start >= file_size {
            return Ok(None);
        }

        let sentinel = DataHeader::read(file).map_err(|e| {
            warn!("reading record header failed: {e}");
            FormatError::BadSentinel
        })?;
        if sentinel != file_data_header() {
            warn!("record does not start with the STF file sentinel");
            return Err(FormatError::BadSentinel);
        }

        let meta = StfFileMeta::read(file)?;
        let record_overhead = (DataHeader::SIZE + StfFileMeta::SIZE) as u64;

        if meta.stf_size_in_file == record_overhead {
            warn!("meta-only STF record, no equipment data");
            return Err(FormatError::EmptyRecord);
        }

        if start + meta.stf_size_in_file > file_size {
            return Err(FormatError::ShortFile {
                required: meta.stf_size_in_file,
                available: file_size - start,
            });
        }

        let data_size = meta.stf_size_in_file - record_overhead;
        let mut stf = SubTimeFrame::new(0, stf_id);

        let mut consumed = 0u64;
        while consumed < data_size {
            let block_header = DataHeader::read(file)?;
            let mut payload = Message::alloc(block_header.payload_size as usize);
            file.read_exact(payload.data_mut())?;

            consumed += DataHeader::SIZE as u64 + block_header.payload_size;
            if consumed > data_size {
                return Err(FormatError::BlockOverrun {
                    expected: data_size,
                    got: consumed,
                });
            }

            stf.add_hb_frame(EquipmentIdentifier::from(&block_header), payload)?;
        }

        Ok(Some(stf))
    }

    /// Skip the next record without rebuilding it.
    pub fn skip(&mut self) -> Result<bool, FormatError> {
        let file_size = self.file_size;
        let file = self.file.as_mut().ok_or(FormatError::Unusable)?;

        let start = file.stream_position()?;
        if start >= file_size {
            return Ok(false);
        }

        let sentinel = DataHeader::read(file).map_err(|_| FormatError::BadSentinel)?;
        if sentinel != file_data_header() {
            self.file = None;
            return Err(FormatError::BadSentinel);
        }
        let meta = StfFileMeta::read(file)?;

        if start + meta.stf_size_in_file > file_size {
            self.file = None;
            return Err(FormatError::ShortFile {
                required: meta.stf_size_in_file,
                available: file_size - start,
            });
        }

        file.seek(SeekFrom::Start(start + meta.stf_size_in_file))?;
        Ok(true)
    }
}
