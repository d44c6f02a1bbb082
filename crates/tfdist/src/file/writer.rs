// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Append-only STF file writer.
//!
//! The writer walks an STF with the const visitor, collecting one
//! `(DataHeader, payload)` pair per HB frame in readout order, then emits
//! the record in one pass and flushes.
//!
//! I/O discipline: a 256 KiB user buffer backs the stream; writes of
//! 256 KiB or more bypass it, smaller writes are issued in chunks of at
//! most 512 bytes to stay clear of the platform's small-write pathology on
//! buffered streams.

use super::meta::{file_data_header, StfFileMeta};
use super::FormatError;
use crate::data::{EquipmentHbFrames, StfConstVisitor, SubTimeFrame};
use crate::headers::DataHeader;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

const BUF_SIZE: usize = 256 << 10;
const CHUNK_SIZE: usize = 512;

/// Collects the on-disk block list of one STF in readout order.
#[derive(Default)]
struct BlockCollector<'a> {
    headers: Vec<DataHeader>,
    blocks: Vec<&'a [u8]>,
}

impl<'a> StfConstVisitor<'a> for BlockCollector<'a> {
    fn visit_equipment(&mut self, eq: &'a EquipmentHbFrames) {
        let id = eq.equipment_identifier();
        for frame in eq.frames() {
            self.headers.push(DataHeader::new(
                id.data_description,
                id.data_origin,
                id.sub_specification,
                frame.len() as u64,
            ));
            self.blocks.push(frame.data());
        }
    }

    fn visit_stf(&mut self, stf: &'a SubTimeFrame) {
        for eq in stf.readout.values() {
            eq.accept_const(self);
        }
    }
}

/// Append-only writer for one STF file.
pub struct StfFileWriter {
    file: BufWriter<File>,
    written: u64,
}

impl StfFileWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, FormatError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        let written = file.metadata()?.len();

        Ok(Self {
            file: BufWriter::with_capacity(BUF_SIZE, file),
            written,
        })
    }

    /// Bytes written to the file so far.
    pub fn size(&self) -> u64 {
        self.written
    }

    fn buffered_write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        if bytes.len() >= BUF_SIZE {
            // large enough to skip the buffer entirely
            self.file.flush()?;
            self.file.get_mut().write_all(bytes)
        } else {
            for chunk in bytes.chunks(CHUNK_SIZE) {
                self.file.write_all(chunk)?;
            }
            Ok(())
        }
    }

    /// Write one STF record and flush. Returns the record size in bytes.
    pub fn write(&mut self, stf: &SubTimeFrame) -> Result<u64, FormatError> {
        let mut collector = BlockCollector::default();
        stf.accept_const(&mut collector);
        debug_assert_eq!(collector.headers.len(), collector.blocks.len());

        let stf_size_in_file = Self::stf_size_in_file(&collector);
        let meta = StfFileMeta::new(stf_size_in_file);

        self.buffered_write(&file_data_header().to_vec())?;
        self.buffered_write(&meta.to_vec())?;

        for (header, block) in collector.headers.iter().zip(&collector.blocks) {
            self.buffered_write(&header.to_vec())?;
            self.buffered_write(block)?;
        }

        self.file.flush()?;
        self.written += stf_size_in_file;
        Ok(stf_size_in_file)
    }

    fn stf_size_in_file(collector: &BlockCollector<'_>) -> u64 {
        let mut size = (DataHeader::SIZE + StfFileMeta::SIZE) as u64;
        size += (collector.headers.len() * DataHeader::SIZE) as u64;
        size += collector.blocks.iter().map(|b| b.len() as u64).sum::<u64>();
        size
    }
}

impl Drop for StfFileWriter {
    fn drop(&mut self) {
        let _ = self.file.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::EquipmentIdentifier;
    use crate::headers::{DataDescription, DataOrigin};
    use crate::transport::Message;
    use tempfile::tempdir;

    fn sample_stf() -> SubTimeFrame {
        let eq = EquipmentIdentifier::new(DataDescription::CRU_DATA, DataOrigin::CRU, 3);
        let mut stf = SubTimeFrame::new(0, 17);
        stf.add_hb_frame(eq, Message::from_vec(vec![0xab; 100]))
            .expect("add");
        stf.add_hb_frame(eq, Message::from_vec(vec![0xcd; 50]))
            .expect("add");
        stf
    }

    #[test]
    fn test_write_reports_record_size() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("000000");

        let mut writer = StfFileWriter::create(&path).expect("create");
        let size = writer.write(&sample_stf()).expect("write");

        // header + meta + 2 * (block header + payload)
        let expected = (80 + 24 + 80 + 100 + 80 + 50) as u64;
        assert_eq!(size, expected);
        assert_eq!(writer.size(), expected);
        assert_eq!(std::fs::metadata(&path).expect("stat").len(), expected);
    }

    #[test]
    fn test_records_append() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("000000");

        let mut writer = StfFileWriter::create(&path).expect("create");
        let first = writer.write(&sample_stf()).expect("write");
        let second = writer.write(&sample_stf()).expect("write");

        assert_eq!(writer.size(), first + second);
        assert_eq!(
            std::fs::metadata(&path).expect("stat").len(),
            first + second
        );
    }

    #[test]
    fn test_record_starts_with_sentinel() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("000000");

        StfFileWriter::create(&path)
            .expect("create")
            .write(&sample_stf())
            .expect("write");

        let bytes = std::fs::read(&path).expect("read file");
        assert_eq!(&bytes[..DataHeader::SIZE], &file_data_header().to_vec()[..]);

        let meta = StfFileMeta::read(&mut std::io::Cursor::new(&bytes[DataHeader::SIZE..]))
            .expect("meta");
        assert_eq!(meta.stf_size_in_file, bytes.len() as u64);
    }
}
