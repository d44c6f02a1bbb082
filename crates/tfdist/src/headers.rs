// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Self-describing header records.
//!
//! Every record starts with a fixed [`BaseHeader`] carrying its own size, a
//! type tag, and a continuation flag, so readers can walk a *header stack*
//! (a contiguous chain of records) by successive `header_size` advances
//! without knowing every type in it.
//!
//! # Record Layouts (little-endian, no padding between records)
//!
//! ```text
//! BaseHeader (32 bytes)
//! +---------------------------------------------------------+
//! | magic "TFDH" (4) | header_size (4) | flags (4)          |
//! | header_version (4) | description (8) | serialization (8)|
//! +---------------------------------------------------------+
//!
//! DataHeader (80 bytes) = BaseHeader +
//! +---------------------------------------------------------+
//! | data_description (16) | data_origin (4) | reserved (4)  |
//! | payload_serialization (8) | sub_specification (8)       |
//! | payload_size (8)                                        |
//! +---------------------------------------------------------+
//!
//! StfHeader (96) = DataHeader + stf_id (8) | max_hb_frames (4) | rsv (4)
//! HbFrameHeader (40) = BaseHeader + hb_frame_id (4) | reserved (4)
//! ProcessingHeader (48) = BaseHeader + start_time (8) | duration (8)
//! ```
//!
//! Flags bit 0 (`FLAG_NEXT_HEADER`) marks that another record follows in the
//! same stack; the last record of a stack has the bit clear.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};
use thiserror::Error;

/// Magic bytes opening every header record.
pub const MAGIC: [u8; 4] = *b"TFDH";

/// Set in [`BaseHeader::flags`] when another record follows in the stack.
pub const FLAG_NEXT_HEADER: u32 = 0x01;

/// Payload/record serialization method tags (8 bytes, NUL padded).
pub mod serialization {
    /// Raw bytes, no serialization applied.
    pub const NONE: [u8; 8] = *b"NONE\0\0\0\0";
}

/// Well-known header type tags for [`BaseHeader::description`].
pub mod header_type {
    pub const DATA: [u8; 8] = *b"DataHead";
    pub const STF: [u8; 8] = *b"StfHead\0";
    pub const HB_FRAME: [u8; 8] = *b"HBFrame\0";
    pub const PROCESSING: [u8; 8] = *b"Process\0";
}

/// Data description: what a payload contains (16 bytes, NUL padded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataDescription(pub [u8; 16]);

impl DataDescription {
    pub const CRU_DATA: DataDescription = DataDescription::from_str("CRUDATA");
    pub const RAW_DATA: DataDescription = DataDescription::from_str("RAWDATA");
    pub const SUB_TIME_FRAME: DataDescription = DataDescription::from_str("SUBTIMEFRAME");
    pub const FILE_SUB_TIME_FRAME: DataDescription = DataDescription::from_str("FILESUBTIMEFRAME");
    pub const ANY: DataDescription = DataDescription([b'*'; 16]);

    /// Build from a string literal, NUL padded. Truncates past 16 bytes.
    pub const fn from_str(s: &str) -> Self {
        let bytes = s.as_bytes();
        let mut out = [0u8; 16];
        let mut i = 0;
        while i < bytes.len() && i < 16 {
            out[i] = bytes[i];
            i += 1;
        }
        DataDescription(out)
    }

    pub fn as_str(&self) -> &str {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(16);
        std::str::from_utf8(&self.0[..end]).unwrap_or("<non-utf8>")
    }
}

impl std::fmt::Display for DataDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data origin: which subsystem produced a payload (4 bytes, NUL padded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataOrigin(pub [u8; 4]);

impl DataOrigin {
    pub const CRU: DataOrigin = DataOrigin::from_str("CRU");
    pub const FLP: DataOrigin = DataOrigin::from_str("FLP");
    pub const TPC: DataOrigin = DataOrigin::from_str("TPC");
    pub const ITS: DataOrigin = DataOrigin::from_str("ITS");
    pub const ANY: DataOrigin = DataOrigin([b'*', b'*', b'*', 0]);

    pub const fn from_str(s: &str) -> Self {
        let bytes = s.as_bytes();
        let mut out = [0u8; 4];
        let mut i = 0;
        while i < bytes.len() && i < 4 {
            out[i] = bytes[i];
            i += 1;
        }
        DataOrigin(out)
    }

    pub fn as_str(&self) -> &str {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(4);
        std::str::from_utf8(&self.0[..end]).unwrap_or("<non-utf8>")
    }
}

impl std::fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header decode errors.
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("bad header magic")]
    BadMagic,

    #[error("unexpected header type: expected {expected:?}, got {got:?}")]
    UnexpectedType { expected: [u8; 8], got: [u8; 8] },

    #[error("header record truncated: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
}

/// Fixed prefix of every header record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseHeader {
    pub header_size: u32,
    pub flags: u32,
    pub header_version: u32,
    pub description: [u8; 8],
    pub serialization: [u8; 8],
}

impl BaseHeader {
    pub const SIZE: usize = 32;

    pub fn new(header_size: u32, description: [u8; 8]) -> Self {
        Self {
            header_size,
            flags: 0,
            header_version: 1,
            description,
            serialization: serialization::NONE,
        }
    }

    pub fn has_next(&self) -> bool {
        (self.flags & FLAG_NEXT_HEADER) != 0
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&MAGIC)?;
        w.write_u32::<LittleEndian>(self.header_size)?;
        w.write_u32::<LittleEndian>(self.flags)?;
        w.write_u32::<LittleEndian>(self.header_version)?;
        w.write_all(&self.description)?;
        w.write_all(&self.serialization)?;
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self, HeaderError> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(HeaderError::BadMagic);
        }

        let header_size = r.read_u32::<LittleEndian>()?;
        let flags = r.read_u32::<LittleEndian>()?;
        let header_version = r.read_u32::<LittleEndian>()?;
        let mut description = [0u8; 8];
        r.read_exact(&mut description)?;
        let mut serialization = [0u8; 8];
        r.read_exact(&mut serialization)?;

        Ok(Self {
            header_size,
            flags,
            header_version,
            description,
            serialization,
        })
    }
}

/// Header describing one payload: identity triple plus payload accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    pub base: BaseHeader,
    pub data_description: DataDescription,
    pub data_origin: DataOrigin,
    pub payload_serialization: [u8; 8],
    pub sub_specification: u64,
    pub payload_size: u64,
}

impl DataHeader {
    pub const SIZE: usize = 80;

    pub fn new(
        data_description: DataDescription,
        data_origin: DataOrigin,
        sub_specification: u64,
        payload_size: u64,
    ) -> Self {
        Self {
            base: BaseHeader::new(Self::SIZE as u32, header_type::DATA),
            data_description,
            data_origin,
            payload_serialization: serialization::NONE,
            sub_specification,
            payload_size,
        }
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.base.write(w)?;
        w.write_all(&self.data_description.0)?;
        w.write_all(&self.data_origin.0)?;
        w.write_u32::<LittleEndian>(0)?; // reserved
        w.write_all(&self.payload_serialization)?;
        w.write_u64::<LittleEndian>(self.sub_specification)?;
        w.write_u64::<LittleEndian>(self.payload_size)?;
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self, HeaderError> {
        let base = BaseHeader::read(r)?;
        Self::read_body(base, r)
    }

    fn read_body<R: Read>(base: BaseHeader, r: &mut R) -> Result<Self, HeaderError> {
        let mut data_description = [0u8; 16];
        r.read_exact(&mut data_description)?;
        let mut data_origin = [0u8; 4];
        r.read_exact(&mut data_origin)?;
        let _reserved = r.read_u32::<LittleEndian>()?;
        let mut payload_serialization = [0u8; 8];
        r.read_exact(&mut payload_serialization)?;
        let sub_specification = r.read_u64::<LittleEndian>()?;
        let payload_size = r.read_u64::<LittleEndian>()?;

        Ok(Self {
            base,
            data_description: DataDescription(data_description),
            data_origin: DataOrigin(data_origin),
            payload_serialization,
            sub_specification,
            payload_size,
        })
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        // writing to a Vec cannot fail
        let _ = self.write(&mut buf);
        buf
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < Self::SIZE {
            return Err(HeaderError::Truncated {
                need: Self::SIZE,
                have: bytes.len(),
            });
        }
        Self::read(&mut Cursor::new(bytes))
    }
}

/// Top-level header of a SubTimeFrame: a [`DataHeader`] plus the time frame
/// identifier and the per-equipment HB frame bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StfHeader {
    pub data: DataHeader,
    pub stf_id: u64,
    pub max_hb_frames: u32,
}

impl StfHeader {
    pub const SIZE: usize = 96;

    pub fn new(stf_id: u64) -> Self {
        let mut data = DataHeader::new(
            DataDescription::SUB_TIME_FRAME,
            DataOrigin::FLP,
            0,
            0, // holds the number of equipments
        );
        data.base.header_size = Self::SIZE as u32;
        data.base.description = header_type::STF;

        Self {
            data,
            stf_id,
            max_hb_frames: 0,
        }
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.data.write(w)?;
        w.write_u64::<LittleEndian>(self.stf_id)?;
        w.write_u32::<LittleEndian>(self.max_hb_frames)?;
        w.write_u32::<LittleEndian>(0)?; // reserved
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self, HeaderError> {
        let data = DataHeader::read(r)?;
        let stf_id = r.read_u64::<LittleEndian>()?;
        let max_hb_frames = r.read_u32::<LittleEndian>()?;
        let _reserved = r.read_u32::<LittleEndian>()?;

        Ok(Self {
            data,
            stf_id,
            max_hb_frames,
        })
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        let _ = self.write(&mut buf);
        buf
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < Self::SIZE {
            return Err(HeaderError::Truncated {
                need: Self::SIZE,
                have: bytes.len(),
            });
        }
        Self::read(&mut Cursor::new(bytes))
    }
}

/// Tiny header carrying the heartbeat-frame ordinal within its equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HbFrameHeader {
    pub base: BaseHeader,
    pub hb_frame_id: u32,
}

impl HbFrameHeader {
    pub const SIZE: usize = 40;

    pub fn new(hb_frame_id: u32) -> Self {
        Self {
            base: BaseHeader::new(Self::SIZE as u32, header_type::HB_FRAME),
            hb_frame_id,
        }
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.base.write(w)?;
        w.write_u32::<LittleEndian>(self.hb_frame_id)?;
        w.write_u32::<LittleEndian>(0)?; // reserved
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self, HeaderError> {
        let base = BaseHeader::read(r)?;
        let hb_frame_id = r.read_u32::<LittleEndian>()?;
        let _reserved = r.read_u32::<LittleEndian>()?;
        Ok(Self { base, hb_frame_id })
    }
}

/// Processing header consumed by the downstream framework: identifies the
/// timeslice a flattened payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingHeader {
    pub base: BaseHeader,
    pub start_time: u64,
    pub duration: u64,
}

impl ProcessingHeader {
    pub const SIZE: usize = 48;

    pub fn new(start_time: u64) -> Self {
        Self {
            base: BaseHeader::new(Self::SIZE as u32, header_type::PROCESSING),
            start_time,
            duration: 0,
        }
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.base.write(w)?;
        w.write_u64::<LittleEndian>(self.start_time)?;
        w.write_u64::<LittleEndian>(self.duration)?;
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self, HeaderError> {
        let base = BaseHeader::read(r)?;
        let start_time = r.read_u64::<LittleEndian>()?;
        let duration = r.read_u64::<LittleEndian>()?;
        Ok(Self {
            base,
            start_time,
            duration,
        })
    }
}

/// A contiguous chain of header records.
///
/// Records are appended in order; every record but the last carries
/// [`FLAG_NEXT_HEADER`]. [`HeaderStack::walk`] yields `(BaseHeader, record
/// bytes)` pairs by `header_size` advances.
#[derive(Debug, Default)]
pub struct HeaderStack {
    buf: Vec<u8>,
    // offset of the most recently pushed record, for flag fixup
    last_offset: usize,
}

impl HeaderStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an encoded record. The continuation flag of the previously
    /// last record is set, the new record's flag is cleared.
    pub fn push_record(&mut self, mut record: Vec<u8>) {
        debug_assert!(record.len() >= BaseHeader::SIZE);

        if !self.buf.is_empty() {
            self.set_last_next_flag();
        }
        // clear the continuation flag of the incoming record (offset 8)
        let flags = u32::from_le_bytes([record[8], record[9], record[10], record[11]]);
        record[8..12].copy_from_slice(&(flags & !FLAG_NEXT_HEADER).to_le_bytes());

        self.last_offset = self.buf.len();
        self.buf.append(&mut record);
    }

    fn set_last_next_flag(&mut self) {
        let off = self.last_offset + 8;
        let flags = u32::from_le_bytes([
            self.buf[off],
            self.buf[off + 1],
            self.buf[off + 2],
            self.buf[off + 3],
        ]);
        self.buf[off..off + 4].copy_from_slice(&(flags | FLAG_NEXT_HEADER).to_le_bytes());
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Walk the chain, yielding each record's base header and full bytes.
    pub fn walk(&self) -> StackWalker<'_> {
        StackWalker {
            buf: &self.buf,
            offset: 0,
            done: self.buf.is_empty(),
        }
    }

    /// Find the first record with the given type tag.
    pub fn find(&self, description: [u8; 8]) -> Option<&[u8]> {
        for rec in self.walk() {
            let (base, bytes) = rec.ok()?;
            if base.description == description {
                return Some(bytes);
            }
        }
        None
    }
}

/// Iterator over the records of a [`HeaderStack`].
pub struct StackWalker<'a> {
    buf: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> Iterator for StackWalker<'a> {
    type Item = Result<(BaseHeader, &'a [u8]), HeaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let rest = &self.buf[self.offset..];
        if rest.len() < BaseHeader::SIZE {
            self.done = true;
            return Some(Err(HeaderError::Truncated {
                need: BaseHeader::SIZE,
                have: rest.len(),
            }));
        }

        let base = match BaseHeader::read(&mut Cursor::new(rest)) {
            Ok(b) => b,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        let size = base.header_size as usize;
        if size < BaseHeader::SIZE || rest.len() < size {
            self.done = true;
            return Some(Err(HeaderError::Truncated {
                need: size,
                have: rest.len(),
            }));
        }

        let record = &rest[..size];
        self.offset += size;
        if !base.has_next() {
            self.done = true;
        }

        Some(Ok((base, record)))
    }
}
