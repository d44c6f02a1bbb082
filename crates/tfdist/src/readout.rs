// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Readout wire model.
//!
//! Each update from a readout link is a transport batch whose first message
//! is a [`ReadoutStfHeader`]; the remaining messages are the HB frames of
//! one equipment for one STF interval.
//!
//! ```text
//! ReadoutStfHeader (16 bytes)
//! +-----------------------------------------------------+
//! | stf_id (8) | hb_frame_count (4) | link_id (1) | pad |
//! +-----------------------------------------------------+
//! ```

use crate::transport::Message;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};
use thiserror::Error;

/// Readout header decode errors.
#[derive(Debug, Error)]
pub enum ReadoutError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("readout header truncated: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
}

/// Per-update header prepended by the readout process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadoutStfHeader {
    /// STF interval this update belongs to.
    pub stf_id: u64,
    /// Number of HB frame messages following this header.
    pub hb_frame_count: u32,
    /// Front-end link that produced the frames.
    pub link_id: u8,
}

impl ReadoutStfHeader {
    pub const SIZE: usize = 16;

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.stf_id)?;
        w.write_u32::<LittleEndian>(self.hb_frame_count)?;
        w.write_u8(self.link_id)?;
        w.write_all(&[0u8; 3])?; // pad
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self, ReadoutError> {
        let stf_id = r.read_u64::<LittleEndian>()?;
        let hb_frame_count = r.read_u32::<LittleEndian>()?;
        let link_id = r.read_u8()?;
        let mut pad = [0u8; 3];
        r.read_exact(&mut pad)?;

        Ok(Self {
            stf_id,
            hb_frame_count,
            link_id,
        })
    }

    pub fn to_message(&self) -> Message {
        let mut buf = Vec::with_capacity(Self::SIZE);
        let _ = self.write(&mut buf);
        Message::from_vec(buf)
    }

    pub fn from_message(msg: &Message) -> Result<Self, ReadoutError> {
        if msg.len() < Self::SIZE {
            return Err(ReadoutError::Truncated {
                need: Self::SIZE,
                have: msg.len(),
            });
        }
        Self::read(&mut Cursor::new(msg.data()))
    }
}
