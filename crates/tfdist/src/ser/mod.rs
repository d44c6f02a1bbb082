// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire serializers: SubTimeFrame <-> transport message batches.
//!
//! Two layouts exist, selected per device in configuration:
//!
//! ```text
//! interleaved (one batch):
//!   [ stf_hdr | eq1_hdr eq1_m1 .. eq1_mK | eq2_hdr eq2_m1 .. | ... ]
//!
//! split (two batches; data batch omitted for an equipment-less STF):
//!   [ stf_hdr | eq1_hdr | eq2_hdr | ... ]
//!   [ eq1_m1 .. eq1_mK | eq2_m1 .. | ... ]
//! ```
//!
//! Serialization consumes the STF: headers and frame messages are moved
//! into the batch and the source is left empty. Deserialization must
//! consume its input exactly; residual messages are a framing error, and on
//! any error the output STF stays empty.

mod interleaved;
mod split;

pub use interleaved::{InterleavedDeserializer, InterleavedSerializer};
pub use split::{SplitDeserializer, SplitSerializer};

use crate::headers::{header_type, DataHeader, HeaderError, StfHeader};
use crate::transport::{Message, TransportError};
use thiserror::Error;

/// Wire layout selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireLayout {
    #[default]
    Interleaved,
    Split,
}

impl std::str::FromStr for WireLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "interleaved" => Ok(WireLayout::Interleaved),
            "split" => Ok(WireLayout::Split),
            other => Err(format!("unknown wire layout '{other}'")),
        }
    }
}

/// Wire framing and transport errors.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("header decode failed: {0}")]
    Header(#[from] HeaderError),

    #[error("message stream truncated: expected {expected} more message(s)")]
    Truncated { expected: usize },

    #[error("residual messages after deserialization: {count}")]
    Residual { count: usize },

    #[error("cannot serialize an empty SubTimeFrame")]
    EmptyStf,
}

/// Decode and type-check an STF header message.
pub(crate) fn decode_stf_header(msg: &Message) -> Result<StfHeader, WireError> {
    let hdr = StfHeader::from_slice(msg.data())?;
    if hdr.data.base.description != header_type::STF {
        return Err(WireError::Header(HeaderError::UnexpectedType {
            expected: header_type::STF,
            got: hdr.data.base.description,
        }));
    }
    Ok(hdr)
}

/// Decode and type-check an equipment header message.
pub(crate) fn decode_equipment_header(msg: &Message) -> Result<DataHeader, WireError> {
    let hdr = DataHeader::from_slice(msg.data())?;
    if hdr.base.description != header_type::DATA {
        return Err(WireError::Header(HeaderError::UnexpectedType {
            expected: header_type::DATA,
            got: hdr.base.description,
        }));
    }
    Ok(hdr)
}
