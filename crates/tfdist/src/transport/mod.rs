// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport messages and channels.
//!
//! The pipeline hands data around as [`Message`] buffers grouped into
//! batches; one `Vec<Message>` given to [`Channel::send`] arrives as one
//! `Vec<Message>` from [`Channel::recv`] on the peer (message-boundary
//! semantics). Messages are move-only: exactly one owner at any time, and
//! dropping a message releases its buffer.
//!
//! [`MemChannel`] is the in-process implementation used by the devices and
//! the test suite. [`ChannelRegistry`] is the explicit channel table passed
//! to components that need to allocate or look up channels by id.

mod mem;

pub use mem::MemChannel;

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("channel closed by peer")]
    Closed,

    #[error("channel stopped")]
    Stopped,
}

/// A transport message: an owned byte buffer with move-only semantics.
///
/// Deliberately not `Clone`; the pipeline transfers ownership through
/// queues and channels, it never shares a message between stages.
#[derive(Debug, Default)]
pub struct Message {
    buf: Vec<u8>,
}

impl Message {
    /// Allocate a zero-filled message of the given size.
    pub fn alloc(len: usize) -> Self {
        Self {
            buf: vec![0u8; len],
        }
    }

    pub fn from_vec(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

/// A bidirectional transport endpoint carrying message batches.
pub trait Channel: Send + Sync {
    /// Send one batch. The batch boundary is preserved end-to-end.
    fn send(&self, parts: Vec<Message>) -> Result<(), TransportError>;

    /// Receive one batch, blocking until available or the channel closes.
    fn recv(&self) -> Result<Vec<Message>, TransportError>;
}

/// Explicit channel table: id -> endpoint.
///
/// Passed as a constructor dependency to components that allocate header
/// messages or look up their output by channel id. Logically const after
/// device init.
#[derive(Default, Clone)]
pub struct ChannelRegistry {
    channels: HashMap<u32, Arc<MemChannel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: u32, chan: Arc<MemChannel>) {
        self.channels.insert(id, chan);
    }

    pub fn get(&self, id: u32) -> Option<&Arc<MemChannel>> {
        self.channels.get(&id)
    }
}
