// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process channel over crossbeam MPMC queues.
//!
//! A [`MemChannel`] endpoint can both send and receive; [`MemChannel::pair`]
//! cross-wires two endpoints. Batches are delivered intact and in order.
//! `stop()` marks the endpoint's receive side; a blocked receiver drains
//! pending batches first, then observes [`TransportError::Stopped`].

use super::{Channel, Message, TransportError};
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const STOP_POLL: Duration = Duration::from_millis(50);

/// In-process transport endpoint.
pub struct MemChannel {
    tx: Sender<Vec<Message>>,
    rx: Receiver<Vec<Message>>,
    stopped: Arc<AtomicBool>,
}

impl MemChannel {
    /// Create two connected endpoints.
    pub fn pair() -> (MemChannel, MemChannel) {
        let (a_tx, a_rx) = unbounded();
        let (b_tx, b_rx) = unbounded();

        let a = MemChannel {
            tx: b_tx,
            rx: a_rx,
            stopped: Arc::new(AtomicBool::new(false)),
        };
        let b = MemChannel {
            tx: a_tx,
            rx: b_rx,
            stopped: Arc::new(AtomicBool::new(false)),
        };
        (a, b)
    }

    /// Stop this endpoint's receive side. Pending batches stay readable;
    /// once drained, [`Channel::recv`] reports [`TransportError::Stopped`].
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Non-blocking receive; `None` when no batch is pending.
    pub fn try_recv(&self) -> Option<Vec<Message>> {
        self.rx.try_recv().ok()
    }
}

impl Channel for MemChannel {
    fn send(&self, parts: Vec<Message>) -> Result<(), TransportError> {
        self.tx.send(parts).map_err(|_| TransportError::Closed)
    }

    fn recv(&self) -> Result<Vec<Message>, TransportError> {
        loop {
            // drain before honoring stop
            if let Ok(parts) = self.rx.try_recv() {
                return Ok(parts);
            }
            if self.stopped.load(Ordering::Acquire) {
                return Err(TransportError::Stopped);
            }
            match self.rx.recv_timeout(STOP_POLL) {
                Ok(parts) => return Ok(parts),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(TransportError::Stopped),
            }
        }
    }
}
