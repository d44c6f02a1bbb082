// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Readout input interface: one thread per readout link.
//!
//! Each thread receives `(ReadoutStfHeader | HB frames...)` batches from its
//! link, accumulates the current STF, and pushes the finished STF to the
//! builder queue when the id advances. The STF being assembled when the
//! channel closes is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tfdist::queue::ConcurrentFifo;
use tfdist::readout::ReadoutStfHeader;
use tfdist::transport::{Channel, MemChannel, Message};
use tfdist::SubTimeFrame;
use tracing::{debug, info, warn};

/// Channel id recorded in STFs assembled by the input threads; the header
/// allocation hint for the builder's output channel.
pub const STF_OUTPUT_CHANNEL_ID: u32 = 0;

/// Input threads of the builder device.
pub struct ReadoutInterface {
    threads: Vec<JoinHandle<()>>,
}

impl ReadoutInterface {
    /// Start one input thread per readout channel.
    pub fn start(
        channels: &[Arc<MemChannel>],
        out_queue: Arc<ConcurrentFifo<SubTimeFrame>>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let threads = channels
            .iter()
            .enumerate()
            .map(|(idx, chan)| {
                let chan = chan.clone();
                let queue = out_queue.clone();
                let running = running.clone();
                std::thread::Builder::new()
                    .name(format!("readout-input-{idx}"))
                    .spawn(move || data_handler(idx, &*chan, &queue, &running))
                    .expect("spawning an input thread")
            })
            .collect();

        Self { threads }
    }

    /// Wait for all input threads to exit. Callers stop the channels first.
    pub fn join(self) {
        for t in self.threads {
            let _ = t.join();
        }
    }
}

fn data_handler(
    idx: usize,
    chan: &dyn Channel,
    queue: &ConcurrentFifo<SubTimeFrame>,
    running: &AtomicBool,
) {
    let mut current: Option<SubTimeFrame> = None;

    while running.load(Ordering::Acquire) {
        let mut parts = match chan.recv() {
            Ok(p) => p,
            Err(_) => break,
        };
        if parts.is_empty() {
            continue;
        }

        let hdr = match ReadoutStfHeader::from_message(&parts[0]) {
            Ok(h) => h,
            Err(e) => {
                warn!("input[{idx}]: bad readout header, dropping update: {e}");
                continue;
            }
        };
        let frames: Vec<Message> = parts.drain(1..).collect();

        // id advance completes the STF under assembly
        if let Some(stf) = current.take() {
            if stf.id() == Some(hdr.stf_id) {
                current = Some(stf);
            } else {
                queue.push(stf);
                current = None;
            }
        }

        let stf = current.get_or_insert_with(|| {
            SubTimeFrame::new(STF_OUTPUT_CHANNEL_ID, hdr.stf_id)
        });
        if let Err(e) = stf.add_hb_frames(&hdr, frames) {
            warn!("input[{idx}]: cannot append frames: {e}");
        }
    }

    if let Some(stf) = current.take() {
        debug!(
            "input[{idx}]: dropping partial STF {:?} at shutdown",
            stf.id()
        );
    }
    info!("exiting input thread[{idx}]");
}
