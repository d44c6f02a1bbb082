// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! FLP input interface: one deserializer thread per contributing FLP.

use std::sync::Arc;
use std::thread::JoinHandle;
use tfdist::queue::ConcurrentFifo;
use tfdist::ser::{InterleavedDeserializer, SplitDeserializer, WireLayout};
use tfdist::transport::MemChannel;
use tfdist::SubTimeFrame;
use tracing::{info, warn};

/// Input threads of the TimeFrame builder device.
pub struct FlpInputInterface {
    threads: Vec<JoinHandle<()>>,
}

impl FlpInputInterface {
    /// Start one input thread per FLP channel.
    pub fn start(
        channels: &[Arc<MemChannel>],
        merge_queue: Arc<ConcurrentFifo<SubTimeFrame>>,
        layout: WireLayout,
    ) -> Self {
        let threads = channels
            .iter()
            .enumerate()
            .map(|(idx, chan)| {
                let chan = chan.clone();
                let queue = merge_queue.clone();
                std::thread::Builder::new()
                    .name(format!("flp-input-{idx}"))
                    .spawn(move || input_loop(idx, &chan, &queue, layout))
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

fn input_loop(
    idx: usize,
    chan: &Arc<MemChannel>,
    queue: &ConcurrentFifo<SubTimeFrame>,
    layout: WireLayout,
) {
    let mut interleaved = InterleavedDeserializer::new();
    let mut split = SplitDeserializer::new();

    loop {
        let res = match layout {
            WireLayout::Interleaved => interleaved.deserialize(&**chan),
            WireLayout::Split => split.deserialize(&**chan),
        };
        match res {
            Ok(stf) => queue.push(stf),
            Err(e) => {
                warn!("flp-input[{idx}]: error while receiving an STF, exiting: {e}");
                break;
            }
        }
    }
    info!("exiting flp-input[{idx}]");
}
