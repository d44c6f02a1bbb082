// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sender output stage: per-destination queues and sender threads.
//!
//! Each destination EPN owns one queue and one sender thread. A sender pops
//! its queue, serializes the STF onto its channel, and releases one send
//! slot. STFs sharing a destination keep scheduler enqueue order; across
//! destinations no order is implied.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tfdist::queue::{ConcurrentFifo, SendSlots};
use tfdist::ser::{InterleavedSerializer, SplitSerializer, WireLayout};
use tfdist::transport::MemChannel;
use tfdist::SubTimeFrame;
use tracing::{error, info};

/// Per-destination queues plus their sender threads.
pub struct SenderOutput {
    queues: Vec<Arc<ConcurrentFifo<SubTimeFrame>>>,
    threads: Vec<JoinHandle<()>>,
    slots: Arc<SendSlots>,
}

impl SenderOutput {
    /// Start one sender thread per destination channel.
    pub fn start(
        channels: &[Arc<MemChannel>],
        slots: Arc<SendSlots>,
        running: Arc<AtomicBool>,
        layout: WireLayout,
    ) -> Self {
        let queues: Vec<Arc<ConcurrentFifo<SubTimeFrame>>> = channels
            .iter()
            .map(|_| Arc::new(ConcurrentFifo::new()))
            .collect();

        let threads = channels
            .iter()
            .enumerate()
            .map(|(idx, chan)| {
                let chan = chan.clone();
                let queue = queues[idx].clone();
                let slots = slots.clone();
                let running = running.clone();
                std::thread::Builder::new()
                    .name(format!("stf-sender-{idx}"))
                    .spawn(move || sender_loop(idx, &chan, &queue, &slots, &running, layout))
                    .expect("spawning a sender thread")
            })
            .collect();

        Self {
            queues,
            threads,
            slots,
        }
    }

    pub fn destination_count(&self) -> usize {
        self.queues.len()
    }

    /// Queue an STF for one destination.
    pub fn push_stf(&self, target: usize, stf: SubTimeFrame) {
        self.queues[target].push(stf);
    }

    /// Stop all queues, wake slot waiters, and join the sender threads.
    pub fn stop(self) {
        for q in &self.queues {
            q.stop();
        }
        self.slots.notify_all();

        for t in self.threads {
            let _ = t.join();
        }
    }
}

fn sender_loop(
    idx: usize,
    chan: &Arc<MemChannel>,
    queue: &ConcurrentFifo<SubTimeFrame>,
    slots: &SendSlots,
    running: &AtomicBool,
    layout: WireLayout,
) {
    info!("sender[{idx}]: starting");
    let mut interleaved = InterleavedSerializer::new(&**chan);
    let mut split = SplitSerializer::new(&**chan);

    while let Some(stf) = queue.pop() {
        let res = match layout {
            WireLayout::Interleaved => interleaved.serialize(stf),
            WireLayout::Split => split.serialize(stf),
        };
        if let Err(e) = res {
            if running.load(Ordering::Acquire) {
                error!("sender[{idx}]: error on send: {e}");
            } else {
                info!("sender[{idx}] (stopping): error on send: {e}");
            }
            break;
        }

        // the in-flight STF is done, free one slot for the scheduler
        slots.release();
    }

    info!("exiting sender[{idx}]");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfdist::ser::InterleavedDeserializer;

    #[test]
    fn test_per_destination_order_and_slot_release() {
        let (a0, b0) = MemChannel::pair();
        let (a1, b1) = MemChannel::pair();
        let channels = vec![Arc::new(a0), Arc::new(a1)];

        let slots = Arc::new(SendSlots::new(4));
        let running = Arc::new(AtomicBool::new(true));
        let output = SenderOutput::start(
            &channels,
            slots.clone(),
            running.clone(),
            WireLayout::Interleaved,
        );

        // four sends acquire four slots up front
        for id in 0..4u64 {
            assert!(slots.acquire(&running));
            output.push_stf((id % 2) as usize, SubTimeFrame::new(0, id));
        }

        let mut de = InterleavedDeserializer::new();
        assert_eq!(de.deserialize(&b0).expect("stf").id(), Some(0));
        assert_eq!(de.deserialize(&b0).expect("stf").id(), Some(2));
        assert_eq!(de.deserialize(&b1).expect("stf").id(), Some(1));
        assert_eq!(de.deserialize(&b1).expect("stf").id(), Some(3));

        output.stop();
        // all slots returned after the sends completed
        assert_eq!(slots.free(), 4);
    }
}
