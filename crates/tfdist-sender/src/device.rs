// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! STF sender device: input stage, scheduler, per-EPN senders.
//!
//! ```text
//! input channel -> [deserializer] -> Q_in -> [scheduler] -> Q_epn[id % N]
//!                                                               |
//!                                                        [sender threads]
//! ```
//!
//! The scheduler takes one send slot per STF before dispatching; sender
//! threads return the slot after their send, bounding in-flight STFs
//! globally. Destination selection is round-robin on the STF id.

use crate::config::SenderConfig;
use crate::output::SenderOutput;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tfdist::queue::{ConcurrentFifo, SendSlots};
use tfdist::ser::{InterleavedDeserializer, SplitDeserializer, WireLayout};
use tfdist::transport::MemChannel;
use tfdist::SubTimeFrame;
use tracing::{debug, info, warn};

/// STF sender device (FLP egress role).
pub struct StfSenderDevice {
    config: SenderConfig,
    input_channel: Arc<MemChannel>,
    epn_channels: Vec<Arc<MemChannel>>,
    running: Arc<AtomicBool>,
}

impl StfSenderDevice {
    pub fn new(
        config: SenderConfig,
        input_channel: Arc<MemChannel>,
        epn_channels: Vec<Arc<MemChannel>>,
    ) -> Self {
        Self {
            config,
            input_channel,
            epn_channels,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Run the pipeline until the input channel closes.
    pub fn run(&self) -> Result<(), crate::config::ConfigError> {
        self.config.validate()?;
        let layout = self.config.layout()?;
        let epn_count = self.epn_channels.len() as u64;

        self.running.store(true, Ordering::Release);

        let slots = Arc::new(SendSlots::new(self.config.send_slot_count));
        let q_in: Arc<ConcurrentFifo<SubTimeFrame>> = Arc::new(ConcurrentFifo::new());

        let output = SenderOutput::start(
            &self.epn_channels,
            slots.clone(),
            self.running.clone(),
            layout,
        );

        let input_thread = {
            let chan = self.input_channel.clone();
            let q_in = q_in.clone();
            std::thread::Builder::new()
                .name("stf-sender-input".into())
                .spawn(move || input_loop(&chan, &q_in, layout))
                .expect("spawning the input thread")
        };

        // scheduler runs on the caller thread
        scheduler_loop(&q_in, &output, &slots, &self.running, epn_count);

        let _ = input_thread.join();
        output.stop();

        self.running.store(false, Ordering::Release);
        info!("sender device done");
        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.input_channel.stop();
    }
}

fn input_loop(
    chan: &Arc<MemChannel>,
    q_in: &ConcurrentFifo<SubTimeFrame>,
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
            Ok(stf) => q_in.push(stf),
            Err(e) => {
                warn!("error while receiving an STF, exiting: {e}");
                break;
            }
        }
    }
    // no more input; let the scheduler drain
    q_in.stop();
}

fn scheduler_loop(
    q_in: &ConcurrentFifo<SubTimeFrame>,
    output: &SenderOutput,
    slots: &SendSlots,
    running: &AtomicBool,
    epn_count: u64,
) {
    debug_assert!(epn_count > 0);

    let mut scheduled: u64 = 0;
    while let Some(stf) = q_in.pop() {
        let stf_id = stf.id().unwrap_or(0);

        if scheduled % 100 == 0 {
            debug!("STF[{stf_id}] size: {}", stf.data_size());
        }

        // one slot per in-flight STF; bail out when shutting down
        if !slots.acquire(running) {
            break;
        }

        let target = (stf_id % epn_count) as usize;
        output.push_stf(target, stf);
        scheduled += 1;
    }

    info!(scheduled, "exiting scheduler");
}
