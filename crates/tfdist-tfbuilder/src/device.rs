// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TimeFrame builder device: FLP fan-in, merge stage, framework consumer.
//!
//! ```text
//! FLP channels -> [input threads] -> Q_merge -> [merger] -> Q_tf
//!                                                             |
//!                                              [consumer / framework adapter]
//! ```

use crate::config::TfBuilderConfig;
use crate::input::FlpInputInterface;
use crate::merge::merge_loop;
use std::sync::Arc;
use tfdist::adapter::FrameworkAdapter;
use tfdist::queue::ConcurrentFifo;
use tfdist::transport::MemChannel;
use tfdist::SubTimeFrame;
use tracing::{debug, info, warn};

/// TimeFrame builder device (EPN role).
pub struct TfBuilderDevice {
    config: TfBuilderConfig,
    flp_channels: Vec<Arc<MemChannel>>,
}

impl TfBuilderDevice {
    pub fn new(config: TfBuilderConfig, flp_channels: Vec<Arc<MemChannel>>) -> Self {
        Self {
            config,
            flp_channels,
        }
    }

    /// Run until the FLP channels close. Returns the number of complete
    /// TimeFrames handed to the framework adapter.
    pub fn run(&self) -> Result<u64, crate::config::ConfigError> {
        self.config.validate()?;
        let layout = self.config.layout()?;
        let flp_count = self.flp_channels.len() as u32;

        let q_merge: Arc<ConcurrentFifo<SubTimeFrame>> = Arc::new(ConcurrentFifo::new());
        let q_tf: Arc<ConcurrentFifo<SubTimeFrame>> = Arc::new(ConcurrentFifo::new());

        let inputs = FlpInputInterface::start(&self.flp_channels, q_merge.clone(), layout);

        let merger = {
            let (q_in, q_out) = (q_merge.clone(), q_tf.clone());
            std::thread::Builder::new()
                .name("tf-merger".into())
                .spawn(move || merge_loop(&q_in, &q_out, flp_count))
                .expect("spawning the merger thread")
        };

        let consumer = {
            let q_tf = q_tf.clone();
            let (start, step) = (self.config.timeslice_start, self.config.timeslice_step);
            std::thread::Builder::new()
                .name("tf-consumer".into())
                .spawn(move || consumer_loop(&q_tf, start, step))
                .expect("spawning the consumer thread")
        };

        // leaves-first shutdown: inputs, merge queue, then the TF queue
        inputs.join();
        q_merge.stop();
        let _ = merger.join();
        q_tf.stop();
        let consumed = consumer.join().unwrap_or(0);

        info!(consumed, "TimeFrame builder done");
        Ok(consumed)
    }

    pub fn stop(&self) {
        for chan in &self.flp_channels {
            chan.stop();
        }
    }
}

fn consumer_loop(q_tf: &ConcurrentFifo<SubTimeFrame>, start: u64, step: u64) -> u64 {
    let mut adapter = FrameworkAdapter::new(start, step);
    let mut consumed = 0u64;

    while let Some(tf) = q_tf.pop() {
        if consumed % 100 == 0 {
            debug!("TF[{:?}] size: {}", tf.id(), tf.data_size());
        }

        match adapter.adapt(tf) {
            Ok(pairs) => {
                consumed += 1;
                if consumed % 100 == 1 {
                    debug!("adapted {} payload(s)", pairs.len());
                }
            }
            Err(e) => warn!("cannot adapt a TimeFrame: {e}"),
        }
    }

    info!("exiting TF consumer");
    consumed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfdist::data::EquipmentIdentifier;
    use tfdist::headers::{DataDescription, DataOrigin};
    use tfdist::ser::InterleavedSerializer;
    use tfdist::transport::Message;

    #[test]
    fn test_merges_across_flps() {
        let (tx0, rx0) = MemChannel::pair();
        let (tx1, rx1) = MemChannel::pair();

        let device = TfBuilderDevice::new(
            TfBuilderConfig {
                flp_node_count: 2,
                ..Default::default()
            },
            vec![Arc::new(rx0), Arc::new(rx1)],
        );

        // two FLPs contribute distinct equipments for ids 0..3
        for (flp, tx) in [(0u64, &tx0), (1u64, &tx1)] {
            let mut ser = InterleavedSerializer::new(tx);
            let eq = EquipmentIdentifier::new(DataDescription::CRU_DATA, DataOrigin::CRU, flp);
            for id in 0..3 {
                let mut stf = SubTimeFrame::new(0, id);
                stf.add_hb_frame(eq, Message::alloc(8)).expect("add");
                ser.serialize(stf).expect("serialize");
            }
        }
        drop(tx0);
        drop(tx1);

        let consumed = device.run().expect("run");
        assert_eq!(consumed, 3);
    }
}
