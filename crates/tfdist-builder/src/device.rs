// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! STF builder device: input fan-in, optional file sink, output stage.
//!
//! ```text
//! readout channels -> [input threads] -> Q_built -> [file sink] -> Q_out
//!                                                                    |
//!                                                      [output thread / serializer]
//! ```
//!
//! Shutdown runs leaves-first: the input threads exit when their channels
//! stop, then `Q_built` stops (draining the sink), then `Q_out` stops
//! (draining the output thread).

use crate::config::BuilderConfig;
use crate::input::{ReadoutInterface, STF_OUTPUT_CHANNEL_ID};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tfdist::file::{FormatError, StfFileSink};
use tfdist::queue::ConcurrentFifo;
use tfdist::ser::{InterleavedSerializer, SplitSerializer, WireLayout};
use tfdist::transport::{ChannelRegistry, MemChannel};
use tfdist::SubTimeFrame;
use tracing::{debug, error, info};

/// STF builder device (FLP role).
pub struct StfBuilderDevice {
    config: BuilderConfig,
    readout_channels: Vec<Arc<MemChannel>>,
    channels: ChannelRegistry,
    running: Arc<AtomicBool>,
}

impl StfBuilderDevice {
    pub fn new(
        config: BuilderConfig,
        readout_channels: Vec<Arc<MemChannel>>,
        output_channel: Arc<MemChannel>,
    ) -> Self {
        let mut channels = ChannelRegistry::new();
        channels.add(STF_OUTPUT_CHANNEL_ID, output_channel);

        Self {
            config,
            readout_channels,
            channels,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared running flag; clearing it initiates shutdown.
    pub fn running(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Run the pipeline until the readout channels close.
    pub fn run(&self) -> Result<(), FormatError> {
        let layout = self
            .config
            .layout()
            .map_err(|e| FormatError::Config(e.to_string()))?;

        let q_built: Arc<ConcurrentFifo<SubTimeFrame>> = Arc::new(ConcurrentFifo::new());
        let q_out: Arc<ConcurrentFifo<SubTimeFrame>> = Arc::new(ConcurrentFifo::new());

        let output_chan = self
            .channels
            .get(STF_OUTPUT_CHANNEL_ID)
            .ok_or_else(|| FormatError::Config("output channel not registered".into()))?
            .clone();

        // configuration failure here is fatal for the device
        let sink = StfFileSink::new(self.config.sink_config(), q_built.clone(), q_out.clone())?;

        self.running.store(true, Ordering::Release);

        let sink_handle = sink.start();
        let inputs =
            ReadoutInterface::start(&self.readout_channels, q_built.clone(), self.running.clone());

        let output_thread = {
            let q_out = q_out.clone();
            let chan = output_chan;
            let running = self.running.clone();
            std::thread::Builder::new()
                .name("stf-output".into())
                .spawn(move || output_loop(layout, &q_out, &chan, &running))
                .expect("spawning the output thread")
        };

        // input threads exit when their channels close or stop
        inputs.join();

        // leaves-first: builder queue, then the sink drains into Q_out
        q_built.stop();
        sink_handle.join();
        q_out.stop();
        let _ = output_thread.join();

        self.running.store(false, Ordering::Release);
        info!("builder device done");
        Ok(())
    }

    /// Initiate shutdown from another thread.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        for chan in &self.readout_channels {
            chan.stop();
        }
    }
}

fn output_loop(
    layout: WireLayout,
    q_out: &ConcurrentFifo<SubTimeFrame>,
    chan: &Arc<MemChannel>,
    running: &AtomicBool,
) {
    let mut interleaved = InterleavedSerializer::new(&**chan);
    let mut split = SplitSerializer::new(&**chan);

    let mut sent: u64 = 0;
    while let Some(stf) = q_out.pop() {
        if sent % 100 == 0 {
            debug!("STF[{:?}] size: {}", stf.id(), stf.data_size());
        }

        let res = match layout {
            WireLayout::Interleaved => interleaved.serialize(stf),
            WireLayout::Split => split.serialize(stf),
        };
        if let Err(e) = res {
            if running.load(Ordering::Acquire) {
                error!("output thread: error on send: {e}");
            } else {
                info!("output thread (stopping): error on send: {e}");
            }
            break;
        }
        sent += 1;
    }

    info!(sent, "exiting output thread");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfdist::readout::ReadoutStfHeader;
    use tfdist::ser::InterleavedDeserializer;
    use tfdist::transport::{Channel, Message};

    fn send_update(chan: &MemChannel, stf_id: u64, link_id: u8, n_frames: usize) {
        let hdr = ReadoutStfHeader {
            stf_id,
            hb_frame_count: n_frames as u32,
            link_id,
        };
        let mut parts = vec![hdr.to_message()];
        parts.extend((0..n_frames).map(|_| Message::alloc(32)));
        chan.send(parts).expect("send update");
    }

    #[test]
    fn test_end_to_end_assembly_and_send() {
        let (readout_tx, readout_rx) = MemChannel::pair();
        let (out_tx, out_rx) = MemChannel::pair();

        let device = StfBuilderDevice::new(
            BuilderConfig::default(),
            vec![Arc::new(readout_rx)],
            Arc::new(out_tx),
        );

        // ids 0 and 1 complete; id 2 flushes id 1 and is dropped at shutdown
        send_update(&readout_tx, 0, 3, 2);
        send_update(&readout_tx, 1, 3, 1);
        send_update(&readout_tx, 2, 3, 0);
        drop(readout_tx);

        device.run().expect("run");

        let mut de = InterleavedDeserializer::new();
        let first = de.deserialize(&out_rx).expect("first STF");
        assert_eq!(first.id(), Some(0));
        assert_eq!(first.data_size(), 64);

        let second = de.deserialize(&out_rx).expect("second STF");
        assert_eq!(second.id(), Some(1));
        assert_eq!(second.data_size(), 32);
    }

    #[test]
    fn test_invalid_sink_config_fails_run() {
        let (_readout_tx, readout_rx) = MemChannel::pair();
        let (out_tx, _out_rx) = MemChannel::pair();

        let config = BuilderConfig {
            stf_sink_enable: true,
            stf_sink_dir: "/nonexistent/path".into(),
            ..Default::default()
        };
        let device = StfBuilderDevice::new(config, vec![Arc::new(readout_rx)], Arc::new(out_tx));

        assert!(device.run().is_err());
    }
}
