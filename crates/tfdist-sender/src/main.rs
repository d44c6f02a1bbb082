// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! STF Sender device (FLP egress role).
//!
//! Receives SubTimeFrames from the builder, then fans them out to a pool of
//! EPNs: round-robin on the STF id, bounded globally by send slots.
//!
//! # Usage
//!
//! ```bash
//! # four destinations, at most two STFs in flight
//! tfdist-sender --epn-node-count 4 --send-slot-count 2 --stf-count 1000
//! ```
//!
//! The binary feeds the device from a built-in STF generator and counts the
//! STFs arriving per EPN; attaching a real transport replaces both ends.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;
mod device;
mod output;

use config::SenderConfig;
use device::StfSenderDevice;
use tfdist::data::EquipmentIdentifier;
use tfdist::headers::{DataDescription, DataOrigin};
use tfdist::ser::{InterleavedDeserializer, InterleavedSerializer, SplitDeserializer, SplitSerializer, WireLayout};
use tfdist::transport::{MemChannel, Message};
use tfdist::SubTimeFrame;

/// STF Sender - round-robin SubTimeFrame fan-out to EPNs
#[derive(Parser, Debug)]
#[command(name = "tfdist-sender")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (JSON format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input channel name
    #[arg(long, default_value = "builder-stf-channel")]
    input_channel_name: String,

    /// Output channel name
    #[arg(long, default_value = "sender-stf-channel")]
    output_channel_name: String,

    /// Number of destination EPNs
    #[arg(long, default_value = "1")]
    epn_node_count: u32,

    /// Global bound on in-flight STFs
    #[arg(long, default_value = "8")]
    send_slot_count: u32,

    /// Wire layout: interleaved | split
    #[arg(long, default_value = "interleaved")]
    wire_layout: String,

    /// Synthetic STFs produced by the generator
    #[arg(long, default_value = "1000")]
    stf_count: u64,

    /// HB frames per generated STF
    #[arg(long, default_value = "8")]
    frames_per_stf: u32,

    /// HB frame payload size in bytes
    #[arg(long, default_value = "1024")]
    frame_size: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let config = if let Some(path) = &args.config {
        info!("loading config from {}", path.display());
        SenderConfig::from_file(path)?
    } else {
        SenderConfig {
            input_channel_name: args.input_channel_name.clone(),
            output_channel_name: args.output_channel_name.clone(),
            epn_node_count: args.epn_node_count,
            send_slot_count: args.send_slot_count,
            wire_layout: args.wire_layout.clone(),
        }
    };
    config.validate()?;
    let layout = config.layout()?;

    info!(
        epn_node_count = config.epn_node_count,
        send_slot_count = config.send_slot_count,
        layout = %config.wire_layout,
        "starting STF sender"
    );

    let (in_tx, in_rx) = MemChannel::pair();
    let mut epn_tx = Vec::new();
    let mut consumers = Vec::new();
    for idx in 0..config.epn_node_count {
        let (a, b) = MemChannel::pair();
        epn_tx.push(Arc::new(a));
        consumers.push(std::thread::spawn(move || consume_epn(idx, &b, layout)));
    }

    let generator = {
        let (count, frames, size) = (args.stf_count, args.frames_per_stf, args.frame_size);
        std::thread::spawn(move || generate_stfs(&in_tx, layout, count, frames, size))
    };

    let device = StfSenderDevice::new(config, Arc::new(in_rx), epn_tx);
    device.run()?;
    // release the EPN endpoints so the consumers see their channels close
    drop(device);

    let _ = generator.join();
    let mut total = 0u64;
    for c in consumers {
        total += c.join().unwrap_or(0);
    }
    info!(total, "sender finished");
    Ok(())
}

fn init_logging(level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let level = match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Serialize `count` synthetic STFs onto the device input channel.
fn generate_stfs(
    chan: &MemChannel,
    layout: WireLayout,
    count: u64,
    frames_per_stf: u32,
    frame_size: usize,
) {
    let eq = EquipmentIdentifier::new(DataDescription::CRU_DATA, DataOrigin::CRU, 0);
    let mut interleaved = InterleavedSerializer::new(chan);
    let mut split = SplitSerializer::new(chan);

    for stf_id in 0..count {
        let mut stf = SubTimeFrame::new(0, stf_id);
        for _ in 0..frames_per_stf {
            if stf.add_hb_frame(eq, Message::alloc(frame_size)).is_err() {
                return;
            }
        }
        let res = match layout {
            WireLayout::Interleaved => interleaved.serialize(stf),
            WireLayout::Split => split.serialize(stf),
        };
        if res.is_err() {
            return;
        }
    }
}

/// Count the STFs one EPN receives until its channel closes.
fn consume_epn(idx: u32, chan: &MemChannel, layout: WireLayout) -> u64 {
    let mut interleaved = InterleavedDeserializer::new();
    let mut split = SplitDeserializer::new();

    let mut received = 0u64;
    loop {
        let res = match layout {
            WireLayout::Interleaved => interleaved.deserialize(chan),
            WireLayout::Split => split.deserialize(chan),
        };
        match res {
            Ok(stf) => {
                received += 1;
                if received % 100 == 1 {
                    info!("EPN[{idx}]: STF[{:?}] size: {}", stf.id(), stf.data_size());
                }
            }
            Err(_) => break,
        }
    }
    info!("EPN[{idx}]: received {received} STFs");
    received
}
