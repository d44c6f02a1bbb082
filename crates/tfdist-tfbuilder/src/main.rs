// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TimeFrame Builder device (EPN role).
//!
//! Receives SubTimeFrames from all contributing FLPs, merges the arrivals
//! of each interval into a full TimeFrame, and hands complete TimeFrames to
//! the processing framework adapter.
//!
//! # Usage
//!
//! ```bash
//! # merge contributions of three FLPs
//! tfdist-tfbuilder --flp-node-count 3 --stf-count 500
//! ```
//!
//! The binary feeds the device from built-in per-FLP generators; attaching
//! a real transport replaces them.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;
mod device;
mod input;
mod merge;

use config::TfBuilderConfig;
use device::TfBuilderDevice;
use tfdist::data::EquipmentIdentifier;
use tfdist::headers::{DataDescription, DataOrigin};
use tfdist::ser::{InterleavedSerializer, SplitSerializer, WireLayout};
use tfdist::transport::{MemChannel, Message};
use tfdist::SubTimeFrame;

/// TimeFrame Builder - reassembles TimeFrames from SubTimeFrames
#[derive(Parser, Debug)]
#[command(name = "tfdist-tfbuilder")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (JSON format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input channel name
    #[arg(long, default_value = "sender-stf-channel")]
    input_channel_name: String,

    /// Number of contributing FLPs
    #[arg(long, default_value = "1")]
    flp_node_count: u32,

    /// Wire layout: interleaved | split
    #[arg(long, default_value = "interleaved")]
    wire_layout: String,

    /// First timeslice id for the framework adapter
    #[arg(long, default_value = "0")]
    timeslice_start: u64,

    /// Timeslice id advance per flattened payload
    #[arg(long, default_value = "1")]
    timeslice_step: u64,

    /// Synthetic STFs produced per FLP by the generators
    #[arg(long, default_value = "500")]
    stf_count: u64,

    /// HB frames per STF per FLP
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
        TfBuilderConfig::from_file(path)?
    } else {
        TfBuilderConfig {
            input_channel_name: args.input_channel_name.clone(),
            flp_node_count: args.flp_node_count,
            wire_layout: args.wire_layout.clone(),
            timeslice_start: args.timeslice_start,
            timeslice_step: args.timeslice_step,
        }
    };
    config.validate()?;
    let layout = config.layout()?;

    info!(
        flp_node_count = config.flp_node_count,
        layout = %config.wire_layout,
        "starting TimeFrame builder"
    );

    let mut flp_channels = Vec::new();
    let mut generators = Vec::new();
    for flp in 0..config.flp_node_count {
        let (tx, rx) = MemChannel::pair();
        flp_channels.push(Arc::new(rx));
        let (count, frames, size) = (args.stf_count, args.frames_per_stf, args.frame_size);
        generators.push(std::thread::spawn(move || {
            generate_flp_stfs(&tx, layout, flp as u64, count, frames, size);
        }));
    }

    let device = TfBuilderDevice::new(config, flp_channels);
    let consumed = device.run()?;

    for g in generators {
        let _ = g.join();
    }
    info!(consumed, "TimeFrame builder finished");
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

/// Serialize `count` synthetic STFs for one FLP; each FLP contributes its
/// own equipment (sub-specification = FLP index), so merges never collide.
fn generate_flp_stfs(
    chan: &MemChannel,
    layout: WireLayout,
    flp: u64,
    count: u64,
    frames_per_stf: u32,
    frame_size: usize,
) {
    let eq = EquipmentIdentifier::new(DataDescription::CRU_DATA, DataOrigin::CRU, flp);
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
