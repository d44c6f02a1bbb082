// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! STF Builder device (FLP role).
//!
//! Assembles readout updates into SubTimeFrames, optionally persists them,
//! and sends them on the output channel.
//!
//! # Usage
//!
//! ```bash
//! # build 100 synthetic STFs per link, two links
//! tfdist-builder --cru-count 2 --stf-count 100
//!
//! # persist STFs, two per file
//! tfdist-builder --stf-sink-enable --stf-sink-dir /data/stf \
//!     --stf-sink-max-stfs-per-file 2
//! ```
//!
//! The binary drives the pipeline with a built-in readout emulator (one
//! producer thread per link) and counts the STFs arriving on the output
//! channel; attaching a real transport replaces both ends.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;
mod device;
mod input;

use config::BuilderConfig;
use device::StfBuilderDevice;
use tfdist::readout::ReadoutStfHeader;
use tfdist::ser::{InterleavedDeserializer, SplitDeserializer, WireLayout};
use tfdist::transport::{Channel, MemChannel, Message};

/// STF Builder - assembles readout fragments into SubTimeFrames
#[derive(Parser, Debug)]
#[command(name = "tfdist-builder")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (JSON format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input (readout) channel name
    #[arg(long, default_value = "readout")]
    input_channel_name: String,

    /// Output channel name
    #[arg(long, default_value = "builder-stf-channel")]
    output_channel_name: String,

    /// Number of readout links, in [1, 32]
    #[arg(long, default_value = "1")]
    cru_count: u32,

    /// Wire layout: interleaved | split
    #[arg(long, default_value = "interleaved")]
    wire_layout: String,

    /// Enable writing of (Sub)TimeFrames to disk
    #[arg(long)]
    stf_sink_enable: bool,

    /// Destination directory for (Sub)TimeFrame files
    #[arg(long, default_value = "")]
    stf_sink_dir: PathBuf,

    /// File name pattern: %n - file index, %D - date, %T - time
    #[arg(long, default_value = "%n")]
    stf_sink_file_name: String,

    /// Number of (Sub)TimeFrames per file
    #[arg(long, default_value = "1")]
    stf_sink_max_stfs_per_file: u64,

    /// Target size for (Sub)TimeFrame files
    #[arg(long, default_value_t = 4u64 << 30)]
    stf_sink_max_file_size: u64,

    /// Synthetic STFs produced per link by the readout emulator
    #[arg(long, default_value = "100")]
    stf_count: u64,

    /// HB frames per STF per link
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
        BuilderConfig::from_file(path)?
    } else {
        BuilderConfig {
            input_channel_name: args.input_channel_name.clone(),
            output_channel_name: args.output_channel_name.clone(),
            cru_count: args.cru_count,
            wire_layout: args.wire_layout.clone(),
            stf_sink_enable: args.stf_sink_enable,
            stf_sink_dir: args.stf_sink_dir.clone(),
            stf_sink_file_name: args.stf_sink_file_name.clone(),
            stf_sink_max_stfs_per_file: args.stf_sink_max_stfs_per_file,
            stf_sink_max_file_size: args.stf_sink_max_file_size,
        }
    };
    config.validate()?;
    let layout = config.layout()?;

    info!(
        cru_count = config.cru_count,
        layout = %config.wire_layout,
        sink = config.stf_sink_enable,
        "starting STF builder"
    );

    // readout emulator -> device channels, one per link
    let mut emulators = Vec::new();
    let mut readout_channels = Vec::new();
    for link in 0..config.cru_count {
        let (tx, rx) = MemChannel::pair();
        readout_channels.push(Arc::new(rx));
        let (count, frames, size) = (args.stf_count, args.frames_per_stf, args.frame_size);
        emulators.push(std::thread::spawn(move || {
            emulate_readout(&tx, link as u8, count, frames, size);
        }));
    }

    let (out_tx, out_rx) = MemChannel::pair();
    let counter = std::thread::spawn(move || count_output(&out_rx, layout));

    let device = StfBuilderDevice::new(config, readout_channels, Arc::new(out_tx));
    device.run()?;
    // release the output endpoint so the counter sees the channel close
    drop(device);

    for e in emulators {
        let _ = e.join();
    }
    let received = counter.join().unwrap_or(0);
    info!(received, "builder finished");
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

/// Produce `count` synthetic STFs on one link, plus a final empty update
/// that flushes the last one out of the input stage.
fn emulate_readout(chan: &MemChannel, link_id: u8, count: u64, frames_per_stf: u32, frame_size: usize) {
    for stf_id in 0..count {
        let hdr = ReadoutStfHeader {
            stf_id,
            hb_frame_count: frames_per_stf,
            link_id,
        };
        let mut parts = vec![hdr.to_message()];
        parts.extend((0..frames_per_stf).map(|_| Message::alloc(frame_size)));
        if chan.send(parts).is_err() {
            return;
        }
    }

    let flush = ReadoutStfHeader {
        stf_id: count,
        hb_frame_count: 0,
        link_id,
    };
    let _ = chan.send(vec![flush.to_message()]);
}

/// Count STFs arriving on the output channel until it closes.
fn count_output(chan: &MemChannel, layout: WireLayout) -> u64 {
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
                    info!("STF[{:?}] size: {}", stf.id(), stf.data_size());
                }
            }
            Err(_) => break,
        }
    }
    received
}
