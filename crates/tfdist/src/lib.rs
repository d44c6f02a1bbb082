// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # tfdist - Time Frame Distribution core
//!
//! Assembles heartbeat-aligned readout fragments from many front-end links
//! into time-ordered SubTimeFrames (STFs), optionally persists them to disk,
//! fans them out to a pool of event-processing nodes (EPNs), and reassembles
//! full TimeFrames on the receiving side.
//!
//! ## Architecture
//!
//! ```text
//! readout links -> [input threads] -> Q_built -> [file sink?] -> Q_out
//!                                                                  |
//!                                                           [serializer]
//!                                                                  |
//!                  +------------------------- transport ------------+
//!                  v
//!          [deserializer] -> Q_in -> [scheduler] -> Q_epn[id % N] -> [senders]
//!                                                                       |
//!                                     [TimeFrame merge] <- transport ---+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`data::SubTimeFrame`] | All HB frames of one builder for one interval |
//! | [`ser::InterleavedSerializer`] | STF -> one transport batch |
//! | [`ser::SplitSerializer`] | STF -> header batch + data batch |
//! | [`file::StfFileWriter`] | Append-only self-describing STF stream |
//! | [`queue::ConcurrentFifo`] | Blocking FIFO with stop-and-drain semantics |
//! | [`extent::ExtentVec`] | Growable sequence with stable element addresses |
//!
//! Ordering is owned by the containers: equipments always serialize in
//! [`data::EquipmentIdentifier`] order, HB frames in arrival order.

/// Downstream-framework adapter (STF -> header-stack/payload pairs).
pub mod adapter;
/// SubTimeFrame data model (equipment map, visitors, merge).
pub mod data;
/// Stable-address extent vector.
pub mod extent;
/// On-disk STF stream (meta record, writer, reader, rotating sink).
pub mod file;
/// Self-describing header records and header stacks.
pub mod headers;
/// Pipeline queues and the send-slot semaphore.
pub mod queue;
/// Readout wire model (per-update header from the readout process).
pub mod readout;
/// Wire serializers (interleaved and split header/data layouts).
pub mod ser;
/// Transport messages, channels, and the channel registry.
pub mod transport;

pub use data::{EquipmentHbFrames, EquipmentIdentifier, StfError, SubTimeFrame};
pub use queue::{ConcurrentFifo, SendSlots};
pub use transport::{Channel, Message, TransportError};

/// tfdist version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
