// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TimeFrame merge stage.
//!
//! Folds SubTimeFrames arriving from all FLPs into TimeFrames: arrivals are
//! keyed by STF id and merged; once every FLP has contributed, the complete
//! TimeFrame moves to the output queue. Incomplete TimeFrames are dropped
//! at shutdown.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tfdist::queue::ConcurrentFifo;
use tfdist::SubTimeFrame;
use tracing::{info, warn};

/// Run the merge loop until the input queue stops and drains.
pub fn merge_loop(
    in_queue: &ConcurrentFifo<SubTimeFrame>,
    out_queue: &ConcurrentFifo<SubTimeFrame>,
    flp_count: u32,
) {
    let mut pending: HashMap<u64, (SubTimeFrame, u32)> = HashMap::new();

    while let Some(stf) = in_queue.pop() {
        let Some(id) = stf.id() else {
            warn!("discarding an empty SubTimeFrame");
            continue;
        };

        if flp_count == 1 {
            out_queue.push(stf);
            continue;
        }

        match pending.entry(id) {
            Entry::Vacant(v) => {
                v.insert((stf, 1));
            }
            Entry::Occupied(mut o) => {
                let (tf, contributions) = o.get_mut();
                if let Err(e) = tf.merge(stf) {
                    warn!("cannot merge STF into TF[{id}]: {e}");
                    continue;
                }
                *contributions += 1;

                if *contributions == flp_count {
                    let (tf, _) = o.remove();
                    out_queue.push(tf);
                }
            }
        }
    }

    if !pending.is_empty() {
        info!(
            "dropping {} incomplete TimeFrame(s) at shutdown",
            pending.len()
        );
    }
}
