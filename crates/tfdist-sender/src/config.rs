// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! STF sender configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tfdist::ser::WireLayout;
use thiserror::Error;

/// Sender device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderConfig {
    /// Name of the builder-facing input channel.
    #[serde(default = "default_input_channel")]
    pub input_channel_name: String,

    /// Name of the EPN-facing output channel.
    #[serde(default = "default_output_channel")]
    pub output_channel_name: String,

    /// Number of destination EPNs (one sender thread each).
    #[serde(default = "default_epn_node_count")]
    pub epn_node_count: u32,

    /// Global bound on in-flight STFs.
    #[serde(default = "default_send_slot_count")]
    pub send_slot_count: u32,

    /// Wire layout: "interleaved" or "split".
    #[serde(default = "default_wire_layout")]
    pub wire_layout: String,
}

fn default_input_channel() -> String {
    "builder-stf-channel".to_string()
}

fn default_output_channel() -> String {
    "sender-stf-channel".to_string()
}

fn default_epn_node_count() -> u32 {
    1
}

fn default_send_slot_count() -> u32 {
    8
}

fn default_wire_layout() -> String {
    "interleaved".to_string()
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            input_channel_name: default_input_channel(),
            output_channel_name: default_output_channel(),
            epn_node_count: default_epn_node_count(),
            send_slot_count: default_send_slot_count(),
            wire_layout: default_wire_layout(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),
}

impl SenderConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.epn_node_count == 0 {
            return Err(ConfigError::InvalidValue("epn-node-count must be > 0".into()));
        }
        if self.send_slot_count == 0 {
            return Err(ConfigError::InvalidValue("send-slot-count must be > 0".into()));
        }
        self.layout()?;
        Ok(())
    }

    pub fn layout(&self) -> Result<WireLayout, ConfigError> {
        self.wire_layout
            .parse()
            .map_err(ConfigError::InvalidValue)
    }
}
