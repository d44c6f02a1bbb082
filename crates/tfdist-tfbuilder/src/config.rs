// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TimeFrame builder configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tfdist::ser::WireLayout;
use thiserror::Error;

/// TimeFrame builder device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfBuilderConfig {
    /// Name of the FLP-facing input channel.
    #[serde(default = "default_input_channel")]
    pub input_channel_name: String,

    /// Number of contributing FLPs (one input thread each).
    #[serde(default = "default_flp_node_count")]
    pub flp_node_count: u32,

    /// Wire layout: "interleaved" or "split".
    #[serde(default = "default_wire_layout")]
    pub wire_layout: String,

    /// First timeslice id handed to the processing framework.
    #[serde(default)]
    pub timeslice_start: u64,

    /// Timeslice id advance per flattened payload.
    #[serde(default = "default_timeslice_step")]
    pub timeslice_step: u64,
}

fn default_input_channel() -> String {
    "sender-stf-channel".to_string()
}

fn default_flp_node_count() -> u32 {
    1
}

fn default_wire_layout() -> String {
    "interleaved".to_string()
}

fn default_timeslice_step() -> u64 {
    1
}

impl Default for TfBuilderConfig {
    fn default() -> Self {
        Self {
            input_channel_name: default_input_channel(),
            flp_node_count: default_flp_node_count(),
            wire_layout: default_wire_layout(),
            timeslice_start: 0,
            timeslice_step: default_timeslice_step(),
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

impl TfBuilderConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flp_node_count == 0 {
            return Err(ConfigError::InvalidValue("flp-node-count must be > 0".into()));
        }
        if self.timeslice_step == 0 {
            return Err(ConfigError::InvalidValue("timeslice-step must be > 0".into()));
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
