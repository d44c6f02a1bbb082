// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rotating file sink pipeline stage.
//!
//! Sits between the builder queue and the output queue: pops an STF, writes
//! it when enabled, and forwards it downstream either way. Rotation starts
//! a new file when either the per-file STF count or the file size limit is
//! reached. A write failure disables the sink and the pipeline keeps
//! flowing pass-through.

use super::path::{expand_file_name, next_session_dir};
use super::writer::StfFileWriter;
use super::FormatError;
use crate::data::SubTimeFrame;
use crate::queue::ConcurrentFifo;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{error, info};

/// File sink configuration; maps 1:1 onto the `stf-sink-*` device options.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Enable disk persistence.
    pub enabled: bool,
    /// Root directory; must exist and be writable.
    pub root_dir: PathBuf,
    /// File name pattern; tokens `%n`, `%D`, `%T`.
    pub file_name_pattern: String,
    /// Rotation by record count.
    pub stfs_per_file: u64,
    /// Rotation by file size in bytes.
    pub max_file_size: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            root_dir: PathBuf::new(),
            file_name_pattern: "%n".to_string(),
            stfs_per_file: 1,
            max_file_size: 4 << 30,
        }
    }
}

/// File sink stage between two pipeline queues.
pub struct StfFileSink {
    config: SinkConfig,
    enabled: bool,
    session_dir: PathBuf,
    writer: Option<StfFileWriter>,
    file_index: u64,
    current_file_stfs: u64,
    current_file_size: u64,
    in_queue: Arc<ConcurrentFifo<SubTimeFrame>>,
    out_queue: Arc<ConcurrentFifo<SubTimeFrame>>,
}

impl StfFileSink {
    /// Validate the configuration and, when enabled, create the session
    /// directory and the first file.
    pub fn new(
        config: SinkConfig,
        in_queue: Arc<ConcurrentFifo<SubTimeFrame>>,
        out_queue: Arc<ConcurrentFifo<SubTimeFrame>>,
    ) -> Result<Self, FormatError> {
        info!(
            enabled = config.enabled,
            "(Sub)TimeFrame file sink {}",
            if config.enabled { "enabled" } else { "disabled" }
        );

        let mut sink = Self {
            enabled: config.enabled,
            config,
            session_dir: PathBuf::new(),
            writer: None,
            file_index: 0,
            current_file_stfs: 0,
            current_file_size: 0,
            in_queue,
            out_queue,
        };

        if !sink.enabled {
            return Ok(sink);
        }

        if sink.config.root_dir.as_os_str().is_empty() {
            return Err(FormatError::Config(
                "sink directory must be specified".into(),
            ));
        }
        if !sink.config.root_dir.is_dir() {
            return Err(FormatError::Config(format!(
                "sink directory does not exist: {}",
                sink.config.root_dir.display()
            )));
        }
        sink.config.stfs_per_file = sink.config.stfs_per_file.max(1);
        sink.config.max_file_size = sink.config.max_file_size.max(1);

        sink.session_dir = next_session_dir(&sink.config.root_dir)?;
        std::fs::create_dir(&sink.session_dir).map_err(|e| {
            FormatError::Config(format!(
                "cannot create session directory {}: {e}",
                sink.session_dir.display()
            ))
        })?;

        info!(
            dir = %sink.session_dir.display(),
            pattern = %sink.config.file_name_pattern,
            stfs_per_file = sink.config.stfs_per_file,
            max_file_size = sink.config.max_file_size,
            "(Sub)TimeFrame sink session directory"
        );

        sink.writer = Some(StfFileWriter::create(sink.next_file_path())?);
        Ok(sink)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn session_dir(&self) -> &PathBuf {
        &self.session_dir
    }

    fn next_file_path(&mut self) -> PathBuf {
        let name = expand_file_name(
            &self.config.file_name_pattern,
            self.file_index,
            chrono::Local::now(),
        );
        self.file_index += 1;
        self.session_dir.join(name)
    }

    /// Spawn the sink thread. It exits once the input queue is stopped and
    /// drained.
    pub fn start(mut self) -> SinkHandle {
        let thread = std::thread::Builder::new()
            .name("stf-file-sink".into())
            .spawn(move || self.run())
            .expect("spawning the sink thread");
        SinkHandle { thread }
    }

    fn run(&mut self) {
        while let Some(stf) = self.in_queue.pop() {
            if !self.enabled {
                self.out_queue.push(stf);
                continue;
            }

            // rotate before the write, never leaving an empty trailing file
            if self.current_file_stfs >= self.config.stfs_per_file
                || self.current_file_size >= self.config.max_file_size
            {
                self.current_file_stfs = 0;
                self.current_file_size = 0;
                let path = self.next_file_path();
                match StfFileWriter::create(&path) {
                    Ok(w) => self.writer = Some(w),
                    Err(e) => {
                        error!("file sink: cannot open {}: {e}", path.display());
                        self.disable();
                        self.out_queue.push(stf);
                        continue;
                    }
                }
            }

            match self.writer.as_mut().map(|w| w.write(&stf)) {
                Some(Ok(_)) => {
                    self.current_file_stfs += 1;
                    self.current_file_size =
                        self.writer.as_ref().map(|w| w.size()).unwrap_or(0);
                }
                Some(Err(e)) => {
                    error!("file sink: error while writing: {e}");
                    self.disable();
                }
                None => self.disable(),
            }

            self.out_queue.push(stf);
        }

        info!("exiting file sink thread");
    }

    fn disable(&mut self) {
        error!("file sink: disabling writing");
        self.enabled = false;
        self.writer = None;
    }
}

/// Join handle for a running sink thread.
pub struct SinkHandle {
    thread: JoinHandle<()>,
}

impl SinkHandle {
    pub fn join(self) {
        let _ = self.thread.join();
    }
}
