// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{LogError, Result};
use crate::geometry::LogState;

/// Settings consumed by [`EventLog::initialize`](crate::log::EventLog::initialize).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Size of every record in bytes.
    pub record_size: u32,
    /// Slots in the write-back queue.
    pub queue_capacity: usize,
    /// How long any operation waits for the exclusive log lock.
    pub lock_wait_ms: u64,
    /// How long `enqueue` waits for a free queue slot.
    pub enqueue_wait_ms: u64,
    /// First address of the log region. Must be sector aligned.
    pub first_valid_addr: u32,
    /// Size of the log region; `None` uses the rest of the device.
    pub region_size: Option<u32>,
    /// Persisted write pointer, used when it is consistent with the geometry.
    pub seed_write_ptr: u32,
    /// Persisted record count, used when it is consistent with the geometry.
    pub seed_count: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            record_size: 128,
            queue_capacity: 5,
            lock_wait_ms: 10,
            enqueue_wait_ms: 100,
            first_valid_addr: 0,
            region_size: None,
            seed_write_ptr: 0,
            seed_count: 0,
        }
    }
}

impl LogConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| LogError::InvalidParameter(format!("bad log config: {e}")))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            LogError::InvalidParameter(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Replaces the seed with a previously persisted state.
    pub fn with_seed(mut self, state: LogState) -> Self {
        self.seed_write_ptr = state.write_ptr;
        self.seed_count = state.count;
        self
    }

    pub fn seed(&self) -> LogState {
        LogState::new(self.seed_write_ptr, self.seed_count)
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    pub fn enqueue_wait(&self) -> Duration {
        Duration::from_millis(self.enqueue_wait_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.record_size == 0 {
            return Err(LogError::InvalidParameter("record_size must not be zero".into()));
        }
        if self.queue_capacity == 0 {
            return Err(LogError::InvalidParameter("queue_capacity must not be zero".into()));
        }
        if self.region_size == Some(0) {
            return Err(LogError::InvalidParameter("region_size must not be zero".into()));
        }
        Ok(())
    }
}

/// Settings for the background [`DrainWorker`](crate::worker::DrainWorker).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Delay before retrying after a failed drain.
    pub retry_interval_ms: u64,
    /// Quiet period after the last read before the read cursor is reset.
    pub read_idle_ms: u64,
    /// Records committed per drain pass.
    pub batch_limit: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 100,
            read_idle_ms: 1500,
            batch_limit: u32::MAX,
        }
    }
}

impl WorkerConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn read_idle(&self) -> Duration {
        Duration::from_millis(self.read_idle_ms)
    }
}
