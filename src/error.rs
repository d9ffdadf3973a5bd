// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use std::time::Duration;
use thiserror::Error;

use crate::memory::MemoryOp;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    /// The log was never initialized, or has been uninitialized.
    #[error("Event log not initialized")]
    NotInitialized,

    /// Bad geometry, bad configuration or a record of the wrong size.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The memory interface failed to initialize or describe itself.
    #[error("Memory interface error: {0}")]
    Memory(String),

    /// An erase, read or write on the medium failed.
    #[error("Flash {op} failed at {addr:#010x}: {reason}")]
    Flash {
        op: MemoryOp,
        addr: u32,
        reason: String,
    },

    /// Enqueue without a wait budget found every slot taken.
    #[error("Record queue full ({capacity} slots)")]
    QueueFull { capacity: usize },

    /// Enqueue waited for a free slot and none appeared.
    #[error("No queue slot freed within {0:?}")]
    Timeout(Duration),

    /// The exclusive log lock could not be acquired in time.
    #[error("Log lock not acquired within {0:?}")]
    LockTimeout(Duration),

    #[error("Record {index} does not exist (log holds {count})")]
    NotFound { index: u32, count: u32 },

    /// The state-change notification reported a failure.
    #[error("State store failed: {0}")]
    StateStore(String),
}

pub type Result<T> = std::result::Result<T, LogError>;
