// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.

//! flashlog: a power-loss tolerant circular event log on sector-erasable
//! flash, with write-back and write-through append paths.

pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod flash;
pub mod geometry;
pub mod log;
pub mod memory;
pub mod queue;
pub mod recovery;
pub mod store;
pub mod worker;

pub use config::{LogConfig, WorkerConfig};
pub use engine::LogEngine;
pub use error::{LogError, Result};
pub use flash::{ChipInfo, ImageFlash, SimulatedFlash};
pub use geometry::{LogGeometry, LogSnapshot, LogState};
pub use log::{EventLog, Uninitialized};
pub use memory::{FlashMemory, MemoryFault, MemoryOp};
pub use store::{NullSink, StateFile, StateSink, StoreFault};
pub use worker::DrainWorker;

#[cfg(test)]
pub mod tests;
