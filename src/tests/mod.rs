// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod engine_tests;

use parking_lot::Mutex;
use std::sync::Arc;

use crate::config::LogConfig;
use crate::flash::{ChipInfo, SimulatedFlash};
use crate::geometry::LogState;
use crate::log::EventLog;
use crate::store::{StateSink, StoreFault};

/// Every state reported by the engine, in order.
pub type Reported = Arc<Mutex<Vec<LogState>>>;

pub struct Harness {
    pub log: EventLog<SimulatedFlash>,
    pub flash: SimulatedFlash,
    pub reported: Reported,
}

impl Harness {
    pub fn last_reported(&self) -> Option<LogState> {
        self.reported.lock().last().copied()
    }

    pub fn state(&self) -> LogState {
        self.log.snapshot().unwrap().state
    }
}

/// 1 KiB part with 64-byte sectors.
pub fn small_chip() -> ChipInfo {
    ChipInfo::new(1024, 64)
}

/// 16-byte records over 4 sectors: 16 slots, 4 per sector.
pub fn small_config() -> LogConfig {
    LogConfig {
        record_size: 16,
        region_size: Some(256),
        ..LogConfig::default()
    }
}

pub fn recording_sink() -> (Reported, impl StateSink + 'static) {
    let reported: Reported = Arc::new(Mutex::new(Vec::new()));
    let sink_reported = Arc::clone(&reported);
    let sink = move |state: LogState| -> Result<(), StoreFault> {
        sink_reported.lock().push(state);
        Ok(())
    };
    (reported, sink)
}

pub fn open(config: &LogConfig, flash: &SimulatedFlash) -> Harness {
    let (reported, sink) = recording_sink();
    let log = EventLog::initialize(config, flash.clone(), sink).unwrap();
    Harness {
        log,
        flash: flash.clone(),
        reported,
    }
}

pub fn open_fresh(config: &LogConfig, chip: ChipInfo) -> Harness {
    open(config, &SimulatedFlash::new(chip))
}

/// Record tagged with `id` in its first four bytes.
pub fn record(id: u32, size: u32) -> Vec<u8> {
    let mut bytes = vec![(id as u8) ^ 0x5A; size as usize];
    bytes[..4].copy_from_slice(&id.to_le_bytes());
    bytes
}

pub fn record_id(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Count the algorithm must reach after `appended` appends to an empty
/// ring of `max` slots, `per_sector` to a sector.
pub fn expected_count(appended: u32, max: u32, per_sector: u32) -> u32 {
    if appended <= max {
        appended
    } else {
        (max - per_sector) + (appended - max - 1) % per_sector + 1
    }
}
