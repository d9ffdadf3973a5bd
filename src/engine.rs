// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Circular Log Engine
//!
//! Owns the memory interface and the ring position. Not synchronized:
//! [`EventLog`](crate::log::EventLog) wraps it in the exclusive lock.
//!
//! # Append protocol
//! ```text
//! write_ptr on a sector boundary?
//! ↓ yes
//! 1. Erase sector (evicts its records once the ring is full)
//! ↓
//! 2. Write record at write_ptr
//! ↓
//! 3. Advance (write_ptr, count), wrapping at the region end
//! ↓
//! 4. Report the new state to the sink
//! ```
//!
//! A failure in 1 or 2 leaves the state exactly as it was. The sink sees a
//! state only after the record it counts is on the medium, so a crash
//! between 2 and 4 under-counts and never over-counts.

use tracing::{debug, info, trace};

use crate::config::LogConfig;
use crate::error::{LogError, Result};
use crate::geometry::{LogGeometry, LogSnapshot, LogState};
use crate::memory::{FlashMemory, MemoryFault, MemoryOp};
use crate::recovery::recover_state;
use crate::store::StateSink;

pub struct LogEngine<M> {
    geometry: LogGeometry,
    state: LogState,
    memory: M,
    sink: Box<dyn StateSink>,
}

impl<M: FlashMemory> LogEngine<M> {
    /// Brings up the medium, resolves the geometry and recovers the ring
    /// position from the configured seed.
    pub fn initialize(config: &LogConfig, mut memory: M, sink: Box<dyn StateSink>) -> Result<Self> {
        config.validate()?;

        memory
            .init()
            .map_err(|e| LogError::Memory(format!("{}: {e}", MemoryOp::Init)))?;

        let mut geometry =
            LogGeometry::requested(config.record_size, config.first_valid_addr, config.region_size)?;
        memory
            .describe(&mut geometry)
            .map_err(|e| LogError::Memory(format!("{}: {e}", MemoryOp::Describe)))?;
        geometry.validate()?;

        let state = recover_state(&geometry, config.seed());

        info!(
            first_addr = geometry.first_addr,
            last_addr = geometry.last_addr,
            record_size = geometry.record_size,
            max_records = geometry.max_records,
            write_ptr = state.write_ptr,
            count = state.count,
            "Event log initialized"
        );

        Ok(Self {
            geometry,
            state,
            memory,
            sink,
        })
    }

    /// Appends one record. Returns the state reported to the sink.
    pub fn append(&mut self, record: &[u8]) -> Result<LogState> {
        self.check_record_len(record.len())?;

        let LogState { write_ptr, mut count } = self.state;
        if self.geometry.is_sector_start(write_ptr) {
            self.memory
                .erase_sector(write_ptr)
                .map_err(|e| flash_error(MemoryOp::EraseSector, write_ptr, e))?;

            // The erased sector held the oldest records once the ring was full.
            if count >= self.geometry.max_records {
                count -= self.geometry.records_per_sector;
            }
            debug!(addr = write_ptr, count, "Erased sector");
        }

        // Committed only with the write; a retry erases the sector again.
        self.memory
            .write(write_ptr, record)
            .map_err(|e| flash_error(MemoryOp::Write, write_ptr, e))?;

        self.state = LogState {
            write_ptr: self.geometry.next_slot(write_ptr),
            count: count + 1,
        };
        trace!(addr = write_ptr, count = self.state.count, "Record appended");

        self.notify()?;
        Ok(self.state)
    }

    /// Physical address of the record `index` places before the newest one.
    pub fn physical_address(&self, index: u32) -> Result<u32> {
        let LogState { write_ptr, count } = self.state;
        if index >= count {
            return Err(LogError::NotFound { index, count });
        }

        let geometry = &self.geometry;
        let region = geometry.region_size() as u64;
        let relative_ptr = (write_ptr - geometry.first_addr) as u64;

        let oldest = if count > geometry.final_sector_floor() {
            // Oldest survivors start at the sector ahead of the cursor, or at
            // the cursor itself when it sits on a boundary of a full ring.
            let offset = geometry.sector_offset(write_ptr) as u64;
            if offset == 0 {
                relative_ptr
            } else {
                (relative_ptr - offset + geometry.sector_size as u64) % region
            }
        } else {
            0
        };

        let distance = (count - index - 1) as u64 * geometry.record_size as u64;
        let relative = (oldest + distance) % region;
        Ok(geometry.first_addr + relative as u32)
    }

    /// Reads record `index` (0 = newest) into the front of `buf`.
    pub fn read(&mut self, index: u32, buf: &mut [u8]) -> Result<()> {
        let record_size = self.geometry.record_size as usize;
        if buf.len() < record_size {
            return Err(LogError::InvalidParameter(format!(
                "read buffer of {} bytes smaller than record size {record_size}",
                buf.len()
            )));
        }

        let addr = self.physical_address(index)?;
        self.memory
            .read(addr, &mut buf[..record_size])
            .map_err(|e| flash_error(MemoryOp::Read, addr, e))
    }

    /// Erases the region and resets to an empty log.
    pub fn clear(&mut self) -> Result<()> {
        self.memory
            .erase_all()
            .map_err(|e| flash_error(MemoryOp::EraseAll, self.geometry.first_addr, e))?;

        self.state = LogState::new(self.geometry.first_addr, 0);
        info!("Event log cleared");
        self.notify()
    }

    /// Detaches and returns the memory interface.
    pub fn into_memory(self) -> M {
        self.memory
    }

    pub fn geometry(&self) -> &LogGeometry {
        &self.geometry
    }

    pub fn snapshot(&self) -> LogSnapshot {
        LogSnapshot {
            geometry: self.geometry,
            state: self.state,
        }
    }

    pub fn check_record_len(&self, len: usize) -> Result<()> {
        if len != self.geometry.record_size as usize {
            return Err(LogError::InvalidParameter(format!(
                "record of {len} bytes, log expects {}",
                self.geometry.record_size
            )));
        }
        Ok(())
    }

    fn notify(&mut self) -> Result<()> {
        self.sink
            .store(self.state)
            .map_err(|e| LogError::StateStore(e.to_string()))
    }
}

fn flash_error(op: MemoryOp, addr: u32, fault: MemoryFault) -> LogError {
    LogError::Flash {
        op,
        addr,
        reason: fault.to_string(),
    }
}
