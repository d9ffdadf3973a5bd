// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Log geometry and positional state.
//!
//! The ring occupies `[first_addr, last_addr]` on the medium. Every
//! address handled here is absolute; offsets are always taken relative to
//! `first_addr`, which is sector aligned.

use serde::{Deserialize, Serialize};

use crate::error::{LogError, Result};
use crate::memory::MemoryFault;

/// `last_addr` value asking the memory interface to use the whole device.
pub const WHOLE_DEVICE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogGeometry {
    /// Size of one record in bytes.
    pub record_size: u32,
    /// Erase granularity of the medium.
    pub sector_size: u32,
    /// First address of the log region (inclusive).
    pub first_addr: u32,
    /// Last address of the log region (inclusive).
    pub last_addr: u32,
    pub records_per_sector: u32,
    pub max_records: u32,
    pub manufacturer_id: u8,
    pub device_id: u8,
}

/// Mutable positional state, persisted through the state sink on every change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogState {
    /// Address where the next record will be written.
    pub write_ptr: u32,
    /// Number of records currently retrievable.
    pub count: u32,
}

impl LogState {
    pub fn new(write_ptr: u32, count: u32) -> Self {
        Self { write_ptr, count }
    }
}

/// Consistent copy of geometry and state taken under the log lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSnapshot {
    pub geometry: LogGeometry,
    pub state: LogState,
}

impl LogGeometry {
    /// Geometry as requested by configuration, before the memory interface
    /// has filled in the device dependent fields.
    pub fn requested(record_size: u32, first_addr: u32, region_size: Option<u32>) -> Result<Self> {
        let last_addr = match region_size {
            None => WHOLE_DEVICE,
            Some(0) => {
                return Err(LogError::InvalidParameter("region size must not be zero".into()));
            }
            Some(size) => first_addr.checked_add(size - 1).ok_or_else(|| {
                LogError::InvalidParameter(format!(
                    "region of {size} bytes at {first_addr:#x} exceeds the address space"
                ))
            })?,
        };

        Ok(Self {
            record_size,
            first_addr,
            last_addr,
            ..Self::default()
        })
    }

    pub fn uses_whole_device(&self) -> bool {
        self.last_addr == WHOLE_DEVICE
    }

    /// Resolves the region bounds against a device and fills in the derived
    /// constants. Called by memory interfaces from `describe`.
    ///
    /// Rejects bounds that are not sector aligned or that do not fit on a
    /// device of `capacity` bytes.
    pub fn resolve_region(&mut self, capacity: u32, sector_size: u32) -> std::result::Result<(), MemoryFault> {
        if sector_size == 0 || capacity == 0 {
            return Err(MemoryFault::new("device reports an empty geometry"));
        }
        if self.uses_whole_device() {
            self.last_addr = capacity - 1;
        }
        if self.last_addr >= capacity {
            return Err(MemoryFault::new(format!(
                "region end {:#x} beyond device capacity {:#x}",
                self.last_addr, capacity
            )));
        }
        if self.first_addr > self.last_addr {
            return Err(MemoryFault::new(format!(
                "region start {:#x} after region end {:#x}",
                self.first_addr, self.last_addr
            )));
        }
        if self.first_addr % sector_size != 0 {
            return Err(MemoryFault::new(format!(
                "region start {:#x} not aligned to {sector_size}-byte sectors",
                self.first_addr
            )));
        }
        if (self.last_addr as u64 + 1) % sector_size as u64 != 0 {
            return Err(MemoryFault::new(format!(
                "region end {:#x} not aligned to {sector_size}-byte sectors",
                self.last_addr
            )));
        }

        self.sector_size = sector_size;
        self.records_per_sector = sector_size.checked_div(self.record_size).unwrap_or(0);
        self.max_records = self.region_size().checked_div(self.record_size).unwrap_or(0);
        Ok(())
    }

    /// Checks the invariants the engine relies on.
    pub fn validate(&self) -> Result<()> {
        if self.record_size == 0 {
            return Err(LogError::InvalidParameter("record size must not be zero".into()));
        }
        if self.sector_size == 0 {
            return Err(LogError::InvalidParameter("sector size must not be zero".into()));
        }
        if self.record_size > self.sector_size {
            return Err(LogError::InvalidParameter(format!(
                "record size {} larger than sector size {}",
                self.record_size, self.sector_size
            )));
        }
        if self.sector_size % self.record_size != 0 {
            return Err(LogError::InvalidParameter(format!(
                "record size {} does not divide sector size {}",
                self.record_size, self.sector_size
            )));
        }
        if self.uses_whole_device() || self.first_addr > self.last_addr {
            return Err(LogError::InvalidParameter("log region unresolved".into()));
        }
        if self.first_addr % self.sector_size != 0 || self.region_size() % self.sector_size != 0 {
            return Err(LogError::InvalidParameter(format!(
                "region [{:#x}, {:#x}] not aligned to {}-byte sectors",
                self.first_addr, self.last_addr, self.sector_size
            )));
        }
        if self.records_per_sector != self.sector_size / self.record_size
            || self.max_records != self.region_size() / self.record_size
        {
            return Err(LogError::InvalidParameter(
                "derived record counts disagree with geometry".into(),
            ));
        }
        Ok(())
    }

    /// Region size in bytes.
    pub fn region_size(&self) -> u32 {
        self.last_addr - self.first_addr + 1
    }

    /// Count at which the oldest surviving records live in the sector
    /// ahead of the write cursor.
    pub fn final_sector_floor(&self) -> u32 {
        self.max_records - self.records_per_sector
    }

    /// Offset of `addr` within its sector.
    pub fn sector_offset(&self, addr: u32) -> u32 {
        (addr - self.first_addr) % self.sector_size
    }

    pub fn is_sector_start(&self, addr: u32) -> bool {
        self.sector_offset(addr) == 0
    }

    /// True when `addr` is inside the region on a record boundary.
    pub fn is_record_slot(&self, addr: u32) -> bool {
        addr >= self.first_addr
            && addr <= self.last_addr
            && (addr - self.first_addr) % self.record_size == 0
    }

    /// Address following the record slot at `addr`, wrapping to the start.
    pub fn next_slot(&self, addr: u32) -> u32 {
        let next = addr as u64 + self.record_size as u64;
        if next > self.last_addr as u64 {
            self.first_addr
        } else {
            next as u32
        }
    }
}
