// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Memory back-ends.
//!
//! Both behave like NOR flash: erase sets every byte of a sector to 0xFF
//! and programming can only clear bits, so a record written over stale
//! data without an erase comes back corrupted.

pub mod image;
pub mod sim;

pub use image::ImageFlash;
pub use sim::{FlashEvent, SimulatedFlash};

use serde::{Deserialize, Serialize};

use crate::geometry::LogGeometry;
use crate::memory::{MemResult, MemoryFault};

/// Erased state of a flash byte.
pub const ERASED: u8 = 0xFF;

/// Identity and layout of a flash part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipInfo {
    pub manufacturer_id: u8,
    pub device_id: u8,
    /// Device size in bytes.
    pub capacity: u32,
    pub sector_size: u32,
}

impl ChipInfo {
    /// 64 Mbit serial NOR with 4 KiB sectors.
    pub const SST26VF064B: ChipInfo = ChipInfo {
        manufacturer_id: 0xBF,
        device_id: 0x43,
        capacity: 8 * 1024 * 1024,
        sector_size: 4096,
    };

    pub fn new(capacity: u32, sector_size: u32) -> Self {
        Self {
            manufacturer_id: 0,
            device_id: 0,
            capacity,
            sector_size,
        }
    }
}

/// Region a back-end was described for, kept so `erase_all` only touches
/// the log when the caller chose explicit bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DescribedRegion {
    pub first_addr: u32,
    pub last_addr: u32,
    pub whole_device: bool,
}

pub(crate) fn describe_chip(chip: &ChipInfo, geometry: &mut LogGeometry) -> MemResult<DescribedRegion> {
    let whole_device = geometry.uses_whole_device();
    geometry.resolve_region(chip.capacity, chip.sector_size)?;
    geometry.manufacturer_id = chip.manufacturer_id;
    geometry.device_id = chip.device_id;

    Ok(DescribedRegion {
        first_addr: geometry.first_addr,
        last_addr: geometry.last_addr,
        whole_device,
    })
}

/// Byte range `[addr, addr + len)` checked against a device of `capacity`.
pub(crate) fn span(capacity: u32, addr: u32, len: usize) -> MemResult<std::ops::Range<usize>> {
    let start = addr as usize;
    let end = start
        .checked_add(len)
        .filter(|end| *end <= capacity as usize)
        .ok_or_else(|| {
            MemoryFault::new(format!(
                "access of {len} bytes at {addr:#x} beyond device capacity {capacity:#x}"
            ))
        })?;
    Ok(start..end)
}

/// Byte range of the sector holding `addr`.
pub(crate) fn sector_span(chip: &ChipInfo, addr: u32) -> MemResult<std::ops::Range<usize>> {
    let base = addr - addr % chip.sector_size;
    span(chip.capacity, base, chip.sector_size as usize)
}

/// NOR programming: bits only go from 1 to 0.
pub(crate) fn program(cells: &mut [u8], data: &[u8]) {
    for (cell, byte) in cells.iter_mut().zip(data) {
        *cell &= *byte;
    }
}
