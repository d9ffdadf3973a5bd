// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Position recovery at initialize.
//!
//! Only two integers survive a reset: the write pointer and the record
//! count. Once the ring has wrapped, the raw count alone is ambiguous, so
//! it is re-derived from where the write pointer sits inside its sector.

use tracing::{debug, warn};

use crate::geometry::{LogGeometry, LogState};

/// Rebuilds the state from a persisted seed.
///
/// An inconsistent seed (count above capacity, pointer outside the region
/// or off a record boundary) yields an empty log at `first_addr`.
pub fn recover_state(geometry: &LogGeometry, seed: LogState) -> LogState {
    if seed.count > geometry.max_records || !geometry.is_record_slot(seed.write_ptr) {
        warn!(
            write_ptr = seed.write_ptr,
            count = seed.count,
            "Persisted log position inconsistent with geometry, starting empty"
        );
        return LogState::new(geometry.first_addr, 0);
    }

    let write_ptr = seed.write_ptr;
    let floor = geometry.final_sector_floor();

    let count = if seed.count >= floor {
        let in_sector = geometry.sector_offset(write_ptr) / geometry.record_size;
        if in_sector == 0 && seed.count > floor {
            // Pointer on a boundary past the floor: the ring is full and the
            // sector ahead still holds the oldest records.
            geometry.max_records
        } else {
            floor + in_sector
        }
    } else {
        (write_ptr - geometry.first_addr) / geometry.record_size
    };

    if count != seed.count {
        debug!(seed = seed.count, recovered = count, "Re-derived record count");
    }

    LogState::new(write_ptr, count)
}
