// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use anyhow::Context;
use tracing::info;

use flashlog::{ChipInfo, ImageFlash, LogSnapshot, LogState};

use super::Target;

/// Creates an erased image of `capacity` bytes and an empty state sidecar.
pub fn run(target: &Target, capacity: u32) -> anyhow::Result<LogSnapshot> {
    if capacity == 0 || capacity % target.sector_size != 0 {
        anyhow::bail!(
            "capacity {capacity} is not a whole number of {}-byte sectors",
            target.sector_size
        );
    }

    ImageFlash::create(&target.image, ChipInfo::new(capacity, target.sector_size))
        .with_context(|| format!("creating image {}", target.image.display()))?;
    target
        .state_file()
        .save(LogState::new(target.config.first_valid_addr, 0))
        .with_context(|| format!("writing state file {}", target.state.display()))?;

    // Opening validates the configured geometry against the new image.
    let log = target.open_log()?;
    let snapshot = log.snapshot()?;
    info!(
        image = %target.image.display(),
        max_records = snapshot.geometry.max_records,
        "Formatted flash image"
    );

    println!(
        "Formatted {} ({} bytes, {} records of {} bytes)",
        target.image.display(),
        capacity,
        snapshot.geometry.max_records,
        snapshot.geometry.record_size
    );
    Ok(snapshot)
}
