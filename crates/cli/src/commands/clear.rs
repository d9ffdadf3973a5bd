// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use super::Target;

pub fn run(target: &Target) -> anyhow::Result<()> {
    let log = target.open_log()?;
    log.clear()?;
    println!("Cleared {}", target.image.display());
    Ok(())
}
