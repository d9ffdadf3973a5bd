// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

use flashlog::LogSnapshot;

use super::Target;

pub fn run(target: &Target, json: bool) -> anyhow::Result<LogSnapshot> {
    let log = target.open_log()?;
    let snapshot = log.snapshot()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(snapshot);
    }

    let geometry = &snapshot.geometry;
    let state = &snapshot.state;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Field", "Value"]);

    table.add_row(vec!["Image".to_string(), target.image.display().to_string()]);
    table.add_row(vec!["State file".to_string(), target.state.display().to_string()]);
    table.add_row(vec![
        "Region".to_string(),
        format!("{:#010x} - {:#010x}", geometry.first_addr, geometry.last_addr),
    ]);
    table.add_row(vec!["Sector size".to_string(), geometry.sector_size.to_string()]);
    table.add_row(vec!["Record size".to_string(), geometry.record_size.to_string()]);
    table.add_row(vec![
        "Records per sector".to_string(),
        geometry.records_per_sector.to_string(),
    ]);
    table.add_row(vec!["Capacity (records)".to_string(), geometry.max_records.to_string()]);
    table.add_row(vec!["Write pointer".to_string(), format!("{:#010x}", state.write_ptr)]);
    table.add_row(vec!["Records".to_string(), state.count.to_string()]);

    println!("\nEvent Log Status\n");
    println!("{table}\n");

    Ok(snapshot)
}
