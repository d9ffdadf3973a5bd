// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

use super::Target;

/// One stored record, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRow {
    pub index: u32,
    pub bytes: Vec<u8>,
}

impl DumpRow {
    /// Printable prefix up to the first NUL.
    pub fn text(&self) -> String {
        let end = self.bytes.iter().position(|b| *b == 0).unwrap_or(self.bytes.len());
        String::from_utf8_lossy(&self.bytes[..end])
            .chars()
            .map(|c| if c.is_control() { '.' } else { c })
            .collect()
    }
}

/// Reads up to `limit` records starting from the newest.
pub fn collect(target: &Target, limit: Option<u32>) -> anyhow::Result<Vec<DumpRow>> {
    let log = target.open_log()?;
    let count = log.snapshot()?.state.count;
    let shown = limit.map_or(count, |limit| limit.min(count));

    (0..shown)
        .map(|index| {
            let bytes = log.read_record(index)?;
            Ok(DumpRow { index, bytes })
        })
        .collect()
}

pub fn run(target: &Target, limit: Option<u32>) -> anyhow::Result<()> {
    let rows = collect(target, limit)?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Index", "Text", "Hex"]);

    for row in &rows {
        table.add_row(vec![row.index.to_string(), row.text(), hex::encode(&row.bytes)]);
    }

    println!("\nStored Records ({} shown, newest first)\n", rows.len());
    println!("{table}\n");
    Ok(())
}
