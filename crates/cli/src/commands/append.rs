// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use anyhow::Context;

use flashlog::LogState;

use super::Target;

/// Appends each payload as one record, write-through. Payloads shorter than
/// the record size are zero padded.
pub fn run(target: &Target, payloads: &[String], as_hex: bool) -> anyhow::Result<LogState> {
    let log = target.open_log()?;
    let record_size = log.snapshot()?.geometry.record_size as usize;

    let mut state = log.snapshot()?.state;
    for payload in payloads {
        let bytes = if as_hex {
            hex::decode(payload).with_context(|| format!("payload {payload:?} is not hex"))?
        } else {
            payload.as_bytes().to_vec()
        };
        if bytes.len() > record_size {
            anyhow::bail!(
                "payload of {} bytes does not fit a {record_size}-byte record",
                bytes.len()
            );
        }

        let mut record = vec![0u8; record_size];
        record[..bytes.len()].copy_from_slice(&bytes);
        state = log.commit_sync(&record)?;
    }

    println!("Appended {} record(s), {} stored", payloads.len(), state.count);
    Ok(state)
}
