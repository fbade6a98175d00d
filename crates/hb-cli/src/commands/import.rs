//! Import command for ingesting heartbeats into the local `SQLite` store.

use std::io::{BufRead, Read, Write};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use hb_core::{HeartbeatStore, Normalizer, RawHeartbeat, User};
use hb_db::Database;

use crate::Config;

/// Counts reported after an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportReport {
    pub inserted: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

/// Reads heartbeats from `reader`, normalizes them for `user` and stores the
/// accepted ones.
pub fn run<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
    db: &Database,
    config: &Config,
    user: &User,
    now: DateTime<Utc>,
) -> Result<ImportReport> {
    let raws = parse_heartbeats(reader)?;
    let submitted = raws.len();

    let normalizer = Normalizer::new(config.normalizer_config()?);
    let last = db.get_last_by_user(&user.id)?;
    let batch = normalizer.normalize_batch(raws, &user.id, last, now);

    let inserted = db.insert_batch(&batch.accepted)?;
    let report = ImportReport {
        inserted,
        duplicates: batch.duplicates + (batch.accepted.len() - inserted),
        rejected: batch.rejected.len(),
    };
    tracing::info!(submitted, ?report, user = %user.id, "imported heartbeats");

    for rejection in &batch.rejected {
        writeln!(writer, "rejected #{}: {}", rejection.index, rejection.error)?;
    }
    writeln!(
        writer,
        "Imported {} heartbeats ({} duplicates, {} rejected)",
        report.inserted, report.duplicates, report.rejected
    )?;
    Ok(report)
}

/// Parses a JSON array of heartbeats, or one heartbeat object per line.
fn parse_heartbeats<R: BufRead>(mut reader: R) -> Result<Vec<RawHeartbeat>> {
    let mut input = String::new();
    reader
        .read_to_string(&mut input)
        .context("failed to read input")?;

    if input.trim_start().starts_with('[') {
        return serde_json::from_str(&input).context("invalid JSON array");
    }

    let mut heartbeats = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let parsed: RawHeartbeat = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid JSON on line {}", idx + 1))?;
        heartbeats.push(parsed);
    }
    Ok(heartbeats)
}
