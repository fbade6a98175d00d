//! Durations command: continuous activity intervals for a time range.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};

use hb_core::summary_kind::key_or_unknown;
use hb_core::{AliasStore, Filters, SummaryService, User};
use hb_db::Database;

use super::util::{format_duration, format_time, overlay};

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    user: &User,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    filters: &Filters,
    json: bool,
) -> Result<()> {
    db.initialize_user(&user.id)?;
    let filters = overlay(db, false).expand_filters(&user.id, filters)?;
    let durations = SummaryService::new(db, db).durations(from, to, user, &filters)?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&durations)?)?;
        return Ok(());
    }

    if durations.is_empty() {
        writeln!(writer, "No durations in range.")?;
        return Ok(());
    }
    for d in &durations {
        writeln!(
            writer,
            "{}  {}  {}  {}  {}  ({} heartbeats)",
            format_time(d.start, user),
            format_duration(d.length),
            key_or_unknown(&d.project),
            key_or_unknown(&d.language),
            key_or_unknown(&d.entity),
            d.num_heartbeats
        )?;
    }
    let total: TimeDelta = durations.iter().map(|d| d.length).sum();
    writeln!(
        writer,
        "{} durations, {} total",
        durations.len(),
        format_duration(total)
    )?;
    Ok(())
}
