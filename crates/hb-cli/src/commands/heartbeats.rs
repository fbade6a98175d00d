//! Heartbeats command: raw stored events for a time range.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};

use hb_core::summary_kind::key_or_unknown;
use hb_core::{AliasStore, Filters, HeartbeatStore, User};
use hb_db::Database;

use super::util::{format_time, overlay};

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
    let heartbeats = db.get_all_within_by_filters(from, to, &user.id, &filters)?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&heartbeats)?)?;
        return Ok(());
    }

    for hb in &heartbeats {
        writeln!(
            writer,
            "{}  {}  {}  {}",
            format_time(hb.time, user),
            key_or_unknown(&hb.project),
            key_or_unknown(&hb.language),
            hb.entity
        )?;
    }
    writeln!(writer, "{} heartbeats", heartbeats.len())?;
    Ok(())
}
