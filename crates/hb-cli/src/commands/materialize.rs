//! Materialize command: persist daily summaries for elapsed days.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};

use hb_core::{SummaryService, User};
use hb_db::Database;

use super::util::format_duration;

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    user: &User,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<()> {
    let created = SummaryService::new(db, db).materialize(from, to, user, now)?;
    for summary in &created {
        writeln!(
            writer,
            "{}  {}  ({} heartbeats)",
            user.day_of(summary.from),
            format_duration(summary.total_time()),
            summary.num_heartbeats
        )?;
    }
    writeln!(writer, "Materialized {} daily summaries", created.len())?;
    Ok(())
}
