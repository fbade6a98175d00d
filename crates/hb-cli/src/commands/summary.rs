//! Summary command: per-dimension totals for a time range.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};

use hb_core::{Filters, Summary, SummaryKind, SummaryRetriever, SummaryService, User};
use hb_db::Database;

use super::util::{format_duration, format_time, overlay};

/// How the summary is obtained and printed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Skip aliases and labels.
    pub raw: bool,
    /// Ignore persisted summaries.
    pub recompute: bool,
    pub precise: bool,
    pub json: bool,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    user: &User,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    filters: &Filters,
    options: Options,
) -> Result<()> {
    let retriever = if options.recompute {
        SummaryRetriever::Summarize
    } else {
        SummaryRetriever::Retrieve
    };

    let summary = if options.raw {
        let service = SummaryService::new(db, db).with_precise(options.precise);
        let summary = match retriever {
            SummaryRetriever::Retrieve => service.retrieve(from, to, user, filters)?,
            SummaryRetriever::Summarize => service.summarize(from, to, user, filters)?,
        };
        summary.sorted()
    } else {
        overlay(db, options.precise).aliased(from, to, user, retriever, filters)?
    };

    if options.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&summary)?)?;
    } else {
        write_text(writer, &summary, user)?;
    }
    Ok(())
}

const fn section_title(kind: SummaryKind) -> &'static str {
    match kind {
        SummaryKind::Project => "Projects",
        SummaryKind::Language => "Languages",
        SummaryKind::Editor => "Editors",
        SummaryKind::OperatingSystem => "Operating systems",
        SummaryKind::Machine => "Machines",
        SummaryKind::Label => "Labels",
        SummaryKind::Branch => "Branches",
        SummaryKind::Entity => "Entities",
        SummaryKind::Category => "Categories",
    }
}

fn write_text<W: Write>(writer: &mut W, summary: &Summary, user: &User) -> Result<()> {
    writeln!(writer, "Summary for {}", summary.user_id)?;
    writeln!(
        writer,
        "{} .. {}",
        format_time(summary.from, user),
        format_time(summary.to, user)
    )?;

    if summary.num_heartbeats == 0 && summary.total_time().is_zero() {
        writeln!(writer, "No activity recorded.")?;
        return Ok(());
    }
    writeln!(
        writer,
        "Total: {} ({} heartbeats)",
        format_duration(summary.total_time()),
        summary.num_heartbeats
    )?;

    for kind in SummaryKind::ALL {
        let items = summary.items(kind);
        if items.is_empty() {
            continue;
        }
        let width = items.iter().map(|i| i.key.chars().count()).max().unwrap_or(0);
        writeln!(writer)?;
        writeln!(writer, "{}", section_title(kind))?;
        for item in items {
            writeln!(
                writer,
                "  {:<width$}  {}",
                item.key,
                format_duration(item.total)
            )?;
        }
    }
    Ok(())
}
