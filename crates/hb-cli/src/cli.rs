//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use hb_core::{Filters, SummaryKind};

/// Coding activity tracker.
///
/// Stores editor heartbeats and reconciles them into durations and
/// per-dimension summaries.
#[derive(Debug, Parser)]
#[command(name = "hb", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Act as this user instead of the configured one.
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import heartbeats from stdin (JSON array or one object per line).
    Import,

    /// Show per-dimension totals for a time range.
    Summary {
        #[command(flatten)]
        range: RangeArgs,

        #[command(flatten)]
        filters: FilterArgs,

        /// Skip aliases and labels.
        #[arg(long)]
        raw: bool,

        /// Recompute from heartbeats, ignoring persisted summaries.
        #[arg(long)]
        recompute: bool,

        /// Treat every gap between persisted summaries as missing.
        #[arg(long)]
        precise: bool,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List aggregated durations for a time range.
    Durations {
        #[command(flatten)]
        range: RangeArgs,

        #[command(flatten)]
        filters: FilterArgs,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List stored heartbeats for a time range.
    Heartbeats {
        #[command(flatten)]
        range: RangeArgs,

        #[command(flatten)]
        filters: FilterArgs,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Persist daily summaries for elapsed days in a range.
    Materialize {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Manage key aliases.
    #[command(subcommand)]
    Alias(AliasAction),

    /// Manage project labels.
    #[command(subcommand)]
    Label(LabelAction),

    /// Show what is stored for the current user.
    Status,
}

/// Alias subcommands.
#[derive(Debug, Subcommand)]
pub enum AliasAction {
    /// Map a raw key onto a canonical one.
    Add {
        /// Dimension the alias applies to (project, language, ...).
        kind: SummaryKind,

        /// Canonical key.
        key: String,

        /// Raw key reported by clients.
        value: String,
    },

    /// List all aliases.
    List,
}

/// Label subcommands.
#[derive(Debug, Subcommand)]
pub enum LabelAction {
    /// Attach a label to a project.
    Add {
        /// Project key (canonical, after aliasing).
        project: String,

        /// Label name.
        label: String,
    },

    /// List all project labels.
    List,
}

/// Time range shared by reporting commands.
///
/// Accepts RFC 3339 timestamps, `YYYY-MM-DD` dates (midnight in the user's
/// offset), `now`, or relative times like "2 days ago".
#[derive(Debug, Clone, Args)]
pub struct RangeArgs {
    /// Start of the range (inclusive).
    #[arg(long)]
    pub from: String,

    /// End of the range (exclusive).
    #[arg(long, default_value = "now")]
    pub to: String,
}

/// Dimension filters shared by reporting commands. Repeat a flag to accept
/// several values.
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    #[arg(long)]
    pub project: Vec<String>,

    #[arg(long)]
    pub language: Vec<String>,

    #[arg(long)]
    pub editor: Vec<String>,

    #[arg(long = "os")]
    pub operating_system: Vec<String>,

    #[arg(long)]
    pub machine: Vec<String>,

    #[arg(long)]
    pub branch: Vec<String>,

    #[arg(long)]
    pub entity: Vec<String>,

    #[arg(long)]
    pub category: Vec<String>,

    #[arg(long)]
    pub label: Vec<String>,
}

impl FilterArgs {
    pub fn to_filters(&self) -> Filters {
        let mut filters = Filters::new();
        for (kind, values) in [
            (SummaryKind::Project, &self.project),
            (SummaryKind::Language, &self.language),
            (SummaryKind::Editor, &self.editor),
            (SummaryKind::OperatingSystem, &self.operating_system),
            (SummaryKind::Machine, &self.machine),
            (SummaryKind::Branch, &self.branch),
            (SummaryKind::Entity, &self.entity),
            (SummaryKind::Category, &self.category),
            (SummaryKind::Label, &self.label),
        ] {
            filters.extend(kind, values.iter().cloned());
        }
        filters
    }
}
