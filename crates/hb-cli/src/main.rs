use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hb_cli::commands::{alias, durations, heartbeats, import, label, materialize, status, summary, util};
use hb_cli::{AliasAction, Cli, Commands, Config, LabelAction};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(hb_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = hb_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so command output stays pipeable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (db, config) = open_database(cli.config.as_deref())?;
    let user = config.user(cli.user.as_deref())?;
    let now = Utc::now();
    let mut out = io::stdout().lock();

    match command {
        Commands::Import => {
            import::run(io::stdin().lock(), &mut out, &db, &config, &user, now)?;
        }
        Commands::Summary {
            range,
            filters,
            raw,
            recompute,
            precise,
            json,
        } => {
            let (from, to) = util::resolve_range(range, &user, &config, now)?;
            let options = summary::Options {
                raw: *raw,
                recompute: *recompute,
                precise: *precise,
                json: *json,
            };
            summary::run(&mut out, &db, &user, from, to, &filters.to_filters(), options)?;
        }
        Commands::Durations {
            range,
            filters,
            json,
        } => {
            let (from, to) = util::resolve_range(range, &user, &config, now)?;
            durations::run(&mut out, &db, &user, from, to, &filters.to_filters(), *json)?;
        }
        Commands::Heartbeats {
            range,
            filters,
            json,
        } => {
            let (from, to) = util::resolve_range(range, &user, &config, now)?;
            heartbeats::run(&mut out, &db, &user, from, to, &filters.to_filters(), *json)?;
        }
        Commands::Materialize { range } => {
            let (from, to) = util::resolve_range(range, &user, &config, now)?;
            materialize::run(&mut out, &db, &user, from, to, now)?;
        }
        Commands::Alias(action) => match action {
            AliasAction::Add { kind, key, value } => {
                alias::add(&mut out, &db, &user, *kind, key, value)?;
            }
            AliasAction::List => alias::list(&mut out, &db, &user)?,
        },
        Commands::Label(action) => match action {
            LabelAction::Add { project, label: name } => {
                label::add(&mut out, &db, &user, project, name)?;
            }
            LabelAction::List => label::list(&mut out, &db, &user)?,
        },
        Commands::Status => status::run(&mut out, &db, &config.database_path, &user)?,
    }

    out.flush()?;
    Ok(())
}
