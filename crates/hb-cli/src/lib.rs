//! Heartbeat tracker CLI library.
//!
//! This crate provides the CLI interface for the heartbeat tracker.

mod cli;
pub mod commands;
mod config;

pub use cli::{AliasAction, Cli, Commands, FilterArgs, LabelAction, RangeArgs};
pub use config::Config;
