//! CLI subcommand implementations.

pub mod alias;
pub mod durations;
pub mod heartbeats;
pub mod import;
pub mod label;
pub mod materialize;
pub mod status;
pub mod summary;
pub mod util;

#[cfg(test)]
mod fixtures;
