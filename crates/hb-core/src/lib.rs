//! Core domain logic for heartbeat aggregation.
//!
//! This crate contains the fundamental types and logic for:
//! - Normalization: validating, sanitizing and hashing raw heartbeats
//! - Aggregation: collapsing ordered heartbeats into durations
//! - Summaries: composing, merging and reconciling per-dimension totals
//! - Overlay: alias and label remapping of summaries
//!
//! Storage is abstracted behind the traits in [`store`].

mod aggregate;
pub mod alias;
pub mod duration;
pub mod error;
pub mod filters;
pub mod heartbeat;
pub mod normalize;
pub mod overlay;
pub mod reconcile;
pub mod store;
pub mod summary;
pub mod summary_kind;
pub mod types;
pub mod user;

#[cfg(test)]
mod testing;

pub use aggregate::aggregate;
pub use alias::{Alias, ProjectLabel};
pub use duration::{Duration, ZERO_LENGTH_DURATION};
pub use error::{BoxError, Error, Result};
pub use filters::Filters;
pub use heartbeat::{Heartbeat, RawHeartbeat};
pub use normalize::{NormalizedBatch, Normalizer, NormalizerConfig, PlaceholderPolicy, Rejection};
pub use overlay::{Overlay, SummaryRetriever};
pub use reconcile::{Interval, SummaryService, missing_intervals};
pub use store::{AliasStore, HeartbeatStore, LabelStore, SummaryStore};
pub use summary::{Summary, SummaryItem};
pub use summary_kind::{SummaryKind, UNKNOWN_KEY};
pub use types::{UserId, ValidationError};
pub use user::{DEFAULT_HEARTBEATS_TIMEOUT, RetentionPolicy, User};
