//! Storage collaborator contracts.
//!
//! The core never persists anything itself. These traits describe what it
//! needs from storage; `hb-db` provides a `SQLite` implementation and tests
//! use in-memory mocks.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::Result;
use crate::alias::{Alias, ProjectLabel};
use crate::filters::Filters;
use crate::heartbeat::Heartbeat;
use crate::summary::Summary;
use crate::summary_kind::SummaryKind;
use crate::types::UserId;

/// Heartbeat persistence.
pub trait HeartbeatStore: Send + Sync {
    /// Heartbeats of `user` with `from <= time < to`, ascending by time.
    fn get_all_within(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        user: &UserId,
    ) -> Result<Vec<Heartbeat>>;

    /// Like [`HeartbeatStore::get_all_within`], restricted to heartbeats
    /// matching `filters`.
    fn get_all_within_by_filters(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        user: &UserId,
        filters: &Filters,
    ) -> Result<Vec<Heartbeat>>;

    /// Inserts heartbeats, silently skipping hashes the user already has.
    /// Returns the number of rows actually inserted.
    fn insert_batch(&self, heartbeats: &[Heartbeat]) -> Result<usize>;

    fn get_first_by_user(&self, user: &UserId) -> Result<Option<Heartbeat>>;

    fn get_last_by_user(&self, user: &UserId) -> Result<Option<Heartbeat>>;
}

/// Persisted summary access.
pub trait SummaryStore: Send + Sync {
    /// Persisted summaries of `user` lying entirely within `[from, to]`.
    fn get_by_user_within(
        &self,
        user: &UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Summary>>;

    /// Persists `summary`, returning its row ID.
    fn insert(&self, summary: &Summary) -> Result<i64>;
}

/// Alias lookup.
pub trait AliasStore: Send + Sync {
    /// Loads the user's aliases. Idempotent.
    fn initialize_user(&self, user: &UserId) -> Result<()>;

    /// Canonical key for the raw `key`, or `key` itself without an alias.
    fn get_alias_or_default(&self, user: &UserId, kind: SummaryKind, key: &str) -> Result<String>;

    /// Every alias whose canonical key is `key`.
    fn get_by_key(&self, user: &UserId, kind: SummaryKind, key: &str) -> Result<Vec<Alias>>;
}

/// Project label lookup.
pub trait LabelStore: Send + Sync {
    fn get_by_user(&self, user: &UserId) -> Result<Vec<ProjectLabel>>;

    /// Labels mapped to the project labels carrying them.
    fn get_by_user_grouped_inverted(
        &self,
        user: &UserId,
    ) -> Result<BTreeMap<String, Vec<ProjectLabel>>> {
        let mut grouped: BTreeMap<String, Vec<ProjectLabel>> = BTreeMap::new();
        for label in self.get_by_user(user)? {
            grouped.entry(label.label.clone()).or_default().push(label);
        }
        Ok(grouped)
    }
}
