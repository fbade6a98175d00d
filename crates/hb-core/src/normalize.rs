//! Heartbeat normalization: validation, sanitization, placeholder
//! resolution, language inference and hashing.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::heartbeat::{
    Heartbeat, LAST_BRANCH_PLACEHOLDER, LAST_LANGUAGE_PLACEHOLDER, LAST_PROJECT_PLACEHOLDER,
    RawHeartbeat,
};
use crate::types::{UserId, ValidationError};

/// What to do with "reuse the last value" sentinels that survive sanitization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderPolicy {
    /// Take the value from the user's previous heartbeat, or clear it if there is none.
    #[default]
    ResolveFromLast,
    /// Always clear the value.
    Strip,
}

/// Configuration for heartbeat normalization.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Oldest heartbeat accepted at ingestion.
    /// Default: 180 days.
    pub max_age: TimeDelta,

    /// File suffix (without leading dot) to language name.
    pub language_mappings: BTreeMap<String, String>,

    pub placeholder_policy: PlaceholderPolicy,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_age: TimeDelta::days(180),
            language_mappings: BTreeMap::new(),
            placeholder_policy: PlaceholderPolicy::default(),
        }
    }
}

/// A record rejected during batch normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Position of the record in the submitted batch.
    pub index: usize,
    pub error: ValidationError,
}

/// Outcome of normalizing a batch.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Heartbeats ready for insertion, in submission order.
    pub accepted: Vec<Heartbeat>,
    pub rejected: Vec<Rejection>,
    /// Records dropped because an earlier record in the batch had the same hash.
    pub duplicates: usize,
}

/// Turns raw client heartbeats into hashed, storable ones.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub const fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalizes one heartbeat for `owner`.
    ///
    /// `last` is the user's previously accepted heartbeat, used to resolve
    /// placeholders under [`PlaceholderPolicy::ResolveFromLast`].
    pub fn normalize(
        &self,
        raw: RawHeartbeat,
        owner: &UserId,
        last: Option<&Heartbeat>,
    ) -> Result<Heartbeat, ValidationError> {
        let mut heartbeat = raw.into_heartbeat(owner)?.sanitized();
        heartbeat.validate(owner)?;
        self.resolve_placeholders(&mut heartbeat, last);
        if heartbeat.language.is_empty() {
            if let Some(language) = infer_language(&heartbeat.entity, &self.config.language_mappings)
            {
                heartbeat.language = language.to_string();
            }
        }
        Ok(heartbeat.hashed())
    }

    /// Returns true if `heartbeat` falls inside the ingestion window at `now`.
    pub fn is_timely(&self, heartbeat: &Heartbeat, now: DateTime<Utc>) -> bool {
        heartbeat.is_timely(self.config.max_age, now)
    }

    /// Normalizes a batch, rejecting invalid or untimely records individually
    /// and dropping in-batch hash duplicates.
    pub fn normalize_batch(
        &self,
        raws: Vec<RawHeartbeat>,
        owner: &UserId,
        last: Option<Heartbeat>,
        now: DateTime<Utc>,
    ) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut last = last;

        for (index, raw) in raws.into_iter().enumerate() {
            let heartbeat = match self.normalize(raw, owner, last.as_ref()) {
                Ok(heartbeat) => heartbeat,
                Err(error) => {
                    tracing::warn!(index, %error, "rejected heartbeat");
                    batch.rejected.push(Rejection { index, error });
                    continue;
                }
            };

            if !self.is_timely(&heartbeat, now) {
                let error = ValidationError::Untimely {
                    time: heartbeat.time.to_rfc3339(),
                };
                tracing::warn!(index, %error, "rejected heartbeat");
                batch.rejected.push(Rejection { index, error });
                continue;
            }

            if !seen.insert(heartbeat.hash.clone()) {
                batch.duplicates += 1;
                continue;
            }

            last = Some(heartbeat.clone());
            batch.accepted.push(heartbeat);
        }

        tracing::debug!(
            accepted = batch.accepted.len(),
            rejected = batch.rejected.len(),
            duplicates = batch.duplicates,
            "normalized heartbeat batch"
        );
        batch
    }

    fn resolve_placeholders(&self, heartbeat: &mut Heartbeat, last: Option<&Heartbeat>) {
        let policy = self.config.placeholder_policy;
        let resolve = |value: &mut String, placeholder: &str, previous: Option<&str>| {
            if value == placeholder {
                *value = match policy {
                    PlaceholderPolicy::ResolveFromLast => previous.unwrap_or_default().to_string(),
                    PlaceholderPolicy::Strip => String::new(),
                };
            }
        };

        resolve(
            &mut heartbeat.project,
            LAST_PROJECT_PLACEHOLDER,
            last.map(|h| h.project.as_str()),
        );
        resolve(
            &mut heartbeat.branch,
            LAST_BRANCH_PLACEHOLDER,
            last.map(|h| h.branch.as_str()),
        );
        resolve(
            &mut heartbeat.language,
            LAST_LANGUAGE_PLACEHOLDER,
            last.map(|h| h.language.as_str()),
        );
    }
}

/// Infers a language from the entity's file suffix.
///
/// When several suffixes match, the one with the most dots wins
/// (`blade.php` beats `php`).
pub fn infer_language<'a>(
    entity: &str,
    mappings: &'a BTreeMap<String, String>,
) -> Option<&'a str> {
    mappings
        .iter()
        .map(|(suffix, language)| (suffix.trim_start_matches('.'), language))
        .filter(|(suffix, _)| {
            !suffix.is_empty()
                && entity.len() > suffix.len()
                && entity.ends_with(suffix)
                && entity[..entity.len() - suffix.len()].ends_with('.')
        })
        .max_by_key(|(suffix, _)| (suffix.matches('.').count(), suffix.len()))
        .map(|(_, language)| language.as_str())
}
