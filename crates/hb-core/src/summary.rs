//! Summaries: per-dimension totals over a time range.

use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::duration::{Duration, millis};
use crate::summary_kind::{SummaryKind, UNKNOWN_KEY, key_or_unknown};
use crate::types::{UserId, ValidationError};

/// Accumulated time for one key of one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryItem {
    pub kind: SummaryKind,
    pub key: String,
    #[serde(with = "millis", rename = "total_ms")]
    pub total: TimeDelta,
}

impl SummaryItem {
    pub fn new(kind: SummaryKind, key: impl Into<String>, total: TimeDelta) -> Self {
        Self {
            kind,
            key: key.into(),
            total,
        }
    }
}

/// Aggregate activity of one user over `[from, to)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Storage row ID for persisted summaries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub user_id: UserId,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub num_heartbeats: u64,
    pub projects: Vec<SummaryItem>,
    pub languages: Vec<SummaryItem>,
    pub editors: Vec<SummaryItem>,
    pub operating_systems: Vec<SummaryItem>,
    pub machines: Vec<SummaryItem>,
    pub labels: Vec<SummaryItem>,
    pub branches: Vec<SummaryItem>,
    pub entities: Vec<SummaryItem>,
    pub categories: Vec<SummaryItem>,
}

impl Summary {
    /// A zero-valued summary bounded by the requested range.
    pub const fn empty(user_id: UserId, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            id: None,
            user_id,
            from,
            to,
            num_heartbeats: 0,
            projects: Vec::new(),
            languages: Vec::new(),
            editors: Vec::new(),
            operating_systems: Vec::new(),
            machines: Vec::new(),
            labels: Vec::new(),
            branches: Vec::new(),
            entities: Vec::new(),
            categories: Vec::new(),
        }
    }

    /// Folds `durations` into a summary for `[from, to)`.
    ///
    /// With activity present, the bounds tighten to the earliest start and
    /// the latest end, never leaving the requested range.
    pub fn compose(
        user_id: UserId,
        durations: &[Duration],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Self {
        let mut summary = Self::empty(user_id, from, to);

        for duration in durations {
            for kind in SummaryKind::COMPOSED {
                summary.add(kind, key_or_unknown(duration.key(kind)), duration.length);
            }
            summary.num_heartbeats += u64::from(duration.num_heartbeats);
        }

        let first = durations.iter().map(|d| d.start).min();
        let last = durations.iter().map(Duration::end).max();
        if let (Some(first), Some(last)) = (first, last) {
            summary.from = first.max(from).min(to);
            summary.to = last.min(to).max(summary.from);
        }
        summary
    }

    pub fn items(&self, kind: SummaryKind) -> &[SummaryItem] {
        match kind {
            SummaryKind::Project => &self.projects,
            SummaryKind::Language => &self.languages,
            SummaryKind::Editor => &self.editors,
            SummaryKind::OperatingSystem => &self.operating_systems,
            SummaryKind::Machine => &self.machines,
            SummaryKind::Label => &self.labels,
            SummaryKind::Branch => &self.branches,
            SummaryKind::Entity => &self.entities,
            SummaryKind::Category => &self.categories,
        }
    }

    pub fn items_mut(&mut self, kind: SummaryKind) -> &mut Vec<SummaryItem> {
        match kind {
            SummaryKind::Project => &mut self.projects,
            SummaryKind::Language => &mut self.languages,
            SummaryKind::Editor => &mut self.editors,
            SummaryKind::OperatingSystem => &mut self.operating_systems,
            SummaryKind::Machine => &mut self.machines,
            SummaryKind::Label => &mut self.labels,
            SummaryKind::Branch => &mut self.branches,
            SummaryKind::Entity => &mut self.entities,
            SummaryKind::Category => &mut self.categories,
        }
    }

    /// Adds `total` to the item keyed `key`, creating it if absent.
    pub fn add(&mut self, kind: SummaryKind, key: &str, total: TimeDelta) {
        let items = self.items_mut(kind);
        match items.iter_mut().find(|item| item.key == key) {
            Some(item) => item.total += total,
            None => items.push(SummaryItem::new(kind, key, total)),
        }
    }

    /// True when the summary recorded heartbeats or any item.
    pub fn has_activity(&self) -> bool {
        self.num_heartbeats > 0 || SummaryKind::ALL.iter().any(|kind| !self.items(*kind).is_empty())
    }

    /// Adds every item and the heartbeat count of `other`.
    ///
    /// Bounds widen to cover `other` only if it saw activity; a summary
    /// without activity so far takes over the bounds of one with activity.
    pub fn absorb(&mut self, other: &Self) {
        if other.has_activity() {
            if self.has_activity() {
                self.from = self.from.min(other.from);
                self.to = self.to.max(other.to);
            } else {
                self.from = other.from;
                self.to = other.to;
            }
        }
        for kind in SummaryKind::ALL {
            for item in other.items(kind) {
                self.add(kind, &item.key, item.total);
            }
        }
        self.num_heartbeats += other.num_heartbeats;
    }

    /// Merges `summaries` into one.
    ///
    /// Summaries covering an identical range are counted once. Returns an
    /// empty summary for `[from, to)` when there is nothing to merge.
    pub fn merge_all(
        user_id: &UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        summaries: impl IntoIterator<Item = Self>,
    ) -> Result<Self, ValidationError> {
        let mut processed = HashSet::new();
        let mut merged: Option<Self> = None;

        for summary in summaries {
            if &summary.user_id != user_id {
                return Err(ValidationError::UserMismatch {
                    expected: user_id.to_string(),
                    actual: summary.user_id.to_string(),
                });
            }
            if !processed.insert((summary.from, summary.to)) {
                tracing::warn!(
                    user = %user_id,
                    from = %summary.from,
                    to = %summary.to,
                    "skipping summary covering an already merged range"
                );
                continue;
            }
            match merged.as_mut() {
                Some(acc) => acc.absorb(&summary),
                None => {
                    let mut first = summary;
                    first.id = None;
                    merged = Some(first);
                }
            }
        }

        Ok(match merged {
            Some(summary) if summary.has_activity() => summary,
            _ => Self::empty(user_id.clone(), from, to),
        })
    }

    /// Total time, read from the first non-empty duration-derived dimension.
    pub fn total_time(&self) -> TimeDelta {
        SummaryKind::COMPOSED
            .iter()
            .map(|kind| self.items(*kind))
            .find(|items| !items.is_empty())
            .map_or_else(TimeDelta::zero, |items| items.iter().map(|i| i.total).sum())
    }

    pub fn total_time_by(&self, kind: SummaryKind) -> TimeDelta {
        self.items(kind).iter().map(|i| i.total).sum()
    }

    pub fn total_time_by_key(&self, kind: SummaryKind, key: &str) -> TimeDelta {
        self.items(kind)
            .iter()
            .filter(|i| i.key == key)
            .map(|i| i.total)
            .sum()
    }

    /// Gives every empty non-label dimension a single `unknown` item worth
    /// the total time, so all dimensions add up to the same total.
    pub fn fill_missing(&mut self) {
        let total = self.total_time();
        if total.is_zero() {
            return;
        }
        for kind in SummaryKind::COMPOSED {
            let items = self.items_mut(kind);
            if items.is_empty() {
                items.push(SummaryItem::new(kind, UNKNOWN_KEY, total));
            }
        }
    }

    /// Sorts every dimension by total descending, then key.
    #[must_use]
    pub fn sorted(mut self) -> Self {
        for kind in SummaryKind::ALL {
            self.items_mut(kind)
                .sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.key.cmp(&b.key)));
        }
        self
    }
}
