//! Dimension filters.

use std::collections::{BTreeMap, BTreeSet};

use crate::duration::Duration;
use crate::summary_kind::{SummaryKind, UNKNOWN_KEY};

/// Accepted values per dimension.
///
/// Constraints are ANDed across dimensions and ORed within one. A dimension
/// with no values imposes no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    values: BTreeMap<SummaryKind, BTreeSet<String>>,
    /// Set when a constraint resolved to no acceptable values.
    unsatisfiable: bool,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Filters::insert`].
    #[must_use]
    pub fn with(mut self, kind: SummaryKind, value: impl Into<String>) -> Self {
        self.insert(kind, value);
        self
    }

    pub fn insert(&mut self, kind: SummaryKind, value: impl Into<String>) {
        self.values.entry(kind).or_default().insert(value.into());
    }

    pub fn extend<I, S>(&mut self, kind: SummaryKind, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values
            .entry(kind)
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    /// Accepted values for `kind`, or `None` if `kind` is unconstrained.
    pub fn values(&self, kind: SummaryKind) -> Option<&BTreeSet<String>> {
        self.values.get(&kind).filter(|set| !set.is_empty())
    }

    pub fn has(&self, kind: SummaryKind) -> bool {
        self.values(kind).is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.unsatisfiable && self.values.values().all(BTreeSet::is_empty)
    }

    /// Makes these filters reject every duration.
    pub const fn reject_all(&mut self) {
        self.unsatisfiable = true;
    }

    /// True when no duration can satisfy these filters.
    pub const fn rejects_all(&self) -> bool {
        self.unsatisfiable
    }

    /// Constrained dimensions with their accepted values.
    pub fn iter(&self) -> impl Iterator<Item = (SummaryKind, &BTreeSet<String>)> {
        self.values
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(kind, set)| (*kind, set))
    }

    /// True when the caller drills into specific projects, which is when
    /// branch and entity breakdowns are meaningful.
    pub fn is_project_details(&self) -> bool {
        self.has(SummaryKind::Project) || self.has(SummaryKind::Label)
    }

    /// Returns true if `duration` satisfies every constraint.
    ///
    /// Labels are resolved to projects before aggregation and are not
    /// matched here. An empty value matches the `unknown` key.
    pub fn matches(&self, duration: &Duration) -> bool {
        !self.unsatisfiable
            && self
                .iter()
                .filter(|(kind, _)| *kind != SummaryKind::Label)
                .all(|(kind, accepted)| {
                    let value = duration.key(kind);
                    accepted.contains(value)
                        || (value.is_empty() && accepted.contains(UNKNOWN_KEY))
                })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heartbeat::RawHeartbeat;
    use crate::types::UserId;

    fn duration(project: &str, language: &str) -> Duration {
        let hb = RawHeartbeat {
            entity: Some("main.go".to_string()),
            project: Some(project.to_string()),
            language: Some(language.to_string()),
            time: 1_700_000_000.0,
            ..RawHeartbeat::default()
        }
        .into_heartbeat(&UserId::new("alice").unwrap())
        .unwrap();
        Duration::from_heartbeat(&hb)
    }

    #[test]
    fn empty_filters_match_everything() {
        let filters = Filters::new();
        assert!(filters.is_empty());
        assert!(filters.matches(&duration("wakapi", "Go")));
    }

    #[test]
    fn or_within_and_across_dimensions() {
        let filters = Filters::new()
            .with(SummaryKind::Project, "wakapi")
            .with(SummaryKind::Project, "anchr")
            .with(SummaryKind::Language, "Go");

        assert!(filters.matches(&duration("wakapi", "Go")));
        assert!(filters.matches(&duration("anchr", "Go")));
        assert!(!filters.matches(&duration("anchr", "Java")));
        assert!(!filters.matches(&duration("other", "Go")));
    }

    #[test]
    fn unknown_matches_empty_values() {
        let filters = Filters::new().with(SummaryKind::Project, "unknown");
        assert!(filters.matches(&duration("", "Go")));
        assert!(!filters.matches(&duration("wakapi", "Go")));
    }

    #[test]
    fn empty_value_set_is_unconstrained() {
        let mut filters = Filters::new();
        filters.extend(SummaryKind::Project, Vec::<String>::new());
        assert!(filters.is_empty());
        assert!(!filters.has(SummaryKind::Project));
        assert!(filters.matches(&duration("wakapi", "Go")));
    }

    #[test]
    fn labels_are_not_matched_against_durations() {
        let filters = Filters::new().with(SummaryKind::Label, "work");
        assert!(filters.matches(&duration("wakapi", "Go")));
        assert!(filters.is_project_details());
    }

    #[test]
    fn rejecting_filters_match_nothing() {
        let mut filters = Filters::new();
        filters.reject_all();
        assert!(filters.rejects_all());
        assert!(!filters.is_empty());
        assert!(!filters.matches(&duration("wakapi", "Go")));
    }
}
