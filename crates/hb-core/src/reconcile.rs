//! Summary retrieval: persisted summaries plus on-demand recomputation of
//! the sub-ranges they do not cover.

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use rayon::prelude::*;

use crate::Result;
use crate::aggregate::aggregate;
use crate::duration::Duration;
use crate::filters::Filters;
use crate::store::{HeartbeatStore, SummaryStore};
use crate::summary::Summary;
use crate::user::User;

/// A half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

/// Sub-ranges of `[from, to]` not covered by `summaries`.
///
/// The gaps before the first and after the last summary are always
/// reported. Gaps between summaries are reported when `precise` is set, or
/// otherwise only when they cross a calendar day in `offset`.
pub fn missing_intervals(
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    summaries: &[Summary],
    precise: bool,
    offset: FixedOffset,
) -> Vec<Interval> {
    let mut sorted: Vec<&Summary> = summaries.iter().collect();
    sorted.sort_by_key(|s| (s.from, s.to));

    let Some((first, rest)) = sorted.split_first() else {
        return vec![Interval::new(from, to)];
    };

    let day = |t: DateTime<Utc>| t.with_timezone(&offset).date_naive();
    let mut intervals = Vec::new();

    if from < first.from {
        intervals.push(Interval::new(from, first.from));
    }

    let mut covered_until = first.to;
    for next in rest {
        let (t1, t2) = (covered_until, next.from);
        covered_until = covered_until.max(next.to);
        if t1 >= t2 || t1 >= to {
            continue;
        }
        if precise || day(t1) < day(t2) {
            intervals.push(Interval::new(t1, t2.min(to)));
        }
    }

    if to > covered_until {
        intervals.push(Interval::new(covered_until, to));
    }
    intervals
}

/// Computes durations and summaries for one user.
pub struct SummaryService<'a> {
    heartbeats: &'a dyn HeartbeatStore,
    summaries: &'a dyn SummaryStore,
    precise: bool,
}

impl<'a> SummaryService<'a> {
    pub fn new(heartbeats: &'a dyn HeartbeatStore, summaries: &'a dyn SummaryStore) -> Self {
        Self {
            heartbeats,
            summaries,
            precise: false,
        }
    }

    /// Recompute every uncovered gap, including intra-day ones.
    #[must_use]
    pub const fn with_precise(mut self, precise: bool) -> Self {
        self.precise = precise;
        self
    }

    /// Aggregates the user's heartbeats in `[from, to)` into durations.
    pub fn durations(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        user: &User,
        filters: &Filters,
    ) -> Result<Vec<Duration>> {
        let heartbeats = self.heartbeats.get_all_within(from, to, &user.id)?;
        Ok(aggregate(&heartbeats, user, filters))
    }

    /// Computes a transient summary from raw heartbeats only.
    pub fn summarize(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        user: &User,
        filters: &Filters,
    ) -> Result<Summary> {
        let durations = self.durations(from, to, user, filters)?;
        Ok(Summary::compose(user.id.clone(), &durations, from, to))
    }

    /// Combines persisted summaries with recomputed ones for the gaps.
    ///
    /// Persisted summaries are unfiltered, so with filters present every
    /// part of the range is recomputed. Gaps are recomputed in parallel; any
    /// failure fails the whole call.
    pub fn retrieve(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        user: &User,
        filters: &Filters,
    ) -> Result<Summary> {
        let persisted = if filters.is_empty() {
            self.summaries.get_by_user_within(&user.id, from, to)?
        } else {
            Vec::new()
        };

        let missing = missing_intervals(from, to, &persisted, self.precise, user.utc_offset);
        tracing::debug!(
            user = %user.id,
            persisted = persisted.len(),
            missing = missing.len(),
            "retrieving summary"
        );

        let computed = missing
            .par_iter()
            .map(|interval| self.summarize(interval.start, interval.end, user, filters))
            .collect::<Result<Vec<_>>>()?;

        let merged = Summary::merge_all(&user.id, from, to, persisted.into_iter().chain(computed))?;
        Ok(merged)
    }

    /// Persists one summary per fully elapsed calendar day in `[from, to)`
    /// that has activity and no persisted summary yet.
    ///
    /// Stored summaries span the whole day so later retrievals treat the
    /// day as covered.
    pub fn materialize(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<Vec<Summary>> {
        let mut created = Vec::new();
        let mut day = user.day_of(from);
        let last_day = user.day_of(to.min(now));

        while day < last_day {
            let start = user.start_of_day(day);
            let end = start + TimeDelta::days(1);
            day = day.succ_opt().unwrap_or(last_day);

            if start < from || end > to {
                continue;
            }
            if !self.summaries.get_by_user_within(&user.id, start, end)?.is_empty() {
                continue;
            }

            let mut summary = self.summarize(start, end, user, &Filters::new())?;
            if summary.num_heartbeats == 0 {
                continue;
            }
            summary.from = start;
            summary.to = end;
            summary.id = Some(self.summaries.insert(&summary)?);
            tracing::debug!(user = %user.id, %start, "materialized daily summary");
            created.push(summary);
        }
        Ok(created)
    }
}
