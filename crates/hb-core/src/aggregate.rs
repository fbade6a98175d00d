//! Duration aggregation.
//!
//! Collapses a time-ordered heartbeat stream into non-overlapping durations.
//!
//! # Algorithm Summary
//!
//! 1. Fold over the heartbeats, tracking one list of durations per group
//!    signature plus the most recently touched duration overall.
//! 2. Each heartbeat extends the latest duration by the elapsed gap (capped
//!    at the idle timeout, zero across a calendar-day boundary).
//! 3. A new duration opens when the gap reaches the timeout, the signature
//!    changes, or the day changes.
//! 4. Filters and the unknown-project exclusion apply only afterwards, so
//!    interleaved non-matching activity never creates artificial gaps.

use std::collections::HashMap;

use chrono::TimeDelta;

use crate::duration::{Duration, ZERO_LENGTH_DURATION};
use crate::filters::Filters;
use crate::heartbeat::Heartbeat;
use crate::user::User;

/// Accumulator threaded through the aggregation fold.
#[derive(Debug, Default)]
struct AggregationState {
    groups: HashMap<String, Vec<Duration>>,
    /// Group signature and index of the most recently touched duration.
    latest: Option<(String, usize)>,
}

impl AggregationState {
    fn step(mut self, heartbeat: &Heartbeat, user: &User) -> Self {
        let candidate = Duration::from_heartbeat(heartbeat);
        let timeout = idle_timeout(user);

        let latest = self
            .latest
            .as_ref()
            .and_then(|(signature, index)| self.groups.get_mut(signature)?.get_mut(*index));
        let Some(latest) = latest else {
            return self.open(candidate);
        };

        let same_day = user.day_of(candidate.start) == user.day_of(latest.start);
        let gap = if same_day {
            (candidate.start - latest.end()).clamp(TimeDelta::zero(), timeout)
        } else {
            TimeDelta::zero()
        };
        latest.length += gap;

        if gap >= timeout || latest.group_hash != candidate.group_hash || !same_day {
            self.open(candidate)
        } else {
            latest.num_heartbeats += 1;
            self
        }
    }

    fn open(mut self, duration: Duration) -> Self {
        let signature = duration.group_hash.clone();
        let list = self.groups.entry(signature.clone()).or_default();
        list.push(duration);
        self.latest = Some((signature, list.len() - 1));
        self
    }
}

/// The user's idle timeout, with negative values treated as zero.
fn idle_timeout(user: &User) -> TimeDelta {
    user.heartbeats_timeout.max(TimeDelta::zero())
}

/// Aggregates `heartbeats` (ascending by time, one user) into durations.
///
/// Non-matching durations are dropped after aggregation. The result is
/// sorted by start time.
pub fn aggregate(heartbeats: &[Heartbeat], user: &User, filters: &Filters) -> Vec<Duration> {
    debug_assert!(
        heartbeats.windows(2).all(|w| w[0].time <= w[1].time),
        "heartbeats must be ordered by time"
    );

    let state = heartbeats
        .iter()
        .fold(AggregationState::default(), |state, heartbeat| {
            state.step(heartbeat, user)
        });

    let mut durations: Vec<Duration> = state
        .groups
        .into_values()
        .flatten()
        .filter(|d| filters.matches(d))
        .filter(|d| !(user.exclude_unknown_projects && d.project.is_empty()))
        .collect();

    // A lone heartbeat is assumed to stand for a full timeout of work.
    if heartbeats.len() == 1 {
        if let [only] = durations.as_mut_slice() {
            only.length = idle_timeout(user);
        }
    }
    for duration in &mut durations {
        if duration.length.is_zero() {
            duration.length = ZERO_LENGTH_DURATION;
        }
    }

    durations.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| a.group_hash.cmp(&b.group_hash))
    });

    tracing::debug!(
        user = %user.id,
        heartbeats = heartbeats.len(),
        durations = durations.len(),
        "aggregated durations"
    );
    durations
}
