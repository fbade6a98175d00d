//! Per-user and per-server settings consumed by aggregation.

use chrono::{DateTime, FixedOffset, Months, NaiveDate, NaiveTime, Offset, TimeDelta, Utc};

use crate::types::UserId;

/// Idle timeout applied when a user has not configured one.
pub const DEFAULT_HEARTBEATS_TIMEOUT: TimeDelta = TimeDelta::seconds(120);

/// The user an aggregation runs for, with their aggregation preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    /// Gap after which consecutive heartbeats no longer form one duration.
    pub heartbeats_timeout: TimeDelta,
    /// Drop durations without a project.
    pub exclude_unknown_projects: bool,
    /// Offset defining the user's calendar day.
    pub utc_offset: FixedOffset,
}

impl User {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            heartbeats_timeout: DEFAULT_HEARTBEATS_TIMEOUT,
            exclude_unknown_projects: false,
            utc_offset: Utc.fix(),
        }
    }

    #[must_use]
    pub const fn with_heartbeats_timeout(mut self, timeout: TimeDelta) -> Self {
        self.heartbeats_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_exclude_unknown_projects(mut self, exclude: bool) -> Self {
        self.exclude_unknown_projects = exclude;
        self
    }

    #[must_use]
    pub const fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    /// The calendar day `time` falls on for this user.
    pub fn day_of(&self, time: DateTime<Utc>) -> NaiveDate {
        time.with_timezone(&self.utc_offset).date_naive()
    }

    /// Midnight of `day` in the user's offset.
    pub fn start_of_day(&self, day: NaiveDate) -> DateTime<Utc> {
        day.and_time(NaiveTime::MIN).and_utc()
            - TimeDelta::seconds(i64::from(self.utc_offset.local_minus_utc()))
    }
}

/// Server-wide data retention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Months of history kept; 0 keeps everything.
    pub months: u32,
}

impl RetentionPolicy {
    pub const fn new(months: u32) -> Self {
        Self { months }
    }

    /// Oldest instant still covered by retention, if retention is enabled.
    pub fn floor(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.months == 0 {
            return None;
        }
        Some(
            now.checked_sub_months(Months::new(self.months))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        )
    }

    /// Raises `from` to the retention floor.
    pub fn clamp_from(&self, from: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        self.floor(now).map_or(from, |floor| from.max(floor))
    }
}
