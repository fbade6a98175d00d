//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use regex::Regex;

use hb_core::{Overlay, SummaryService, User};
use hb_db::Database;

use crate::Config;
use crate::cli::RangeArgs;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").unwrap());

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Parse a datetime string relative to `now` for `user`.
///
/// Supports:
/// - RFC 3339: "2026-01-15T10:30:00Z"
/// - Dates: "2026-01-15", midnight in the user's offset
/// - "now"
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
pub fn parse_datetime(s: &str, user: &User, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();
    if s == "now" {
        return Ok(now);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(day) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(user.start_of_day(day));
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use RFC 3339 (e.g., 2026-01-15T10:30:00Z), a date (2026-01-15) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - TimeDelta::minutes(n * minutes_per_unit))
}

/// Resolves a range for `user`, raising `from` to the retention floor.
pub fn resolve_range(
    range: &RangeArgs,
    user: &User,
    config: &Config,
    now: DateTime<Utc>,
) -> anyhow::Result<(DateTime<Utc>, DateTime<Utc>)> {
    let from = parse_datetime(&range.from, user, now).context("invalid --from")?;
    let to = parse_datetime(&range.to, user, now).context("invalid --to")?;
    if to < from {
        anyhow::bail!("--to ({to}) is before --from ({from})");
    }
    Ok((config.retention().clamp_from(from, now), to))
}

/// Wires the database into the summary service and overlay.
pub fn overlay(db: &Database, precise: bool) -> Overlay<'_> {
    Overlay::new(SummaryService::new(db, db).with_precise(precise), db, db)
}

/// Formats a length as "Xh Ym", "Xm Ys" or "Xs".
pub fn format_duration(length: TimeDelta) -> String {
    let total_seconds = length.num_seconds().max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else if minutes >= 1 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Formats an instant in the user's offset, to the second.
pub fn format_time(time: DateTime<Utc>, user: &User) -> String {
    time.with_timezone(&user.utc_offset)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{FixedOffset, TimeZone};
    use hb_core::UserId;

    fn user() -> User {
        User::new(UserId::new("alice").unwrap())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse_datetime("2024-03-01T10:30:00+02:00", &user(), now()).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_date_uses_user_offset() {
        let dt = parse_datetime("2024-03-01", &user(), now()).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());

        let berlin = user().with_utc_offset(FixedOffset::east_opt(3600).unwrap());
        let dt = parse_datetime("2024-03-01", &berlin, now()).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 2, 29, 23, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_now_and_relative() {
        assert_eq!(parse_datetime("now", &user(), now()).unwrap(), now());
        assert_eq!(
            parse_datetime("2 hours ago", &user(), now()).unwrap(),
            now() - TimeDelta::hours(2)
        );
        assert_eq!(
            parse_datetime("1 week ago", &user(), now()).unwrap(),
            now() - TimeDelta::days(7)
        );
    }

    #[test]
    fn test_parse_rejects_garbage_and_overflow() {
        assert!(parse_datetime("yesterday", &user(), now()).is_err());
        assert!(parse_datetime("999999999999 weeks ago", &user(), now()).is_err());
    }

    #[test]
    fn test_resolve_range_applies_retention() {
        let config = Config {
            data_retention_months: 1,
            ..Config::default()
        };
        let range = RangeArgs {
            from: "2023-01-01".to_string(),
            to: "now".to_string(),
        };
        let (from, to) = resolve_range(&range, &user(), &config, now()).unwrap();
        assert_eq!(from, Utc.with_ymd_and_hms(2024, 2, 10, 12, 0, 0).unwrap());
        assert_eq!(to, now());
    }

    #[test]
    fn test_resolve_range_rejects_inverted() {
        let range = RangeArgs {
            from: "2024-03-02".to_string(),
            to: "2024-03-01".to_string(),
        };
        assert!(resolve_range(&range, &user(), &Config::default(), now()).is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(TimeDelta::seconds(45)), "45s");
        assert_eq!(format_duration(TimeDelta::seconds(240)), "4m 0s");
        assert_eq!(format_duration(TimeDelta::minutes(95)), "1h 35m");
        assert_eq!(format_duration(TimeDelta::seconds(-5)), "0s");
    }
}
