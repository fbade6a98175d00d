//! Heartbeats: raw activity events as received from editor plugins.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{UserId, ValidationError};

/// Version of the field selection that enters [`Heartbeat::content_hash`].
///
/// Changing the selection changes every hash and therefore breaks
/// deduplication against existing data. Bump this alongside any change.
pub const HASH_PROJECTION_VERSION: u8 = 1;

/// How far into the future a heartbeat may be stamped and still be timely.
pub const MAX_FUTURE_SKEW: TimeDelta = TimeDelta::hours(1);

/// Heartbeat types that describe browsing rather than editing.
const BROWSER_TYPES: &[&str] = &["url", "domain"];

/// Sentinel sent by browser plugins meaning "reuse the most recent project".
pub const LAST_PROJECT_PLACEHOLDER: &str = "<<LAST_PROJECT>>";
/// Sentinel meaning "reuse the most recent branch".
pub const LAST_BRANCH_PLACEHOLDER: &str = "<<LAST_BRANCH>>";
/// Sentinel meaning "reuse the most recent language".
pub const LAST_LANGUAGE_PLACEHOLDER: &str = "<<LAST_LANGUAGE>>";

/// A single accepted activity event.
///
/// Heartbeats are immutable once accepted; only bulk retention removes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Storage row ID, unset before insertion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub user_id: UserId,
    /// File path, URL or domain.
    pub entity: String,
    /// Entity type (`file`, `url`, `domain`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    pub project: String,
    pub branch: String,
    pub language: String,
    pub is_write: bool,
    pub editor: String,
    pub operating_system: String,
    pub machine: String,
    pub user_agent: String,
    /// When the event occurred, millisecond precision.
    pub time: DateTime<Utc>,
    /// Content hash, see [`Heartbeat::content_hash`].
    pub hash: String,
    /// Import provenance.
    pub origin: String,
    pub origin_id: String,
}

/// A heartbeat as submitted by a client, before validation.
///
/// Mirrors the WakaTime wire format: `time` is fractional Unix seconds and
/// text fields may be `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHeartbeat {
    /// Claimed owner. Absent means "the authenticated user".
    #[serde(default, alias = "user_id")]
    pub user: Option<String>,
    #[serde(default, alias = "Entity")]
    pub entity: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub is_write: Option<bool>,
    #[serde(default)]
    pub editor: Option<String>,
    #[serde(default)]
    pub operating_system: Option<String>,
    #[serde(default)]
    pub machine: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub time: f64,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub origin_id: Option<String>,
}

impl RawHeartbeat {
    /// Binds the raw event to `owner` and converts its timestamp.
    ///
    /// Fails when the claimed owner differs from `owner` or the timestamp is zero.
    pub fn into_heartbeat(self, owner: &UserId) -> Result<Heartbeat, ValidationError> {
        match self.user.as_deref().map(str::trim) {
            Some("") => return Err(ValidationError::MissingUser),
            Some(claimed) if claimed != owner.as_str() => {
                return Err(ValidationError::UserMismatch {
                    expected: owner.to_string(),
                    actual: claimed.to_string(),
                });
            }
            _ => {}
        }

        let time = unix_seconds_to_datetime(self.time)?;

        Ok(Heartbeat {
            id: None,
            user_id: owner.clone(),
            entity: self.entity.unwrap_or_default(),
            kind: self.kind.unwrap_or_default(),
            category: self.category.unwrap_or_default(),
            project: self.project.unwrap_or_default(),
            branch: self.branch.unwrap_or_default(),
            language: self.language.unwrap_or_default(),
            is_write: self.is_write.unwrap_or_default(),
            editor: self.editor.unwrap_or_default(),
            operating_system: self.operating_system.unwrap_or_default(),
            machine: self.machine.unwrap_or_default(),
            user_agent: self.user_agent.unwrap_or_default(),
            time,
            hash: String::new(),
            origin: self.origin.unwrap_or_default(),
            origin_id: self.origin_id.unwrap_or_default(),
        })
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "value is range-checked before the cast"
)]
fn unix_seconds_to_datetime(seconds: f64) -> Result<DateTime<Utc>, ValidationError> {
    if seconds == 0.0 {
        return Err(ValidationError::ZeroTimestamp);
    }
    let millis = (seconds * 1000.0).round();
    if !millis.is_finite() || millis.abs() > 8.0e15 {
        return Err(ValidationError::TimestampOutOfRange {
            value: seconds.to_string(),
        });
    }
    DateTime::from_timestamp_millis(millis as i64).ok_or_else(|| {
        ValidationError::TimestampOutOfRange {
            value: seconds.to_string(),
        }
    })
}

impl Heartbeat {
    /// Checks ownership and timestamp.
    pub fn validate(&self, owner: &UserId) -> Result<(), ValidationError> {
        if &self.user_id != owner {
            return Err(ValidationError::UserMismatch {
                expected: owner.to_string(),
                actual: self.user_id.to_string(),
            });
        }
        if self.time == DateTime::<Utc>::UNIX_EPOCH {
            return Err(ValidationError::ZeroTimestamp);
        }
        Ok(())
    }

    /// Returns true if the heartbeat is at most `max_age` old and less than
    /// [`MAX_FUTURE_SKEW`] ahead of `now`.
    pub fn is_timely(&self, max_age: TimeDelta, now: DateTime<Utc>) -> bool {
        now - self.time <= max_age && self.time - now < MAX_FUTURE_SKEW
    }

    /// Returns true for browser activity (`url` and `domain` entities).
    pub fn is_browser_activity(&self) -> bool {
        BROWSER_TYPES.contains(&self.kind.as_str())
    }

    /// Normalizes casing and drops inherited browser projects.
    ///
    /// Browser plugins tag most events with [`LAST_PROJECT_PLACEHOLDER`];
    /// inheriting it would book browsing time onto the last coding project,
    /// so the project is cleared instead.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        if self.is_browser_activity() && self.project == LAST_PROJECT_PLACEHOLDER {
            self.project.clear();
        }
        self.operating_system = capitalize(&self.operating_system);
        self.editor = capitalize(&self.editor);
        self
    }

    /// Computes the uniqueness hash over the versioned field projection.
    ///
    /// Editor, operating system, machine, user agent, origin and record ID
    /// are excluded: clients report them inconsistently, and two events that
    /// only differ there are the same event.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update([HASH_PROJECTION_VERSION]);
        for field in [
            self.user_id.as_str(),
            &self.entity,
            &self.kind,
            &self.category,
            &self.project,
            &self.branch,
            &self.language,
        ] {
            // Length prefix keeps ("ab", "c") and ("a", "bc") apart.
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.update([u8::from(self.is_write)]);
        hasher.update(self.time.timestamp_millis().to_le_bytes());
        let digest = hasher.finalize();
        hex::encode(&digest[..8])
    }

    /// Returns the heartbeat with its `hash` field populated.
    #[must_use]
    pub fn hashed(mut self) -> Self {
        self.hash = self.content_hash();
        self
    }
}

/// Upper-cases the first character and lower-cases the rest.
fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user() -> UserId {
        UserId::new("alice").unwrap()
    }

    fn heartbeat() -> Heartbeat {
        RawHeartbeat {
            entity: Some("/home/alice/wakapi/main.go".to_string()),
            kind: Some("file".to_string()),
            category: Some("coding".to_string()),
            project: Some("wakapi".to_string()),
            branch: Some("master".to_string()),
            language: Some("Go".to_string()),
            editor: Some("goland".to_string()),
            operating_system: Some("linux".to_string()),
            machine: Some("desktop".to_string()),
            time: 1_700_000_000.123,
            ..RawHeartbeat::default()
        }
        .into_heartbeat(&user())
        .unwrap()
    }

    #[test]
    fn raw_heartbeat_keeps_millisecond_precision() {
        let hb = heartbeat();
        assert_eq!(hb.time.timestamp_millis(), 1_700_000_000_123);
        assert_eq!(hb.user_id, user());
    }

    #[test]
    fn raw_heartbeat_rejects_zero_time() {
        let err = RawHeartbeat::default().into_heartbeat(&user()).unwrap_err();
        assert_eq!(err, ValidationError::ZeroTimestamp);
    }

    #[test]
    fn raw_heartbeat_rejects_foreign_owner() {
        let raw = RawHeartbeat {
            user: Some("bob".to_string()),
            time: 1_700_000_000.0,
            ..RawHeartbeat::default()
        };
        let err = raw.into_heartbeat(&user()).unwrap_err();
        assert!(matches!(err, ValidationError::UserMismatch { .. }));
    }

    #[test]
    fn raw_heartbeat_rejects_blank_owner() {
        let raw = RawHeartbeat {
            user: Some(" ".to_string()),
            time: 1_700_000_000.0,
            ..RawHeartbeat::default()
        };
        assert_eq!(
            raw.into_heartbeat(&user()).unwrap_err(),
            ValidationError::MissingUser
        );
    }

    #[test]
    fn raw_heartbeat_accepts_wakatime_json_with_nulls() {
        let json = r#"{"entity":"main.rs","type":"file","project":null,"time":1700000000.5,"is_write":true}"#;
        let raw: RawHeartbeat = serde_json::from_str(json).unwrap();
        let hb = raw.into_heartbeat(&user()).unwrap();
        assert_eq!(hb.project, "");
        assert!(hb.is_write);
    }

    #[test]
    fn validate_rejects_other_user_and_epoch() {
        let hb = heartbeat();
        assert!(hb.validate(&user()).is_ok());
        assert!(hb.validate(&UserId::new("bob").unwrap()).is_err());

        let mut epoch = hb;
        epoch.time = DateTime::<Utc>::UNIX_EPOCH;
        assert_eq!(
            epoch.validate(&user()).unwrap_err(),
            ValidationError::ZeroTimestamp
        );
    }

    #[test]
    fn hash_ignores_volatile_fields() {
        let a = heartbeat();
        let mut b = a.clone();
        b.id = Some(42);
        b.editor = "vscode".to_string();
        b.operating_system = "windows".to_string();
        b.machine = "laptop".to_string();
        b.user_agent = "wakatime/v1.90.0".to_string();
        b.origin = "wakatime".to_string();
        b.origin_id = "abc-123".to_string();

        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn hash_covers_identifying_fields() {
        let a = heartbeat();
        let mut other_project = a.clone();
        other_project.project = "other".to_string();
        let mut other_time = a.clone();
        other_time.time += TimeDelta::milliseconds(1);
        let mut other_write = a.clone();
        other_write.is_write = true;

        assert_ne!(a.content_hash(), other_project.content_hash());
        assert_ne!(a.content_hash(), other_time.content_hash());
        assert_ne!(a.content_hash(), other_write.content_hash());
    }

    #[test]
    fn hash_is_sixteen_hex_chars() {
        let hb = heartbeat().hashed();
        assert_eq!(hb.hash.len(), 16);
        assert!(hb.hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn sanitize_capitalizes_editor_and_os() {
        let hb = heartbeat().sanitized();
        assert_eq!(hb.editor, "Goland");
        assert_eq!(hb.operating_system, "Linux");

        let mut shouting = heartbeat();
        shouting.operating_system = "WINDOWS".to_string();
        assert_eq!(shouting.sanitized().operating_system, "Windows");
    }

    #[test]
    fn sanitize_clears_browser_last_project() {
        let mut hb = heartbeat();
        hb.kind = "url".to_string();
        hb.project = LAST_PROJECT_PLACEHOLDER.to_string();
        assert_eq!(hb.sanitized().project, "");

        let mut file = heartbeat();
        file.project = LAST_PROJECT_PLACEHOLDER.to_string();
        assert_eq!(file.sanitized().project, LAST_PROJECT_PLACEHOLDER);
    }

    #[test]
    fn timeliness_window() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let max_age = TimeDelta::days(7);
        let mut hb = heartbeat();

        hb.time = now - TimeDelta::days(7);
        assert!(hb.is_timely(max_age, now));
        hb.time = now - TimeDelta::days(8);
        assert!(!hb.is_timely(max_age, now));
        hb.time = now + TimeDelta::minutes(59);
        assert!(hb.is_timely(max_age, now));
        hb.time = now + TimeDelta::hours(1);
        assert!(!hb.is_timely(max_age, now));
    }
}
