//! Durations: continuous activity intervals derived from heartbeats.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::heartbeat::Heartbeat;
use crate::summary_kind::SummaryKind;
use crate::types::UserId;

/// Length assigned to durations that would otherwise be zero.
///
/// Two distinct heartbeats stamped with the same instant (coarse storage
/// precision) are assumed to be sub-second apart.
pub const ZERO_LENGTH_DURATION: TimeDelta = TimeDelta::milliseconds(500);

/// A continuous period of activity on one group signature.
///
/// Never persisted; durations only live for the span of an aggregation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duration {
    pub user_id: UserId,
    pub start: DateTime<Utc>,
    #[serde(with = "millis", rename = "length_ms")]
    pub length: TimeDelta,
    pub num_heartbeats: u32,
    pub project: String,
    pub language: String,
    pub editor: String,
    pub operating_system: String,
    pub machine: String,
    pub branch: String,
    pub entity: String,
    pub category: String,
    /// Signature over every dimension except `entity`.
    pub group_hash: String,
}

impl Duration {
    /// Opens a zero-length duration at the heartbeat's timestamp.
    pub fn from_heartbeat(heartbeat: &Heartbeat) -> Self {
        let mut duration = Self {
            user_id: heartbeat.user_id.clone(),
            start: heartbeat.time,
            length: TimeDelta::zero(),
            num_heartbeats: 1,
            project: heartbeat.project.clone(),
            language: heartbeat.language.clone(),
            editor: heartbeat.editor.clone(),
            operating_system: heartbeat.operating_system.clone(),
            machine: heartbeat.machine.clone(),
            branch: heartbeat.branch.clone(),
            entity: heartbeat.entity.clone(),
            category: heartbeat.category.clone(),
            group_hash: String::new(),
        };
        duration.group_hash = duration.group_signature();
        duration
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.start + self.length
    }

    /// Returns the raw value of this duration for `kind`.
    ///
    /// Labels are not a duration attribute and always yield `""`.
    pub fn key(&self, kind: SummaryKind) -> &str {
        match kind {
            SummaryKind::Project => &self.project,
            SummaryKind::Language => &self.language,
            SummaryKind::Editor => &self.editor,
            SummaryKind::OperatingSystem => &self.operating_system,
            SummaryKind::Machine => &self.machine,
            SummaryKind::Branch => &self.branch,
            SummaryKind::Entity => &self.entity,
            SummaryKind::Category => &self.category,
            SummaryKind::Label => "",
        }
    }

    /// Hash identifying "the same ongoing activity".
    ///
    /// Covers user and every dimension except the entity, so switching files
    /// within one project, language and branch continues the duration.
    pub fn group_signature(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [
            self.user_id.as_str(),
            &self.project,
            &self.language,
            &self.editor,
            &self.operating_system,
            &self.machine,
            &self.branch,
            &self.category,
        ] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hex::encode(&hasher.finalize()[..8])
    }
}

/// Serializes a `TimeDelta` as whole milliseconds.
pub(crate) mod millis {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(length: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(length.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        i64::deserialize(deserializer).map(TimeDelta::milliseconds)
    }
}
