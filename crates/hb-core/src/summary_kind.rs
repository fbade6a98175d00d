//! Summary dimension enum as the single source of truth for dimension names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::ValidationError;

/// Sentinel key for empty dimension values.
pub const UNKNOWN_KEY: &str = "unknown";

/// The dimensions a summary aggregates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SummaryKind {
    Project,
    Language,
    Editor,
    OperatingSystem,
    Machine,
    Label,
    Branch,
    Entity,
    Category,
}

impl SummaryKind {
    /// Every dimension, in display order.
    pub const ALL: [Self; 9] = [
        Self::Project,
        Self::Language,
        Self::Editor,
        Self::OperatingSystem,
        Self::Machine,
        Self::Label,
        Self::Branch,
        Self::Entity,
        Self::Category,
    ];

    /// Dimensions derived directly from durations. Labels are only ever
    /// attached afterwards, from project keys.
    pub const COMPOSED: [Self; 8] = [
        Self::Project,
        Self::Language,
        Self::Editor,
        Self::OperatingSystem,
        Self::Machine,
        Self::Branch,
        Self::Entity,
        Self::Category,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Language => "language",
            Self::Editor => "editor",
            Self::OperatingSystem => "operating_system",
            Self::Machine => "machine",
            Self::Label => "label",
            Self::Branch => "branch",
            Self::Entity => "entity",
            Self::Category => "category",
        }
    }
}

impl fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(Self::Project),
            "language" => Ok(Self::Language),
            "editor" => Ok(Self::Editor),
            "operating_system" | "os" => Ok(Self::OperatingSystem),
            "machine" => Ok(Self::Machine),
            "label" => Ok(Self::Label),
            "branch" => Ok(Self::Branch),
            "entity" => Ok(Self::Entity),
            "category" => Ok(Self::Category),
            _ => Err(ValidationError::UnknownSummaryKind {
                value: s.to_string(),
            }),
        }
    }
}

impl Serialize for SummaryKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SummaryKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Maps an empty dimension value to [`UNKNOWN_KEY`].
pub fn key_or_unknown(value: &str) -> &str {
    if value.is_empty() { UNKNOWN_KEY } else { value }
}
