//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for heartbeats and core types.
///
/// These are reported per record and never abort a batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The heartbeat carries no owning user.
    #[error("heartbeat has no owning user")]
    MissingUser,

    /// The heartbeat claims a different owner than the authenticated user.
    #[error("heartbeat belongs to {actual}, expected {expected}")]
    UserMismatch { expected: String, actual: String },

    /// The heartbeat timestamp is the zero value.
    #[error("heartbeat timestamp must be non-zero")]
    ZeroTimestamp,

    /// The heartbeat timestamp is not representable.
    #[error("heartbeat timestamp out of range: {value}")]
    TimestampOutOfRange { value: String },

    /// The heartbeat is too old or too far in the future to be accepted.
    #[error("heartbeat at {time} is outside the accepted ingestion window")]
    Untimely { time: String },

    /// Unrecognized summary dimension name.
    #[error("unknown summary kind: {value}")]
    UnknownSummaryKind { value: String },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated user identifier.
    ///
    /// Every heartbeat, summary, alias and label belongs to exactly one user.
    UserId, "user ID"
);
