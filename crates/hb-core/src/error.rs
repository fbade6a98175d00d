//! Error types for hb-core.

use thiserror::Error;

use crate::types::ValidationError;

/// Boxed error raised by a storage collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for the aggregation core.
#[derive(Debug, Error)]
pub enum Error {
    /// A heartbeat, summary, alias or label store failed. Propagated as-is,
    /// the core never retries.
    #[error("upstream fetch failed: {0}")]
    Upstream(#[source] BoxError),

    /// An invalid value reached an operation that requires a valid one.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl Error {
    /// Wraps a collaborator failure.
    pub fn upstream(err: impl Into<BoxError>) -> Self {
        Self::Upstream(err.into())
    }
}

/// Result type alias for hb-core.
pub type Result<T> = std::result::Result<T, Error>;
