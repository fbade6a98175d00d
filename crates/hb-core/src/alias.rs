//! User-defined aliases and project labels.

use serde::{Deserialize, Serialize};

use crate::summary_kind::SummaryKind;
use crate::types::UserId;

/// Remaps the raw key `value` of one dimension to the canonical `key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Alias {
    pub user_id: UserId,
    pub kind: SummaryKind,
    /// Canonical key.
    pub key: String,
    /// Raw key reported by clients.
    pub value: String,
}

/// Attaches `label` to one project. A label may cover many projects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectLabel {
    pub user_id: UserId,
    pub project_key: String,
    pub label: String,
}
