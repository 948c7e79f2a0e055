//! Activity log domain model.
//!
//! Append-only audit records; write-only from the pipeline's perspective.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome recorded on an activity entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Success,
    Failure,
}

impl std::fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityStatus::Success => write!(f, "success"),
            ActivityStatus::Failure => write!(f, "failure"),
        }
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Unique identifier.
    pub id: Uuid,

    /// User the activity belongs to.
    pub user_id: Uuid,

    /// Activity type (e.g. `generation`, `signing`, `security`).
    pub entry_type: String,

    /// Action performed (format: resource.operation).
    pub action: String,

    pub status: ActivityStatus,

    /// Human-readable message.
    pub message: String,

    /// Related records, when known.
    pub document_id: Option<Uuid>,
    pub batch_id: Option<Uuid>,
    pub certificate_id: Option<Uuid>,
    pub template_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
}

/// Input for appending an activity entry.
#[derive(Debug, Clone)]
pub struct CreateActivityInput {
    pub user_id: Uuid,
    pub entry_type: String,
    pub action: String,
    pub status: ActivityStatus,
    pub message: String,
    pub document_id: Option<Uuid>,
    pub batch_id: Option<Uuid>,
    pub certificate_id: Option<Uuid>,
    pub template_id: Option<Uuid>,
}
