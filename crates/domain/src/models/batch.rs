//! Generation batch domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Aggregate status of a generation batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Items are still being processed.
    Processing,
    /// Every item reached a successful terminal status.
    Completed,
    /// Some items succeeded, some failed.
    Partial,
    /// No item succeeded.
    Failed,
}

impl BatchStatus {
    /// Aggregate from item counts once all items resolved.
    pub fn from_counts(succeeded: u32, failed: u32) -> Self {
        match (succeeded, failed) {
            (_, 0) => BatchStatus::Completed,
            (0, _) => BatchStatus::Failed,
            _ => BatchStatus::Partial,
        }
    }
}

impl FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "processing" => Ok(BatchStatus::Processing),
            "completed" => Ok(BatchStatus::Completed),
            "partial" => Ok(BatchStatus::Partial),
            "failed" => Ok(BatchStatus::Failed),
            _ => Err(format!("Unknown batch status: {}", s)),
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchStatus::Processing => write!(f, "processing"),
            BatchStatus::Completed => write!(f, "completed"),
            BatchStatus::Partial => write!(f, "partial"),
            BatchStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A set of generation requests sharing one template, reported on as a unit.
///
/// Created when more than one value-row is submitted; mutated only by the
/// orchestrator as items complete; never deleted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// Unique identifier.
    pub id: Uuid,

    /// Owner of the batch.
    pub owner_id: Uuid,

    /// Display label.
    pub label: String,

    /// Template the batch was generated from.
    pub template_id: Uuid,

    /// Declared number of items.
    pub total_count: u32,

    /// Number of items that completed successfully. Never exceeds
    /// `total_count`.
    pub completed_count: u32,

    pub status: BatchStatus,

    pub created_at: DateTime<Utc>,
}

/// Input for creating a batch record.
#[derive(Debug, Clone)]
pub struct CreateBatchInput {
    pub owner_id: Uuid,
    pub label: String,
    pub template_id: Uuid,
    pub total_count: u32,
}
