//! Generated document domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use uuid::Uuid;

/// Status of a single document.
///
/// `Processing` exists only while a generation attempt is in flight; it is
/// always resolved to one of the other statuses before the request returns.
/// `Ready` and `Signed` are both successful terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Processing,
    Ready,
    Signed,
    Failed,
}

impl DocumentStatus {
    /// Whether the document reached a successful terminal status.
    pub fn is_success(&self) -> bool {
        matches!(self, DocumentStatus::Ready | DocumentStatus::Signed)
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "processing" => Ok(DocumentStatus::Processing),
            "ready" => Ok(DocumentStatus::Ready),
            "signed" => Ok(DocumentStatus::Signed),
            "failed" => Ok(DocumentStatus::Failed),
            _ => Err(format!("Unknown document status: {}", s)),
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStatus::Processing => write!(f, "processing"),
            DocumentStatus::Ready => write!(f, "ready"),
            DocumentStatus::Signed => write!(f, "signed"),
            DocumentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// How a document entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSource {
    /// Generated from a template.
    Template,
    /// Uploaded directly as a finished artifact.
    Upload,
}

impl std::fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentSource::Template => write!(f, "template"),
            DocumentSource::Upload => write!(f, "upload"),
        }
    }
}

/// A generated (or directly uploaded) document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier.
    pub id: Uuid,

    /// Owner of the document.
    pub owner_id: Uuid,

    /// Template the document was generated from; absent for direct uploads.
    pub template_id: Option<Uuid>,

    /// Batch the document belongs to, if generated as part of one.
    pub batch_id: Option<Uuid>,

    /// Output filename.
    pub filename: String,

    pub status: DocumentStatus,

    /// Path of the stored artifact, relative to the work base. Absent until
    /// generation succeeds.
    pub artifact_path: Option<String>,

    /// Variable map the document was rendered with, serialized as JSON.
    pub variables: Option<JsonValue>,

    /// Error message for failed documents.
    pub error: Option<String>,

    pub source: DocumentSource,

    pub created_at: DateTime<Utc>,
}

/// Input for creating a document record at the start of generation.
#[derive(Debug, Clone)]
pub struct CreateDocumentInput {
    pub owner_id: Uuid,
    pub template_id: Option<Uuid>,
    pub batch_id: Option<Uuid>,
    pub filename: String,
    pub variables: Option<JsonValue>,
    pub source: DocumentSource,
}
