//! Document signature domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Status of one signing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureStatus {
    Processing,
    Completed,
    Failed,
}

impl FromStr for SignatureStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "processing" => Ok(SignatureStatus::Processing),
            "completed" => Ok(SignatureStatus::Completed),
            "failed" => Ok(SignatureStatus::Failed),
            _ => Err(format!("Unknown signature status: {}", s)),
        }
    }
}

impl std::fmt::Display for SignatureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureStatus::Processing => write!(f, "processing"),
            SignatureStatus::Completed => write!(f, "completed"),
            SignatureStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One signing attempt for a document. One row per attempt.
///
/// A document is `signed` only if a completed signature row exists and the
/// stored artifact embeds the signature trailer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    /// Unique identifier.
    pub id: Uuid,

    pub document_id: Uuid,

    pub certificate_id: Uuid,

    /// Signing backend tag (e.g. `local_rsa`).
    pub provider: String,

    pub status: SignatureStatus,

    /// When the signature completed.
    pub signed_at: Option<DateTime<Utc>>,

    /// Error message for failed attempts.
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Input for recording the start of a signing attempt.
#[derive(Debug, Clone)]
pub struct CreateSignatureInput {
    pub document_id: Uuid,
    pub certificate_id: Uuid,
    pub provider: String,
}
