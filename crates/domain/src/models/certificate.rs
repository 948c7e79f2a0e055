//! Signing certificate domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Type tag for a signing certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateKind {
    /// Key material held in a hardware token; container is a reference only.
    Hardware,
    /// Software key-pair container uploaded by the user.
    Software,
}

impl FromStr for CertificateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hardware" => Ok(CertificateKind::Hardware),
            "software" => Ok(CertificateKind::Software),
            _ => Err(format!("Unknown certificate kind: {}", s)),
        }
    }
}

impl std::fmt::Display for CertificateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CertificateKind::Hardware => write!(f, "hardware"),
            CertificateKind::Software => write!(f, "software"),
        }
    }
}

/// A stored signing certificate.
///
/// The validity window is parsed from the key-pair container once at upload
/// time. A record with no parsed window is informational only and never
/// selected for signing. The unlock secret is stored only in encrypted form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    /// Unique identifier.
    pub id: Uuid,

    /// Owner of the certificate.
    pub owner_id: Uuid,

    /// Display name.
    pub name: String,

    /// Path of the stored key-pair container, relative to the upload base.
    pub container_path: String,

    /// Unlock secret, encrypted with the process-wide `SecretCodec`.
    pub encrypted_secret: String,

    /// Legacy one-way hash of the unlock secret; unused by signing.
    pub secret_hash: Option<String>,

    pub kind: CertificateKind,

    /// Subject serial extracted from the container, if parseable.
    pub subject_serial: Option<String>,

    /// Start of the validity window.
    pub valid_from: Option<DateTime<Utc>>,

    /// End of the validity window.
    pub valid_to: Option<DateTime<Utc>>,

    /// Filename the container was uploaded under.
    pub original_filename: String,

    pub created_at: DateTime<Utc>,
}

impl Certificate {
    /// Whether the certificate has a parsed validity window containing `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match (self.valid_from, self.valid_to) {
            (Some(from), Some(to)) => from <= now && now <= to,
            _ => false,
        }
    }
}

/// Input for registering a freshly uploaded certificate.
///
/// Validity fields stay empty when container parsing failed at upload time;
/// the record is still created.
#[derive(Debug, Clone)]
pub struct CreateCertificateInput {
    pub owner_id: Uuid,
    pub name: String,
    pub container_path: String,
    pub encrypted_secret: String,
    pub kind: CertificateKind,
    pub subject_serial: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub original_filename: String,
}
