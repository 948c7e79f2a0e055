//! Document template domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored document template.
///
/// Created on upload and immutable afterwards except for renames. The
/// placeholder list is extracted from the source package once at upload time;
/// its order is significant only for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// Unique identifier.
    pub id: Uuid,

    /// Owner of the template.
    pub owner_id: Uuid,

    /// Display name.
    pub name: String,

    /// Path of the stored source package, relative to the upload base.
    pub source_path: String,

    /// Placeholder names found in the source, in document order, deduplicated.
    pub placeholders: Vec<String>,

    /// Filename the template was uploaded under.
    pub original_filename: String,

    /// Media type reported at upload.
    pub media_type: String,

    pub created_at: DateTime<Utc>,
}

/// Input for registering a freshly uploaded template.
#[derive(Debug, Clone)]
pub struct CreateTemplateInput {
    pub owner_id: Uuid,
    pub name: String,
    pub source_path: String,
    pub placeholders: Vec<String>,
    pub original_filename: String,
    pub media_type: String,
}
