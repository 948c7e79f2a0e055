//! Pipeline-level error umbrella.
//!
//! Stage errors stay typed per concern; this enum is what the orchestrator
//! catches at the per-item boundary.

use thiserror::Error;

use crate::engine::ConversionError;
use crate::renderer::TemplateError;
use crate::signing::SigningError;
use crate::vault::ParseError;
use domain::store::StoreError;
use shared::path_guard::SecurityError;
use shared::secret::EncryptError;

/// Any failure a pipeline stage can surface.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Secret encryption failed: {0}")]
    Secret(#[from] EncryptError),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Batch has no successful documents to bundle")]
    EmptyBundle,
}
