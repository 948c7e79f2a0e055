//! Registration helpers for uploaded templates and certificates.
//!
//! The upload-intake layer stores the file and validates type/extension;
//! these helpers create the corresponding records. Certificate container
//! parsing is deliberately non-fatal here: a container that cannot be read
//! still gets a record, just with empty validity fields, and only fails
//! later if chosen for signing.

use std::path::Path;
use tracing::warn;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::renderer::TemplateRenderer;
use crate::vault;
use domain::models::{
    Certificate, CertificateKind, CreateCertificateInput, CreateTemplateInput, Template,
};
use domain::store::RecordStore;
use shared::path_guard::PathGuard;
use shared::secret::SecretCodec;

/// Parameters for registering an uploaded template.
#[derive(Debug, Clone)]
pub struct TemplateUpload {
    pub owner_id: Uuid,
    pub name: String,
    /// Stored source path, relative to the upload base.
    pub source_path: String,
    pub original_filename: String,
    pub media_type: String,
}

/// Parameters for registering an uploaded certificate.
#[derive(Debug, Clone)]
pub struct CertificateUpload {
    pub owner_id: Uuid,
    pub name: String,
    /// Stored container path, relative to the upload base.
    pub container_path: String,
    /// Container unlock password as submitted; encrypted before storage.
    pub password: String,
    pub kind: CertificateKind,
    pub original_filename: String,
}

/// Register an uploaded template, extracting its placeholder list.
pub async fn register_template(
    store: &dyn RecordStore,
    guard: &PathGuard,
    upload_dir: &Path,
    upload: TemplateUpload,
) -> Result<Template, PipelineError> {
    let source = guard.resolve(upload_dir, &upload.source_path)?;
    let placeholders = TemplateRenderer::extract_placeholders(&source)?;

    let template = store
        .create_template(CreateTemplateInput {
            owner_id: upload.owner_id,
            name: upload.name,
            source_path: upload.source_path,
            placeholders,
            original_filename: upload.original_filename,
            media_type: upload.media_type,
        })
        .await?;
    Ok(template)
}

/// Register an uploaded certificate.
///
/// The unlock password is encrypted with the process-wide codec; the
/// container is parsed for its validity window, and a parse failure leaves
/// those fields empty instead of failing the upload.
pub async fn register_certificate(
    store: &dyn RecordStore,
    codec: &SecretCodec,
    guard: &PathGuard,
    upload_dir: &Path,
    upload: CertificateUpload,
) -> Result<Certificate, PipelineError> {
    let container_path = guard.resolve(upload_dir, &upload.container_path)?;
    let encrypted_secret = codec.encrypt(&upload.password)?;

    let (subject_serial, valid_from, valid_to) = match tokio::fs::read(&container_path).await {
        Ok(container) => match vault::read_info(&container, &upload.password) {
            Ok(info) => (Some(info.serial), Some(info.valid_from), Some(info.valid_to)),
            Err(e) => {
                warn!(
                    container = %container_path.display(),
                    error = %e,
                    "Certificate container not parseable, storing without validity window"
                );
                (None, None, None)
            }
        },
        Err(e) => {
            warn!(
                container = %container_path.display(),
                error = %e,
                "Certificate container unreadable, storing without validity window"
            );
            (None, None, None)
        }
    };

    let certificate = store
        .create_certificate(CreateCertificateInput {
            owner_id: upload.owner_id,
            name: upload.name,
            container_path: upload.container_path,
            encrypted_secret,
            kind: upload.kind,
            subject_serial,
            valid_from,
            valid_to,
            original_filename: upload.original_filename,
        })
        .await?;
    Ok(certificate)
}
