//! Record store collaborator boundary.
//!
//! The persistent store for templates, certificates, batches, documents,
//! signatures, and the activity log is an external collaborator; the pipeline
//! consumes it only through this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    ActivityEntry, Batch, BatchStatus, Certificate, CreateActivityInput, CreateBatchInput,
    CreateCertificateInput, CreateDocumentInput, CreateSignatureInput, CreateTemplateInput,
    Document, DocumentStatus, Signature, SignatureStatus, Template,
};

/// Errors surfaced by record store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Conflicting update: {0}")]
    Conflict(String),

    #[error("Store failure: {0}")]
    Internal(String),
}

/// Get/create/update access to pipeline records, keyed by owner identity.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // Templates
    async fn create_template(&self, input: CreateTemplateInput) -> Result<Template, StoreError>;
    async fn get_template(&self, id: Uuid) -> Result<Option<Template>, StoreError>;

    // Certificates
    async fn create_certificate(
        &self,
        input: CreateCertificateInput,
    ) -> Result<Certificate, StoreError>;
    async fn get_certificate(&self, id: Uuid) -> Result<Option<Certificate>, StoreError>;
    async fn list_certificates(&self, owner_id: Uuid) -> Result<Vec<Certificate>, StoreError>;

    // Batches
    async fn create_batch(&self, input: CreateBatchInput) -> Result<Batch, StoreError>;
    async fn get_batch(&self, id: Uuid) -> Result<Option<Batch>, StoreError>;
    /// Increment the completed-item counter by one. Implementations must
    /// serialize concurrent increments; the counter never exceeds the total.
    async fn increment_batch_completed(&self, id: Uuid) -> Result<u32, StoreError>;
    async fn set_batch_status(&self, id: Uuid, status: BatchStatus) -> Result<(), StoreError>;

    // Documents
    async fn create_document(&self, input: CreateDocumentInput) -> Result<Document, StoreError>;
    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, StoreError>;
    async fn list_documents_for_batch(&self, batch_id: Uuid) -> Result<Vec<Document>, StoreError>;
    async fn set_document_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        error: Option<String>,
    ) -> Result<(), StoreError>;
    async fn set_document_artifact(&self, id: Uuid, artifact_path: String)
        -> Result<(), StoreError>;

    // Signatures
    async fn create_signature(&self, input: CreateSignatureInput) -> Result<Signature, StoreError>;
    async fn update_signature(
        &self,
        id: Uuid,
        status: SignatureStatus,
        signed_at: Option<DateTime<Utc>>,
        error: Option<String>,
    ) -> Result<(), StoreError>;

    // Activity log (append-only)
    async fn append_activity(&self, input: CreateActivityInput)
        -> Result<ActivityEntry, StoreError>;
}
