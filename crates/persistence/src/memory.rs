//! In-memory record store.
//!
//! All maps sit behind a single `RwLock` per record type. Batch counter
//! increments take the write lock, so concurrent workers are serialized
//! through one writer and no update is lost.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use domain::models::{
    ActivityEntry, Batch, BatchStatus, Certificate, CreateActivityInput, CreateBatchInput,
    CreateCertificateInput, CreateDocumentInput, CreateSignatureInput, CreateTemplateInput,
    Document, DocumentStatus, Signature, SignatureStatus, Template,
};
use domain::store::{RecordStore, StoreError};

/// In-process implementation of the record store boundary.
#[derive(Default)]
pub struct MemoryStore {
    templates: RwLock<HashMap<Uuid, Template>>,
    certificates: RwLock<HashMap<Uuid, Certificate>>,
    batches: RwLock<HashMap<Uuid, Batch>>,
    documents: RwLock<HashMap<Uuid, Document>>,
    signatures: RwLock<HashMap<Uuid, Signature>>,
    activity: RwLock<Vec<ActivityEntry>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All activity entries recorded so far, oldest first.
    pub async fn activity_entries(&self) -> Vec<ActivityEntry> {
        self.activity.read().await.clone()
    }

    /// All signature rows for a document, oldest first.
    pub async fn signatures_for_document(&self, document_id: Uuid) -> Vec<Signature> {
        let mut rows: Vec<Signature> = self
            .signatures
            .read()
            .await
            .values()
            .filter(|s| s.document_id == document_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.created_at);
        rows
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_template(&self, input: CreateTemplateInput) -> Result<Template, StoreError> {
        let template = Template {
            id: Uuid::new_v4(),
            owner_id: input.owner_id,
            name: input.name,
            source_path: input.source_path,
            placeholders: input.placeholders,
            original_filename: input.original_filename,
            media_type: input.media_type,
            created_at: Utc::now(),
        };
        self.templates
            .write()
            .await
            .insert(template.id, template.clone());
        Ok(template)
    }

    async fn get_template(&self, id: Uuid) -> Result<Option<Template>, StoreError> {
        Ok(self.templates.read().await.get(&id).cloned())
    }

    async fn create_certificate(
        &self,
        input: CreateCertificateInput,
    ) -> Result<Certificate, StoreError> {
        let certificate = Certificate {
            id: Uuid::new_v4(),
            owner_id: input.owner_id,
            name: input.name,
            container_path: input.container_path,
            encrypted_secret: input.encrypted_secret,
            secret_hash: None,
            kind: input.kind,
            subject_serial: input.subject_serial,
            valid_from: input.valid_from,
            valid_to: input.valid_to,
            original_filename: input.original_filename,
            created_at: Utc::now(),
        };
        self.certificates
            .write()
            .await
            .insert(certificate.id, certificate.clone());
        Ok(certificate)
    }

    async fn get_certificate(&self, id: Uuid) -> Result<Option<Certificate>, StoreError> {
        Ok(self.certificates.read().await.get(&id).cloned())
    }

    async fn list_certificates(&self, owner_id: Uuid) -> Result<Vec<Certificate>, StoreError> {
        let mut certs: Vec<Certificate> = self
            .certificates
            .read()
            .await
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        certs.sort_by_key(|c| c.created_at);
        Ok(certs)
    }

    async fn create_batch(&self, input: CreateBatchInput) -> Result<Batch, StoreError> {
        let batch = Batch {
            id: Uuid::new_v4(),
            owner_id: input.owner_id,
            label: input.label,
            template_id: input.template_id,
            total_count: input.total_count,
            completed_count: 0,
            status: BatchStatus::Processing,
            created_at: Utc::now(),
        };
        self.batches.write().await.insert(batch.id, batch.clone());
        Ok(batch)
    }

    async fn get_batch(&self, id: Uuid) -> Result<Option<Batch>, StoreError> {
        Ok(self.batches.read().await.get(&id).cloned())
    }

    async fn increment_batch_completed(&self, id: Uuid) -> Result<u32, StoreError> {
        let mut batches = self.batches.write().await;
        let batch = batches
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("batch {id}")))?;
        if batch.completed_count >= batch.total_count {
            return Err(StoreError::Conflict(format!(
                "batch {id} already has {} of {} items completed",
                batch.completed_count, batch.total_count
            )));
        }
        batch.completed_count += 1;
        Ok(batch.completed_count)
    }

    async fn set_batch_status(&self, id: Uuid, status: BatchStatus) -> Result<(), StoreError> {
        let mut batches = self.batches.write().await;
        let batch = batches
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("batch {id}")))?;
        batch.status = status;
        Ok(())
    }

    async fn create_document(&self, input: CreateDocumentInput) -> Result<Document, StoreError> {
        let document = Document {
            id: Uuid::new_v4(),
            owner_id: input.owner_id,
            template_id: input.template_id,
            batch_id: input.batch_id,
            filename: input.filename,
            status: DocumentStatus::Processing,
            artifact_path: None,
            variables: input.variables,
            error: None,
            source: input.source,
            created_at: Utc::now(),
        };
        self.documents
            .write()
            .await
            .insert(document.id, document.clone());
        Ok(document)
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
        Ok(self.documents.read().await.get(&id).cloned())
    }

    async fn list_documents_for_batch(&self, batch_id: Uuid) -> Result<Vec<Document>, StoreError> {
        let mut docs: Vec<Document> = self
            .documents
            .read()
            .await
            .values()
            .filter(|d| d.batch_id == Some(batch_id))
            .cloned()
            .collect();
        docs.sort_by_key(|d| d.created_at);
        Ok(docs)
    }

    async fn set_document_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("document {id}")))?;
        document.status = status;
        document.error = error;
        Ok(())
    }

    async fn set_document_artifact(
        &self,
        id: Uuid,
        artifact_path: String,
    ) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("document {id}")))?;
        document.artifact_path = Some(artifact_path);
        Ok(())
    }

    async fn create_signature(&self, input: CreateSignatureInput) -> Result<Signature, StoreError> {
        let signature = Signature {
            id: Uuid::new_v4(),
            document_id: input.document_id,
            certificate_id: input.certificate_id,
            provider: input.provider,
            status: SignatureStatus::Processing,
            signed_at: None,
            error: None,
            created_at: Utc::now(),
        };
        self.signatures
            .write()
            .await
            .insert(signature.id, signature.clone());
        Ok(signature)
    }

    async fn update_signature(
        &self,
        id: Uuid,
        status: SignatureStatus,
        signed_at: Option<DateTime<Utc>>,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        let mut signatures = self.signatures.write().await;
        let signature = signatures
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("signature {id}")))?;
        signature.status = status;
        signature.signed_at = signed_at;
        signature.error = error;
        Ok(())
    }

    async fn append_activity(
        &self,
        input: CreateActivityInput,
    ) -> Result<ActivityEntry, StoreError> {
        let entry = ActivityEntry {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            entry_type: input.entry_type,
            action: input.action,
            status: input.status,
            message: input.message,
            document_id: input.document_id,
            batch_id: input.batch_id,
            certificate_id: input.certificate_id,
            template_id: input.template_id,
            created_at: Utc::now(),
        };
        self.activity.write().await.push(entry.clone());
        Ok(entry)
    }
}
