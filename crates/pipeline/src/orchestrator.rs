//! Batch orchestrator: render, convert, sign, and account for every item.
//!
//! One value-row is one item. Items run concurrently under a bounded worker
//! count; each item resolves to `ready`, `signed`, or `failed` on its own,
//! and one failed item never aborts its siblings. A batch record exists only
//! when more than one row was submitted.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::engine::ConversionEngine;
use crate::error::PipelineError;
use crate::renderer::{PlaceholderValue, TemplateRenderer};
use crate::signing::{self, SigningEngine};
use crate::vault;
use domain::models::{
    BatchStatus, Certificate, CreateBatchInput, CreateDocumentInput, CreateSignatureInput,
    DocumentSource, DocumentStatus, SignatureStatus, Template,
};
use domain::services::audit::ActivityBuilder;
use domain::store::RecordStore;
use shared::path_guard::PathGuard;
use shared::sanitize::sanitize_filename;
use shared::secret::SecretCodec;

/// Relative directory (under the work base) where artifacts are stored.
const ARTIFACT_DIR: &str = "artifacts";

/// How generated documents should be signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateChoice {
    /// Leave documents unsigned (`ready`).
    Unsigned,
    /// Sign with a specific certificate.
    Explicit(Uuid),
    /// Sign with the owner's valid certificate closest to expiry.
    Auto,
}

/// A generation request: one template, one or more value-rows.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub owner_id: Uuid,
    pub template_id: Uuid,
    /// One map of placeholder values per requested document.
    pub rows: Vec<HashMap<String, PlaceholderValue>>,
    /// Signing mode for every generated document.
    pub certificate: CertificateChoice,
    /// Display label for the batch record.
    pub label: String,
}

/// Outcome of one item.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    /// Zero-based index of the value-row this item was generated from.
    pub row: usize,
    /// Absent only when the document record itself could not be created.
    pub document_id: Option<Uuid>,
    pub filename: String,
    pub status: DocumentStatus,
    pub error: Option<String>,
}

/// Outcome of one generation request.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Absent for single-row requests, which get no batch record.
    pub batch_id: Option<Uuid>,
    pub status: BatchStatus,
    /// Item outcomes in value-row order.
    pub items: Vec<ItemOutcome>,
}

/// Removes a scratch file on every exit path.
struct ScratchFile(PathBuf);

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            warn!(file = %self.0.display(), error = %e, "Failed to remove scratch file");
        }
    }
}

/// Drives generation requests through the pipeline stages.
pub struct BatchOrchestrator {
    store: Arc<dyn RecordStore>,
    engine: Arc<dyn ConversionEngine>,
    signer: Arc<SigningEngine>,
    renderer: TemplateRenderer,
    guard: PathGuard,
    upload_dir: PathBuf,
    work_dir: PathBuf,
    workers: usize,
}

impl BatchOrchestrator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        engine: Arc<dyn ConversionEngine>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            engine,
            signer: Arc::new(SigningEngine::new(SecretCodec::new(
                &config.cert_encryption_key,
            ))),
            renderer: TemplateRenderer::default(),
            guard: config.path_guard(),
            upload_dir: config.upload_dir.clone(),
            work_dir: config.work_dir.clone(),
            workers: config.batch_workers,
        }
    }

    /// Run a generation request to completion and report every item.
    pub async fn run(&self, request: BatchRequest) -> Result<BatchOutcome, PipelineError> {
        let template = self
            .store
            .get_template(request.template_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("template {}", request.template_id)))?;

        let certificate = match request.certificate {
            CertificateChoice::Unsigned => None,
            CertificateChoice::Explicit(id) => Some(
                self.store
                    .get_certificate(id)
                    .await?
                    .ok_or_else(|| PipelineError::NotFound(format!("certificate {id}")))?,
            ),
            CertificateChoice::Auto => {
                let candidates = self.store.list_certificates(request.owner_id).await?;
                let picked = vault::select_active(&candidates, chrono::Utc::now())
                    .cloned()
                    .ok_or_else(|| {
                        PipelineError::NotFound("no certificate valid for signing".to_string())
                    })?;
                Some(picked)
            }
        };

        let batch = if request.rows.len() > 1 {
            Some(
                self.store
                    .create_batch(CreateBatchInput {
                        owner_id: request.owner_id,
                        label: request.label.clone(),
                        template_id: template.id,
                        total_count: request.rows.len() as u32,
                    })
                    .await?,
            )
        } else {
            None
        };
        let batch_id = batch.as_ref().map(|b| b.id);

        info!(
            template_id = %template.id,
            rows = request.rows.len(),
            batch_id = ?batch_id,
            signed = certificate.is_some(),
            "Starting generation request"
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for (row, values) in request.rows.into_iter().enumerate() {
            let permits = semaphore.clone();
            let worker = ItemWorker {
                store: self.store.clone(),
                engine: self.engine.clone(),
                signer: self.signer.clone(),
                renderer: self.renderer.clone(),
                guard: self.guard.clone(),
                upload_dir: self.upload_dir.clone(),
                work_dir: self.work_dir.clone(),
                owner_id: request.owner_id,
                template: template.clone(),
                certificate: certificate.clone(),
                batch_id,
            };

            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .expect("semaphore never closed");
                worker.process(row, values).await
            });
        }

        let mut items = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => items.push(outcome),
                Err(e) => {
                    error!(error = %e, "Generation worker panicked");
                }
            }
        }
        items.sort_by_key(|item| item.row);

        let succeeded = items.iter().filter(|i| i.status.is_success()).count() as u32;
        let failed = items.len() as u32 - succeeded;
        let status = BatchStatus::from_counts(succeeded, failed);

        if let Some(id) = batch_id {
            self.store.set_batch_status(id, status).await?;
            self.record_activity(
                match status {
                    BatchStatus::Failed => {
                        ActivityBuilder::failure(request.owner_id, "generation", "batch.generate")
                    }
                    _ => ActivityBuilder::success(request.owner_id, "generation", "batch.generate"),
                }
                .with_message(format!(
                    "Batch \"{}\": {succeeded} of {} documents generated",
                    request.label,
                    items.len()
                ))
                .on_batch(id)
                .on_template(template.id),
            )
            .await;
        }

        info!(batch_id = ?batch_id, %status, succeeded, failed, "Generation request finished");

        Ok(BatchOutcome {
            batch_id,
            status,
            items,
        })
    }

    async fn record_activity(&self, builder: ActivityBuilder) {
        if let Err(e) = self.store.append_activity(builder.build()).await {
            warn!(error = %e, "Failed to append activity entry");
        }
    }
}

/// Everything one item task needs, owned so tasks outlive the request scope.
struct ItemWorker {
    store: Arc<dyn RecordStore>,
    engine: Arc<dyn ConversionEngine>,
    signer: Arc<SigningEngine>,
    renderer: TemplateRenderer,
    guard: PathGuard,
    upload_dir: PathBuf,
    work_dir: PathBuf,
    owner_id: Uuid,
    template: Template,
    certificate: Option<Certificate>,
    batch_id: Option<Uuid>,
}

impl ItemWorker {
    /// Process one item, resolving it to a terminal status. Never returns an
    /// error; failures land in the outcome.
    async fn process(&self, row: usize, values: HashMap<String, PlaceholderValue>) -> ItemOutcome {
        let filename = self.filename_for(row);

        let document = match self
            .store
            .create_document(CreateDocumentInput {
                owner_id: self.owner_id,
                template_id: Some(self.template.id),
                batch_id: self.batch_id,
                filename: filename.clone(),
                variables: serde_json::to_value(&values).ok(),
                source: DocumentSource::Template,
            })
            .await
        {
            Ok(document) => document,
            Err(e) => {
                error!(row, error = %e, "Failed to create document record");
                return ItemOutcome {
                    row,
                    document_id: None,
                    filename,
                    status: DocumentStatus::Failed,
                    error: Some(e.to_string()),
                };
            }
        };

        let (status, error) = match self.generate(document.id, &values).await {
            Ok(status) => {
                self.append(
                    ActivityBuilder::success(self.owner_id, "generation", "document.generate")
                        .with_message(format!("Generated {filename}"))
                        .on_document(document.id)
                        .on_template(self.template.id),
                )
                .await;
                (status, None)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(document_id = %document.id, row, error = %message, "Item failed");
                self.append(
                    ActivityBuilder::failure(self.owner_id, "generation", "document.generate")
                        .with_message(format!("Failed to generate {filename}: {message}"))
                        .on_document(document.id)
                        .on_template(self.template.id),
                )
                .await;
                (DocumentStatus::Failed, Some(message))
            }
        };

        if let Err(e) = self
            .store
            .set_document_status(document.id, status, error.clone())
            .await
        {
            error!(document_id = %document.id, error = %e, "Failed to record document status");
        }

        if status.is_success() {
            if let Some(batch_id) = self.batch_id {
                if let Err(e) = self.store.increment_batch_completed(batch_id).await {
                    error!(batch_id = %batch_id, error = %e, "Failed to count completed item");
                }
            }
        }

        ItemOutcome {
            row,
            document_id: Some(document.id),
            filename,
            status,
            error,
        }
    }

    /// Render, convert, store the artifact, and optionally sign.
    async fn generate(
        &self,
        document_id: Uuid,
        values: &HashMap<String, PlaceholderValue>,
    ) -> Result<DocumentStatus, PipelineError> {
        let source = self
            .guard
            .resolve(&self.upload_dir, &self.template.source_path)?;
        let populated = self.renderer.render(&source, values)?;

        let populated_path = self.work_dir.join(format!("populated-{document_id}.docx"));
        tokio::fs::write(&populated_path, &populated).await?;
        let _scratch = ScratchFile(populated_path.clone());

        let artifact = self.engine.convert(&populated_path).await?;

        let relative = format!("{ARTIFACT_DIR}/{document_id}.pdf");
        let artifact_path = self.work_dir.join(&relative);
        if let Some(parent) = artifact_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&artifact_path, &artifact).await?;
        self.store
            .set_document_artifact(document_id, relative)
            .await?;

        debug!(document_id = %document_id, bytes = artifact.len(), "Artifact stored");

        match &self.certificate {
            Some(certificate) => {
                self.sign(document_id, certificate, &artifact, &artifact_path)
                    .await?;
                Ok(DocumentStatus::Signed)
            }
            None => Ok(DocumentStatus::Ready),
        }
    }

    /// Sign the stored artifact in place. The unsigned artifact path stays
    /// recorded even when signing fails, so failures can be inspected.
    async fn sign(
        &self,
        document_id: Uuid,
        certificate: &Certificate,
        artifact: &[u8],
        artifact_path: &std::path::Path,
    ) -> Result<(), PipelineError> {
        let signature_row = self
            .store
            .create_signature(CreateSignatureInput {
                document_id,
                certificate_id: certificate.id,
                provider: signing::PROVIDER.to_string(),
            })
            .await?;

        let container_path = self
            .guard
            .resolve(&self.upload_dir, &certificate.container_path)?;

        let signed = async {
            let container = tokio::fs::read(&container_path).await?;
            let signed = self
                .signer
                .sign(artifact, &container, &certificate.encrypted_secret)?;
            tokio::fs::write(artifact_path, &signed).await?;
            Ok::<_, PipelineError>(())
        }
        .await;

        match signed {
            Ok(()) => {
                self.store
                    .update_signature(
                        signature_row.id,
                        SignatureStatus::Completed,
                        Some(chrono::Utc::now()),
                        None,
                    )
                    .await?;
                self.append(
                    ActivityBuilder::success(self.owner_id, "signing", "document.sign")
                        .with_message(format!("Signed with certificate \"{}\"", certificate.name))
                        .on_document(document_id)
                        .on_certificate(certificate.id),
                )
                .await;
                Ok(())
            }
            Err(e) => {
                if let Err(update_err) = self
                    .store
                    .update_signature(
                        signature_row.id,
                        SignatureStatus::Failed,
                        None,
                        Some(e.to_string()),
                    )
                    .await
                {
                    error!(document_id = %document_id, error = %update_err, "Failed to record signature failure");
                }
                self.append(
                    ActivityBuilder::failure(self.owner_id, "signing", "document.sign")
                        .with_message(format!(
                            "Signing with certificate \"{}\" failed: {e}",
                            certificate.name
                        ))
                        .on_document(document_id)
                        .on_certificate(certificate.id),
                )
                .await;
                Err(e)
            }
        }
    }

    fn filename_for(&self, row: usize) -> String {
        let stem = sanitize_filename(&self.template.name);
        if self.batch_id.is_some() {
            format!("{stem}-{}.pdf", row + 1)
        } else {
            format!("{stem}.pdf")
        }
    }

    async fn append(&self, builder: ActivityBuilder) {
        if let Err(e) = self.store.append_activity(builder.build()).await {
            warn!(error = %e, "Failed to append activity entry");
        }
    }
}
