//! End-to-end pipeline tests over the in-process record store and a stub
//! conversion engine.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use docforge_pipeline::archive::bundle_batch;
use docforge_pipeline::engine::{ConversionCause, ConversionEngine, ConversionError};
use docforge_pipeline::intake::{self, CertificateUpload, TemplateUpload};
use docforge_pipeline::renderer::PlaceholderValue;
use docforge_pipeline::{
    BatchOrchestrator, BatchRequest, CertificateChoice, Config, PipelineError,
};
use domain::models::{
    ActivityStatus, BatchStatus, CertificateKind, CreateBatchInput, CreateCertificateInput,
    CreateDocumentInput, DocumentSource, DocumentStatus, SignatureStatus,
};
use domain::store::RecordStore;
use persistence::MemoryStore;
use shared::secret::SecretCodec;

/// Succeeds unless the populated document contains the poison marker.
struct StubEngine;

const POISON: &str = "fail-this-item";

#[async_trait]
impl ConversionEngine for StubEngine {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn convert(&self, populated: &Path) -> Result<Vec<u8>, ConversionError> {
        let bytes = tokio::fs::read(populated)
            .await
            .map_err(|e| ConversionError::new("stub", ConversionCause::Io(e)))?;
        let mut zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ConversionError::new("stub", ConversionCause::MissingArtifact(e.to_string())))?;
        let mut markup = String::new();
        zip.by_name("content.xml")
            .map_err(|e| ConversionError::new("stub", ConversionCause::MissingArtifact(e.to_string())))?
            .read_to_string(&mut markup)
            .map_err(|e| ConversionError::new("stub", ConversionCause::Io(e)))?;

        if markup.contains(POISON) {
            return Err(ConversionError::new("stub", ConversionCause::NonZeroExit(1)));
        }
        Ok(format!("%PDF-1.7 converted: {markup}").into_bytes())
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    config: Config,
    orchestrator: BatchOrchestrator,
    template_id: Uuid,
    owner_id: Uuid,
    _dirs: Vec<tempfile::TempDir>,
}

async fn harness() -> Harness {
    let work = tempfile::tempdir().unwrap();
    let public = tempfile::tempdir().unwrap();
    let upload = tempfile::tempdir().unwrap();

    let config = Config::load_for_test(&[
        ("work_dir", work.path().to_str().unwrap()),
        ("public_dir", public.path().to_str().unwrap()),
        ("upload_dir", upload.path().to_str().unwrap()),
        ("batch_workers", "3"),
    ])
    .unwrap();

    // Template package: one XML part with two placeholders.
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("content.xml", SimpleFileOptions::default())
        .unwrap();
    writer
        .write_all(b"<doc><p>{{ name }} owes {{ amount }}</p></doc>")
        .unwrap();
    let package = writer.finish().unwrap().into_inner();
    std::fs::write(upload.path().join("contract.docx"), package).unwrap();

    let store = Arc::new(MemoryStore::new());
    let owner_id = Uuid::new_v4();
    let template = intake::register_template(
        store.as_ref(),
        &config.path_guard(),
        &config.upload_dir,
        TemplateUpload {
            owner_id,
            name: "Loan Contract".into(),
            source_path: "contract.docx".into(),
            original_filename: "contract.docx".into(),
            media_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                .into(),
        },
    )
    .await
    .unwrap();
    assert_eq!(template.placeholders, vec!["name", "amount"]);

    let orchestrator = BatchOrchestrator::new(store.clone(), Arc::new(StubEngine), &config);

    Harness {
        store,
        config,
        orchestrator,
        template_id: template.id,
        owner_id,
        _dirs: vec![work, public, upload],
    }
}

fn row(name: &str, amount: f64) -> HashMap<String, PlaceholderValue> {
    HashMap::from([
        ("name".to_string(), PlaceholderValue::Text(name.to_string())),
        ("amount".to_string(), PlaceholderValue::Number(amount)),
    ])
}

#[tokio::test]
async fn test_one_failed_item_leaves_batch_partial() {
    let h = harness().await;

    let rows = vec![
        row("Alice", 100.0),
        row("Bob", 200.0),
        row(POISON, 300.0),
        row("Dana", 400.0),
        row("Egon", 500.0),
    ];

    let outcome = h
        .orchestrator
        .run(BatchRequest {
            owner_id: h.owner_id,
            template_id: h.template_id,
            rows,
            certificate: CertificateChoice::Unsigned,
            label: "March contracts".into(),
        })
        .await
        .unwrap();

    assert_eq!(outcome.status, BatchStatus::Partial);
    assert_eq!(outcome.items.len(), 5);

    for item in &outcome.items {
        if item.row == 2 {
            assert_eq!(item.status, DocumentStatus::Failed);
            assert!(item.error.as_deref().unwrap_or("").contains("stub"));
        } else {
            assert_eq!(item.status, DocumentStatus::Ready);
            assert!(item.error.is_none());
        }
    }

    let batch = h
        .store
        .get_batch(outcome.batch_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(batch.total_count, 5);
    assert_eq!(batch.completed_count, 4);
    assert_eq!(batch.status, BatchStatus::Partial);

    // Successful items have stored artifacts; the failed one does not.
    for item in &outcome.items {
        let document = h
            .store
            .get_document(item.document_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        if item.row == 2 {
            assert!(document.artifact_path.is_none());
            assert!(document.error.is_some());
        } else {
            let artifact = h
                .config
                .work_dir
                .join(document.artifact_path.as_deref().unwrap());
            assert!(artifact.exists());
        }
    }
}

#[tokio::test]
async fn test_single_row_gets_no_batch_record() {
    let h = harness().await;

    let outcome = h
        .orchestrator
        .run(BatchRequest {
            owner_id: h.owner_id,
            template_id: h.template_id,
            rows: vec![row("Alice", 1234567.5)],
            certificate: CertificateChoice::Unsigned,
            label: "single".into(),
        })
        .await
        .unwrap();

    assert!(outcome.batch_id.is_none());
    assert_eq!(outcome.status, BatchStatus::Completed);
    assert_eq!(outcome.items.len(), 1);
    assert_eq!(outcome.items[0].status, DocumentStatus::Ready);

    // Amount formatting: space-grouped integer part, comma decimals.
    let document = h
        .store
        .get_document(outcome.items[0].document_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    let artifact = h
        .config
        .work_dir
        .join(document.artifact_path.as_deref().unwrap());
    let content = std::fs::read_to_string(artifact).unwrap();
    assert!(content.contains("Alice owes 1 234 567,50"), "{content}");
}

#[tokio::test]
async fn test_all_failed_batch_and_empty_bundle() {
    let h = harness().await;

    let outcome = h
        .orchestrator
        .run(BatchRequest {
            owner_id: h.owner_id,
            template_id: h.template_id,
            rows: vec![row(POISON, 1.0), row(POISON, 2.0)],
            certificate: CertificateChoice::Unsigned,
            label: "doomed".into(),
        })
        .await
        .unwrap();

    assert_eq!(outcome.status, BatchStatus::Failed);
    let batch_id = outcome.batch_id.unwrap();
    let batch = h.store.get_batch(batch_id).await.unwrap().unwrap();
    assert_eq!(batch.completed_count, 0);

    let err = bundle_batch(
        h.store.as_ref(),
        &h.config.path_guard(),
        &h.config.work_dir,
        batch_id,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PipelineError::EmptyBundle));
}

#[tokio::test]
async fn test_partial_batch_bundles_only_successes() {
    let h = harness().await;

    let outcome = h
        .orchestrator
        .run(BatchRequest {
            owner_id: h.owner_id,
            template_id: h.template_id,
            rows: vec![row("Alice", 1.0), row(POISON, 2.0), row("Carol", 3.0)],
            certificate: CertificateChoice::Unsigned,
            label: "mixed".into(),
        })
        .await
        .unwrap();

    let bundle = bundle_batch(
        h.store.as_ref(),
        &h.config.path_guard(),
        &h.config.work_dir,
        outcome.batch_id.unwrap(),
    )
    .await
    .unwrap();

    let zip = ZipArchive::new(Cursor::new(bundle)).unwrap();
    assert_eq!(zip.len(), 2);
    let names: Vec<_> = zip.file_names().collect();
    assert!(names.iter().all(|n| n.ends_with(".pdf")));
}

#[tokio::test]
async fn test_bundle_distinguishes_signed_entries() {
    let h = harness().await;

    let batch = h
        .store
        .create_batch(CreateBatchInput {
            owner_id: h.owner_id,
            label: "staged".into(),
            template_id: h.template_id,
            total_count: 3,
        })
        .await
        .unwrap();

    let artifacts = h.config.work_dir.join("artifacts");
    std::fs::create_dir_all(&artifacts).unwrap();

    for (filename, status) in [
        ("contract-1.pdf", DocumentStatus::Ready),
        ("contract-2.pdf", DocumentStatus::Signed),
        ("contract-3.pdf", DocumentStatus::Failed),
    ] {
        let document = h
            .store
            .create_document(CreateDocumentInput {
                owner_id: h.owner_id,
                template_id: Some(h.template_id),
                batch_id: Some(batch.id),
                filename: filename.into(),
                variables: None,
                source: DocumentSource::Template,
            })
            .await
            .unwrap();

        if status == DocumentStatus::Failed {
            h.store
                .set_document_status(document.id, status, Some("conversion failed".into()))
                .await
                .unwrap();
            continue;
        }
        let relative = format!("artifacts/{}.pdf", document.id);
        std::fs::write(h.config.work_dir.join(&relative), b"%PDF-1.7").unwrap();
        h.store
            .set_document_artifact(document.id, relative)
            .await
            .unwrap();
        h.store
            .set_document_status(document.id, status, None)
            .await
            .unwrap();
    }

    let bundle = bundle_batch(
        h.store.as_ref(),
        &h.config.path_guard(),
        &h.config.work_dir,
        batch.id,
    )
    .await
    .unwrap();

    let zip = ZipArchive::new(Cursor::new(bundle)).unwrap();
    let mut names: Vec<_> = zip.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, vec!["contract-1.pdf", "contract-2_signed.pdf"]);
}

#[tokio::test]
async fn test_unsignable_certificate_fails_item_not_demotes() {
    let h = harness().await;
    let codec = SecretCodec::new(&h.config.cert_encryption_key);

    // Garbage container: registration tolerates it, signing must not.
    std::fs::write(h.config.upload_dir.join("cert.p12"), b"not pkcs12").unwrap();
    let certificate = intake::register_certificate(
        h.store.as_ref(),
        &codec,
        &h.config.path_guard(),
        &h.config.upload_dir,
        CertificateUpload {
            owner_id: h.owner_id,
            name: "Broken".into(),
            container_path: "cert.p12".into(),
            password: "pw".into(),
            kind: CertificateKind::Software,
            original_filename: "cert.p12".into(),
        },
    )
    .await
    .unwrap();
    assert!(certificate.valid_from.is_none());

    let outcome = h
        .orchestrator
        .run(BatchRequest {
            owner_id: h.owner_id,
            template_id: h.template_id,
            rows: vec![row("Alice", 1.0)],
            certificate: CertificateChoice::Explicit(certificate.id),
            label: "signed single".into(),
        })
        .await
        .unwrap();

    let item = &outcome.items[0];
    assert_eq!(item.status, DocumentStatus::Failed);
    assert!(item.error.is_some());

    // The conversion artifact stays recorded for inspection.
    let document = h
        .store
        .get_document(item.document_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(document.status, DocumentStatus::Failed);
    assert!(document.artifact_path.is_some());

    let signatures = h
        .store
        .signatures_for_document(item.document_id.unwrap())
        .await;
    assert_eq!(signatures.len(), 1);
    assert_eq!(signatures[0].status, SignatureStatus::Failed);
    assert!(signatures[0].signed_at.is_none());

    let failures: Vec<_> = h
        .store
        .activity_entries()
        .await
        .into_iter()
        .filter(|e| e.status == ActivityStatus::Failure)
        .collect();
    assert!(failures.iter().any(|e| e.action == "document.sign"));
}

#[tokio::test]
async fn test_unknown_template_rejected() {
    let h = harness().await;

    let err = h
        .orchestrator
        .run(BatchRequest {
            owner_id: h.owner_id,
            template_id: Uuid::new_v4(),
            rows: vec![row("Alice", 1.0)],
            certificate: CertificateChoice::Unsigned,
            label: "missing".into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::NotFound(_)));
}

// Password-protected key-pair container used by the signing tests.
const SIGNER_CONTAINER: &[u8] = include_bytes!("fixtures/signing.p12");
const SIGNER_PASSWORD: &str = "test-password";

async fn register_signer(h: &Harness) -> domain::models::Certificate {
    let codec = SecretCodec::new(&h.config.cert_encryption_key);
    std::fs::write(h.config.upload_dir.join("signer.p12"), SIGNER_CONTAINER).unwrap();
    intake::register_certificate(
        h.store.as_ref(),
        &codec,
        &h.config.path_guard(),
        &h.config.upload_dir,
        CertificateUpload {
            owner_id: h.owner_id,
            name: "Company signer".into(),
            container_path: "signer.p12".into(),
            password: SIGNER_PASSWORD.into(),
            kind: CertificateKind::Software,
            original_filename: "signer.p12".into(),
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_signed_document_end_to_end() {
    let h = harness().await;
    let certificate = register_signer(&h).await;

    // Registration parsed the container: validity window and serial recorded.
    assert!(certificate.valid_from.is_some());
    assert!(certificate.valid_to.is_some());
    let serial = certificate.subject_serial.clone().unwrap();

    let outcome = h
        .orchestrator
        .run(BatchRequest {
            owner_id: h.owner_id,
            template_id: h.template_id,
            rows: vec![row("Alice", 2500.0)],
            certificate: CertificateChoice::Explicit(certificate.id),
            label: "signed contract".into(),
        })
        .await
        .unwrap();

    assert_eq!(outcome.status, BatchStatus::Completed);
    assert_eq!(outcome.items[0].status, DocumentStatus::Signed);

    let document = h
        .store
        .get_document(outcome.items[0].document_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(document.status, DocumentStatus::Signed);

    // Stored artifact embeds the signature trailer with the signer's serial.
    let artifact = std::fs::read(
        h.config
            .work_dir
            .join(document.artifact_path.as_deref().unwrap()),
    )
    .unwrap();
    assert!(docforge_pipeline::signing::has_signature_trailer(&artifact));
    let text = String::from_utf8_lossy(&artifact);
    assert!(text.starts_with("%PDF-1.7"));
    assert!(text.contains(&format!("%DocForge-Sig-Serial: {serial}")));
    assert!(text.contains("%DocForge-Sig-Digest: sha256:"));
    assert!(text.ends_with("%%EOF\n"));

    let signatures = h.store.signatures_for_document(document.id).await;
    assert_eq!(signatures.len(), 1);
    assert_eq!(signatures[0].status, SignatureStatus::Completed);
    assert_eq!(signatures[0].certificate_id, certificate.id);
    assert!(signatures[0].signed_at.is_some());
    assert!(signatures[0].error.is_none());

    let activity = h.store.activity_entries().await;
    assert!(activity
        .iter()
        .any(|e| e.action == "document.sign" && e.status == ActivityStatus::Success));
}

#[tokio::test]
async fn test_auto_selection_signs_with_soonest_expiry() {
    let h = harness().await;
    let codec = SecretCodec::new(&h.config.cert_encryption_key);
    std::fs::write(h.config.upload_dir.join("signer.p12"), SIGNER_CONTAINER).unwrap();

    // Two records over the same container, windows crafted so the one
    // closer to retirement must win.
    let now = chrono::Utc::now();
    let mut ids = Vec::new();
    for (name, days_to_expiry) in [("later", 30), ("sooner", 7)] {
        let certificate = h
            .store
            .create_certificate(CreateCertificateInput {
                owner_id: h.owner_id,
                name: name.into(),
                container_path: "signer.p12".into(),
                encrypted_secret: codec.encrypt(SIGNER_PASSWORD).unwrap(),
                kind: CertificateKind::Software,
                subject_serial: None,
                valid_from: Some(now - chrono::Duration::days(1)),
                valid_to: Some(now + chrono::Duration::days(days_to_expiry)),
                original_filename: "signer.p12".into(),
            })
            .await
            .unwrap();
        ids.push(certificate.id);
    }

    let outcome = h
        .orchestrator
        .run(BatchRequest {
            owner_id: h.owner_id,
            template_id: h.template_id,
            rows: vec![row("Alice", 1.0)],
            certificate: CertificateChoice::Auto,
            label: "auto signed".into(),
        })
        .await
        .unwrap();

    assert_eq!(outcome.items[0].status, DocumentStatus::Signed);
    let signatures = h
        .store
        .signatures_for_document(outcome.items[0].document_id.unwrap())
        .await;
    assert_eq!(signatures[0].certificate_id, ids[1], "soonest expiry wins");
}

#[tokio::test]
async fn test_auto_selection_without_valid_certificate_rejected() {
    let h = harness().await;

    let err = h
        .orchestrator
        .run(BatchRequest {
            owner_id: h.owner_id,
            template_id: h.template_id,
            rows: vec![row("Alice", 1.0)],
            certificate: CertificateChoice::Auto,
            label: "auto unsigned".into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::NotFound(_)));
}
