//! Batch download bundles.
//!
//! Packs every successful artifact of a batch into one flat archive.
//! Signed documents get a `_signed` filename suffix so the two variants are
//! distinguishable after extraction; name collisions are resolved with a
//! numeric tag. Failed items are simply absent.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::info;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::PipelineError;
use domain::models::DocumentStatus;
use domain::services::audit::ActivityBuilder;
use domain::store::RecordStore;
use shared::path_guard::PathGuard;
use shared::sanitize::{sanitize_filename, with_suffix};

/// Build the download bundle for a batch.
///
/// Returns the archive bytes; fails with [`PipelineError::EmptyBundle`] when
/// no item of the batch succeeded.
pub async fn bundle_batch(
    store: &dyn RecordStore,
    guard: &PathGuard,
    work_dir: &Path,
    batch_id: Uuid,
) -> Result<Vec<u8>, PipelineError> {
    let batch = store
        .get_batch(batch_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("batch {batch_id}")))?;

    let documents = store.list_documents_for_batch(batch_id).await?;

    let mut entries = Vec::new();
    for document in documents {
        if !document.status.is_success() {
            continue;
        }
        let Some(relative) = &document.artifact_path else {
            continue;
        };

        let artifact_path = guard.resolve(work_dir, relative)?;
        let bytes = tokio::fs::read(&artifact_path).await?;

        let mut name = sanitize_filename(&document.filename);
        if document.status == DocumentStatus::Signed {
            name = with_suffix(&name, "_signed");
        }
        entries.push((name, bytes));
    }

    if entries.is_empty() {
        return Err(PipelineError::EmptyBundle);
    }

    let count = entries.len();
    let archive = build_archive(entries)?;

    if let Err(e) = store
        .append_activity(
            ActivityBuilder::success(batch.owner_id, "bundle", "batch.bundle")
                .with_message(format!("Bundled {count} documents"))
                .on_batch(batch_id)
                .build(),
        )
        .await
    {
        tracing::warn!(error = %e, "Failed to append activity entry");
    }

    info!(batch_id = %batch_id, documents = count, "Bundle built");
    Ok(archive)
}

/// Pack named entries into a flat archive, deduplicating collisions.
fn build_archive(entries: Vec<(String, Vec<u8>)>) -> Result<Vec<u8>, PipelineError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut seen: HashMap<String, u32> = HashMap::new();
    for (name, bytes) in entries {
        let unique = match seen.get_mut(&name) {
            Some(count) => {
                *count += 1;
                with_suffix(&name, &format!("-{count}"))
            }
            None => {
                seen.insert(name.clone(), 0);
                name
            }
        };

        writer
            .start_file(unique, options)
            .map_err(zip_error)?;
        writer.write_all(&bytes)?;
    }

    let cursor = writer.finish().map_err(zip_error)?;
    Ok(cursor.into_inner())
}

fn zip_error(e: zip::result::ZipError) -> PipelineError {
    PipelineError::Io(std::io::Error::other(e))
}
