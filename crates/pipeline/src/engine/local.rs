//! Local conversion engine: external converter binary under a hard timeout.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ConversionCause, ConversionEngine, ConversionError};

const ENGINE_NAME: &str = "local";

/// Removes the scratch directory (populated input and converter output) on
/// every exit path.
struct ScratchDir(PathBuf);

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.0) {
            warn!(dir = %self.0.display(), error = %e, "Failed to remove scratch dir");
        }
    }
}

/// Converts via a local converter subprocess (`soffice --headless`).
pub struct LocalEngine {
    bin: String,
    work_dir: PathBuf,
    timeout: Duration,
}

impl LocalEngine {
    pub fn new(bin: String, work_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            bin,
            work_dir,
            timeout,
        }
    }

    fn err(&self, cause: ConversionCause) -> ConversionError {
        ConversionError::new(ENGINE_NAME, cause)
    }
}

#[async_trait]
impl ConversionEngine for LocalEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    async fn convert(&self, populated: &Path) -> Result<Vec<u8>, ConversionError> {
        let scratch = self.work_dir.join(format!("convert-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&scratch)
            .await
            .map_err(|e| self.err(e.into()))?;
        let _cleanup = ScratchDir(scratch.clone());

        let input = scratch.join("input.docx");
        tokio::fs::copy(populated, &input)
            .await
            .map_err(|e| self.err(e.into()))?;

        debug!(bin = %self.bin, input = %input.display(), "Invoking local converter");

        let child = Command::new(&self.bin)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(&scratch)
            .arg(&input)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A hung converter is killed when the timed-out future drops.
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.err(e.into()))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| self.err(e.into()))?,
            Err(_) => {
                warn!(bin = %self.bin, timeout_ms = self.timeout.as_millis() as u64,
                    "Local converter timed out, killing");
                return Err(self.err(ConversionCause::Timeout(self.timeout.as_millis() as u64)));
            }
        };

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            warn!(
                bin = %self.bin,
                code = code,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "Local converter exited with failure"
            );
            return Err(self.err(ConversionCause::NonZeroExit(code)));
        }

        let artifact = scratch.join("input.pdf");
        match tokio::fs::read(&artifact).await {
            Ok(bytes) => Ok(bytes),
            Err(_) => Err(self.err(ConversionCause::MissingArtifact(format!(
                "expected {}",
                artifact.display()
            )))),
        }
    }
}
