//! Remote conversion engine: HTTP service with staging, polling, and retry.
//!
//! The populated document is staged under the public dir so the remote
//! engine can fetch it through `LOCAL_CALLBACK_URL`. One conversion is a
//! POST of a JSON request, optionally signed with a short-lived token; in
//! async mode the same request is re-issued every poll interval until the
//! engine reports completion, an error, or the overall deadline passes.
//! Transient failures retry the whole request under an explicit
//! [`RetryPolicy`]; engine-reported negative codes are terminal.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{token, ConversionCause, ConversionEngine, ConversionError};

const ENGINE_NAME: &str = "remote";

/// Per-request HTTP timeout; the overall conversion deadline is separate.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default wait between polls in async mode.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Explicit retry parameters for the remote strategy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// First backoff delay; doubles per retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(retry)
    }
}

/// Removes the staged public copy on every exit path.
struct StagedFile(PathBuf);

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            warn!(file = %self.0.display(), error = %e, "Failed to remove staged file");
        }
    }
}

#[derive(Debug, Serialize)]
struct ConvertRequest {
    key: String,
    url: String,
    filetype: &'static str,
    outputtype: &'static str,
    #[serde(rename = "async")]
    poll: bool,
}

#[derive(Debug, Deserialize)]
struct ConvertResponse {
    #[serde(rename = "endConvert", default)]
    end_convert: bool,
    #[serde(rename = "fileUrl", default)]
    file_url: Option<String>,
    #[serde(default)]
    percent: Option<i32>,
    #[serde(default)]
    error: Option<i32>,
}

/// The engine's documented negative error codes.
fn describe_code(code: i32) -> &'static str {
    match code {
        -2 => "conversion timeout",
        -3 => "corrupted input document",
        -4 => "source download failure",
        -5 => "input document is password protected",
        -7 => "unsupported input format",
        -8 => "invalid request token",
        _ => "unknown engine error",
    }
}

/// Converts via the remote HTTP conversion service.
pub struct RemoteEngine {
    client: reqwest::Client,
    server_url: String,
    callback_url: String,
    public_dir: PathBuf,
    jwt_secret: Option<String>,
    poll_async: bool,
    overall_timeout: Duration,
    retry: RetryPolicy,
    poll_interval: Duration,
}

impl RemoteEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        server_url: String,
        callback_url: String,
        public_dir: PathBuf,
        jwt_secret: Option<String>,
        poll_async: bool,
        overall_timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            server_url,
            callback_url,
            public_dir,
            jwt_secret,
            poll_async,
            overall_timeout,
            retry,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the poll interval (used by tests with short deadlines).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Copy the populated document into the public staging dir and return
    /// (local path, fetchable URL).
    async fn stage(&self, populated: &Path) -> Result<(PathBuf, String), ConversionCause> {
        let name = format!("stage-{}.docx", Uuid::new_v4());
        let dest = self.public_dir.join(&name);
        tokio::fs::copy(populated, &dest).await?;
        let url = format!("{}/{}", self.callback_url.trim_end_matches('/'), name);
        Ok((dest, url))
    }

    /// One full conversion: request, optional polling, artifact download.
    async fn execute(&self, request: &ConvertRequest) -> Result<Vec<u8>, ConversionCause> {
        let deadline = Instant::now() + self.overall_timeout;
        let endpoint = format!("{}/convert", self.server_url.trim_end_matches('/'));

        loop {
            let mut req = self.client.post(&endpoint).json(request);
            if let Some(secret) = &self.jwt_secret {
                let bearer = token::mint(secret, &self.server_url)
                    .map_err(|e| ConversionCause::Token(e.to_string()))?;
                req = req.bearer_auth(bearer);
            }

            let response = req
                .send()
                .await
                .map_err(|e| ConversionCause::Transport(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(ConversionCause::HttpStatus(status.as_u16()));
            }

            let body: ConvertResponse = response
                .json()
                .await
                .map_err(|e| ConversionCause::MalformedResponse(e.to_string()))?;

            if let Some(code) = body.error {
                return Err(ConversionCause::Engine {
                    code,
                    reason: describe_code(code).to_string(),
                });
            }

            if body.end_convert {
                let url = body.file_url.ok_or_else(|| {
                    ConversionCause::MalformedResponse("endConvert without fileUrl".to_string())
                })?;
                return self.download(&url).await;
            }

            if !self.poll_async {
                return Err(ConversionCause::MalformedResponse(
                    "conversion did not complete synchronously".to_string(),
                ));
            }

            debug!(percent = body.percent.unwrap_or(0), "Remote conversion in progress");

            if Instant::now() + self.poll_interval >= deadline {
                return Err(ConversionCause::DeadlineExceeded(
                    self.overall_timeout.as_millis() as u64,
                ));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ConversionCause> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ConversionCause::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ConversionCause::HttpStatus(status.as_u16()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ConversionCause::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ConversionEngine for RemoteEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    async fn convert(&self, populated: &Path) -> Result<Vec<u8>, ConversionError> {
        let (staged_path, source_url) = self
            .stage(populated)
            .await
            .map_err(|cause| ConversionError::new(ENGINE_NAME, cause))?;
        let _cleanup = StagedFile(staged_path);

        let request = ConvertRequest {
            key: Uuid::new_v4().simple().to_string(),
            url: source_url,
            filetype: "docx",
            outputtype: "pdf",
            poll: self.poll_async,
        };

        let mut retry = 0u32;
        loop {
            match self.execute(&request).await {
                Ok(artifact) => return Ok(artifact),
                Err(cause) if cause.is_transient() && retry < self.retry.max_retries => {
                    let delay = self.retry.delay_for(retry);
                    warn!(
                        retry = retry + 1,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %cause,
                        "Remote conversion failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(cause) => return Err(ConversionError::new(ENGINE_NAME, cause)),
            }
        }
    }
}
