//! Conversion engines: populated document in, fixed-layout artifact out.
//!
//! Two interchangeable strategies behind one trait, selected once at startup
//! from configuration and injected into the orchestrator. There is no
//! per-call switching between strategies.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub mod local;
pub mod remote;
mod token;

pub use local::LocalEngine;
pub use remote::{RemoteEngine, RetryPolicy};

use crate::config::{Config, ConfigValidationError, EngineKind};

/// Why a conversion failed.
#[derive(Debug, Error)]
pub enum ConversionCause {
    #[error("converter exited with status {0}")]
    NonZeroExit(i32),

    #[error("converter timed out after {0} ms")]
    Timeout(u64),

    #[error("artifact not produced: {0}")]
    MissingArtifact(String),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("response malformed: {0}")]
    MalformedResponse(String),

    #[error("engine reported error {code}: {reason}")]
    Engine { code: i32, reason: String },

    #[error("overall deadline of {0} ms exceeded")]
    DeadlineExceeded(u64),

    #[error("request token could not be minted: {0}")]
    Token(String),
}

impl ConversionCause {
    /// Whether retrying the whole request may help. Engine-reported codes
    /// and deadline expiry are terminal.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConversionCause::Transport(_)
                | ConversionCause::HttpStatus(_)
                | ConversionCause::MalformedResponse(_)
        )
    }
}

/// A conversion failure, tagged with the engine that raised it. Fatal for
/// the affected item; the engine's own retry budget is already spent.
#[derive(Debug, Error)]
#[error("conversion failed ({engine}): {cause}")]
pub struct ConversionError {
    pub engine: &'static str,
    pub cause: ConversionCause,
}

impl ConversionError {
    pub fn new(engine: &'static str, cause: ConversionCause) -> Self {
        Self { engine, cause }
    }
}

/// Renders a populated document package into a fixed-layout artifact.
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    /// Short engine tag used in errors and logs.
    fn name(&self) -> &'static str;

    /// Convert the populated document at `populated` and return the artifact
    /// bytes.
    async fn convert(&self, populated: &Path) -> Result<Vec<u8>, ConversionError>;
}

/// Build the configured engine. Called once at startup.
pub fn build_engine(config: &Config) -> Result<Arc<dyn ConversionEngine>, ConfigValidationError> {
    config.validate()?;
    match config.converter_engine {
        EngineKind::Local => Ok(Arc::new(LocalEngine::new(
            config.local_converter_bin.clone(),
            config.work_dir.clone(),
            config.local_timeout(),
        ))),
        EngineKind::Remote => {
            let server_url = config.remote_server_url.clone().ok_or_else(|| {
                ConfigValidationError::MissingRequired("REMOTE_SERVER_URL".to_string())
            })?;
            let callback_url = config.local_callback_url.clone().ok_or_else(|| {
                ConfigValidationError::MissingRequired("LOCAL_CALLBACK_URL".to_string())
            })?;
            Ok(Arc::new(RemoteEngine::new(
                server_url,
                callback_url,
                config.public_dir.clone(),
                config.remote_jwt_secret.clone(),
                config.remote_async,
                config.remote_timeout(),
                config.retry_policy(),
            )))
        }
    }
}
