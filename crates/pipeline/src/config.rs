//! Pipeline configuration.
//!
//! All settings bind from environment-style keys (`CONVERTER_ENGINE`,
//! `REMOTE_SERVER_URL`, ...) with file-based defaults as an optional base
//! layer. Engine selection is fixed here once per deployment; nothing reads
//! configuration mid-call.

use serde::Deserialize;
use shared::path_guard::PathGuard;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::RetryPolicy;

/// Which conversion engine strategy is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Local,
    Remote,
}

/// Pipeline configuration, one flat struct so the documented env keys bind
/// directly.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// `local` (default) or `remote`.
    #[serde(default = "default_engine")]
    pub converter_engine: EngineKind,

    /// Base URL of the remote conversion service; required when
    /// `converter_engine` is `remote`.
    #[serde(default)]
    pub remote_server_url: Option<String>,

    /// Shared secret enabling signed requests to the remote engine.
    #[serde(default)]
    pub remote_jwt_secret: Option<String>,

    /// Enables poll-based completion against the remote engine.
    #[serde(default)]
    pub remote_async: bool,

    /// Overall deadline for one remote conversion, in milliseconds.
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,

    /// Retry budget for transient remote failures.
    #[serde(default = "default_remote_max_retries")]
    pub remote_max_retries: u32,

    /// Externally reachable base URL under which staged files are fetchable
    /// by the remote engine; required when `converter_engine` is `remote`.
    #[serde(default)]
    pub local_callback_url: Option<String>,

    /// Key or passphrase for the secret codec. Required.
    #[serde(default)]
    pub cert_encryption_key: String,

    /// Converter binary for the local engine.
    #[serde(default = "default_local_converter_bin")]
    pub local_converter_bin: String,

    /// Hard timeout for one local converter run, in milliseconds.
    #[serde(default = "default_local_timeout_ms")]
    pub local_timeout_ms: u64,

    /// Scratch and artifact directory.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Publicly fetchable staging directory for the remote engine.
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,

    /// Base directory of stored uploads (template sources, certificate
    /// containers).
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Maximum age of scratch files before the janitor removes them, in
    /// seconds.
    #[serde(default = "default_temp_max_age_secs")]
    pub temp_max_age_secs: u64,

    /// Bounded worker count for concurrent batch items.
    #[serde(default = "default_batch_workers")]
    pub batch_workers: usize,
}

// Default value functions
fn default_engine() -> EngineKind {
    EngineKind::Local
}
fn default_remote_timeout_ms() -> u64 {
    120_000
}
fn default_remote_max_retries() -> u32 {
    3
}
fn default_local_converter_bin() -> String {
    "soffice".to_string()
}
fn default_local_timeout_ms() -> u64 {
    120_000
}
fn default_work_dir() -> PathBuf {
    PathBuf::from("/var/lib/docforge/work")
}
fn default_public_dir() -> PathBuf {
    PathBuf::from("/var/lib/docforge/public")
}
fn default_upload_dir() -> PathBuf {
    PathBuf::from("/var/lib/docforge/uploads")
}
fn default_temp_max_age_secs() -> u64 {
    3600
}
fn default_batch_workers() -> usize {
    4
}

/// Configuration validation error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from the optional defaults file and the
    /// environment.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - optional base configuration
    /// 2. Environment variables (`CONVERTER_ENGINE`, `REMOTE_SERVER_URL`, ...)
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::default().try_parsing(true))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Build a configuration from defaults plus explicit overrides, without
    /// touching files or the process environment.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("cert_encryption_key", "test-encryption-key")?;

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.cert_encryption_key.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "CERT_ENCRYPTION_KEY must be set".to_string(),
            ));
        }

        if self.converter_engine == EngineKind::Remote {
            if self.remote_server_url.as_deref().unwrap_or("").is_empty() {
                return Err(ConfigValidationError::MissingRequired(
                    "REMOTE_SERVER_URL must be set when CONVERTER_ENGINE=remote".to_string(),
                ));
            }
            if self.local_callback_url.as_deref().unwrap_or("").is_empty() {
                return Err(ConfigValidationError::MissingRequired(
                    "LOCAL_CALLBACK_URL must be set when CONVERTER_ENGINE=remote".to_string(),
                ));
            }
        }

        if self.batch_workers == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "BATCH_WORKERS cannot be 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Allow-list guard over the configured base directories.
    pub fn path_guard(&self) -> PathGuard {
        PathGuard::new([
            self.work_dir.clone(),
            self.public_dir.clone(),
            self.upload_dir.clone(),
        ])
    }

    /// Retry parameters for the remote engine.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.remote_max_retries,
            base_delay: Duration::from_millis(500),
        }
    }

    pub fn local_timeout(&self) -> Duration {
        Duration::from_millis(self.local_timeout_ms)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }
}
