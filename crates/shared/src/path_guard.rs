//! Filesystem path containment checks.
//!
//! Every path the pipeline touches that originates from a caller or from a
//! stored record is resolved through [`PathGuard`] before any filesystem
//! operation. Resolution is lexical (targets may not exist yet), so `.` and
//! `..` components are normalized without hitting the filesystem.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Raised when a path escapes its allowed base directory.
///
/// Always treated as fatal by callers: it indicates either a bug or an
/// attempted traversal.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("Path '{path}' escapes allowed base '{base}'")]
    Traversal { path: String, base: String },

    #[error("Path '{0}' is outside every allowed base directory")]
    OutsideAllowList(String),

    #[error("Base directory '{0}' is not on the allow-list")]
    UnknownBase(String),
}

/// Allow-list of base directories the pipeline may read from or write to.
#[derive(Debug, Clone)]
pub struct PathGuard {
    allowed: Vec<PathBuf>,
}

impl PathGuard {
    /// Create a guard over a fixed set of absolute base directories.
    pub fn new<I, P>(allowed: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Resolve `candidate` against an allow-listed `base`.
    ///
    /// Relative candidates are joined onto the base; absolute candidates are
    /// normalized as-is. The result must stay equal to or below `base`.
    pub fn resolve(
        &self,
        base: impl AsRef<Path>,
        candidate: impl AsRef<Path>,
    ) -> Result<PathBuf, SecurityError> {
        let base = base.as_ref();
        if !self.allowed.iter().any(|a| a == base) {
            tracing::error!(base = %base.display(), "Resolve against unlisted base");
            return Err(SecurityError::UnknownBase(base.display().to_string()));
        }

        let candidate = candidate.as_ref();
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            base.join(candidate)
        };

        let normalized = normalize(&joined);
        if normalized.starts_with(base) {
            Ok(normalized)
        } else {
            tracing::error!(
                path = %candidate.display(),
                base = %base.display(),
                "Path traversal rejected"
            );
            Err(SecurityError::Traversal {
                path: candidate.display().to_string(),
                base: base.display().to_string(),
            })
        }
    }

    /// Validate an absolute, record-derived path against the whole allow-list.
    pub fn check(&self, path: impl AsRef<Path>) -> Result<PathBuf, SecurityError> {
        let normalized = normalize(path.as_ref());
        if self.allowed.iter().any(|base| normalized.starts_with(base)) {
            Ok(normalized)
        } else {
            tracing::error!(path = %path.as_ref().display(), "Path outside allow-list rejected");
            Err(SecurityError::OutsideAllowList(
                path.as_ref().display().to_string(),
            ))
        }
    }
}

/// Lexically normalize a path, resolving `.` and `..` without touching the
/// filesystem. A `..` that would climb above the root is kept out of the
/// result, which makes the subsequent prefix check reject it.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    // Escaped above the start; emit a marker that can never
                    // match an allowed base.
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
