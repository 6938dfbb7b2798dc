//! Manifest error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors that prevent a manifest from loading at all
///
/// Problems with individual rules or actions are not errors: those units
/// are dropped and counted in the manifest's validation report.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Document is not valid JSON or lacks the top-level shape
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),

    /// Manifest file could not be read
    #[error("failed to read manifest '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Top-level field has an unusable value
    #[error("invalid manifest: {0}")]
    Invalid(String),
}

impl ManifestError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for manifest operations
pub type Result<T> = std::result::Result<T, ManifestError>;
