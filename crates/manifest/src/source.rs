//! Manifest sources
//!
//! A source hands out freshly parsed manifests. Each load returns a new
//! instance: manifests carry per-session sampling decisions and counters,
//! so one instance is never installed twice.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tally_transform::{ActionRegistry, default_registry};

use crate::{Manifest, ManifestError, Result};

#[cfg(test)]
#[path = "source_test.rs"]
mod tests;

/// Supplier of parsed manifests
pub trait ManifestSource: Send + Sync {
    /// Load the current manifest
    ///
    /// # Errors
    ///
    /// Any error leaves the caller on its previously installed manifest.
    fn load(&self) -> Result<Manifest>;

    /// Human-readable origin for logs
    fn describe(&self) -> String;
}

/// Manifest held in memory as JSON text
#[derive(Debug, Clone)]
pub struct StaticManifestSource {
    json: String,
    registry: Arc<ActionRegistry>,
}

impl StaticManifestSource {
    pub fn new(json: impl Into<String>) -> Self {
        Self::with_registry(json, Arc::new(default_registry()))
    }

    pub fn with_registry(json: impl Into<String>, registry: Arc<ActionRegistry>) -> Self {
        Self {
            json: json.into(),
            registry,
        }
    }
}

impl ManifestSource for StaticManifestSource {
    fn load(&self) -> Result<Manifest> {
        Manifest::parse(&self.json, &self.registry)
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

/// Manifest read from a JSON file on every load
#[derive(Debug, Clone)]
pub struct FileManifestSource {
    path: PathBuf,
    registry: Arc<ActionRegistry>,
}

impl FileManifestSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_registry(path, Arc::new(default_registry()))
    }

    pub fn with_registry(path: impl Into<PathBuf>, registry: Arc<ActionRegistry>) -> Self {
        Self {
            path: path.into(),
            registry,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ManifestSource for FileManifestSource {
    fn load(&self) -> Result<Manifest> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| ManifestError::io(&self.path, e))?;
        Manifest::parse(&content, &self.registry)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
