//! Manifest Hot Reload Worker
//!
//! Periodically loads a manifest from its source and installs it when its
//! version differs from the active one.
//!
//! # Design
//!
//! The reload worker runs as a background task that:
//! 1. Loads from the source on every interval tick or manual trigger
//! 2. Skips manifests whose version is already active
//! 3. Installs anything else through the processor, which posts diagnostics
//!    for the manifest being replaced
//!
//! A failed load keeps the active manifest. The first tick fires
//! immediately, so a freshly spawned worker loads right away.

use std::sync::Arc;
use std::time::Duration;

use tally_manifest::ManifestSource;
use tally_transform::Session;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{PipelineError, Processor};

#[cfg(test)]
#[path = "reload_test.rs"]
mod tests;

/// Default reload interval
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Configuration for the reload worker
#[derive(Debug, Clone)]
pub struct ReloadConfig {
    /// Interval between reload checks
    pub interval: Duration,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RELOAD_INTERVAL,
        }
    }
}

impl ReloadConfig {
    /// Set the reload interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// What a reload attempt did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new version was installed
    Installed(String),
    /// The source returned the active version
    Unchanged,
    /// The source failed; the active manifest stays
    Failed,
    /// The processor is disposed
    Stopped,
}

/// Handle for controlling the reload worker
#[derive(Debug, Clone)]
pub struct ManifestReloadHandle {
    trigger: tokio::sync::mpsc::Sender<()>,
}

impl ManifestReloadHandle {
    /// Trigger an immediate reload
    ///
    /// Returns true if the trigger was sent successfully.
    pub fn trigger_reload(&self) -> bool {
        self.trigger.try_send(()).is_ok()
    }

    /// Trigger a reload, waiting if the channel is full
    pub async fn trigger_reload_async(&self) -> bool {
        self.trigger.send(()).await.is_ok()
    }
}

/// Background worker for manifest hot reload
pub struct ManifestReloadWorker {
    source: Arc<dyn ManifestSource>,
    processor: Arc<Processor>,
    session: Arc<dyn Session>,
    config: ReloadConfig,
    trigger_rx: tokio::sync::mpsc::Receiver<()>,
    cancel: CancellationToken,
}

impl ManifestReloadWorker {
    /// Create a new reload worker
    ///
    /// Returns (worker, handle). Spawn the worker as a tokio task.
    pub fn new(
        source: Arc<dyn ManifestSource>,
        processor: Arc<Processor>,
        session: Arc<dyn Session>,
        config: ReloadConfig,
        cancel: CancellationToken,
    ) -> (Self, ManifestReloadHandle) {
        let (trigger_tx, trigger_rx) = tokio::sync::mpsc::channel(1);

        let worker = Self {
            source,
            processor,
            session,
            config,
            trigger_rx,
            cancel,
        };

        let handle = ManifestReloadHandle {
            trigger: trigger_tx,
        };

        (worker, handle)
    }

    /// Run the reload worker
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            source = %self.source.describe(),
            interval_secs = self.config.interval.as_secs(),
            "manifest reload worker started"
        );

        loop {
            let outcome = tokio::select! {
                _ = interval.tick() => self.reload(),

                Some(()) = self.trigger_rx.recv() => {
                    tracing::debug!("manual manifest reload triggered");
                    self.reload()
                }

                _ = self.cancel.cancelled() => {
                    tracing::info!("manifest reload worker stopping");
                    break;
                }
            };

            if outcome == ReloadOutcome::Stopped {
                break;
            }
        }

        tracing::info!("manifest reload worker stopped");
    }

    /// Load once and install if the version changed
    pub fn reload(&self) -> ReloadOutcome {
        let manifest = match self.source.load() {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!(
                    source = %self.source.describe(),
                    error = %e,
                    "manifest reload failed, keeping active manifest"
                );
                return ReloadOutcome::Failed;
            }
        };

        let active = self.processor.current_manifest();
        if active.is_some_and(|m| m.version() == manifest.version()) {
            tracing::debug!(version = %manifest.version(), "manifest unchanged");
            return ReloadOutcome::Unchanged;
        }

        let version = manifest.version().to_string();
        match self.processor.install_manifest(manifest, self.session.as_ref()) {
            Ok(()) => ReloadOutcome::Installed(version),
            Err(PipelineError::Disposed) => ReloadOutcome::Stopped,
            Err(e) => {
                tracing::warn!(error = %e, "manifest install failed");
                ReloadOutcome::Failed
            }
        }
    }
}

/// Spawn a reload worker as a background task
pub fn spawn_reload_worker(
    source: Arc<dyn ManifestSource>,
    processor: Arc<Processor>,
    session: Arc<dyn Session>,
    config: ReloadConfig,
    cancel: CancellationToken,
) -> ManifestReloadHandle {
    let (worker, handle) = ManifestReloadWorker::new(source, processor, session, config, cancel);
    tokio::spawn(worker.run());
    handle
}
