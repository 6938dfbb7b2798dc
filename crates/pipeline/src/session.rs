//! Telemetry session
//!
//! A session owns the ingress queue and the single worker that drains it.
//! Producers on any thread post events without blocking; the worker feeds
//! them to the [`Processor`] one at a time, which is what makes the
//! processor's reused scratch state safe.
//!
//! ```text
//! post_event ──try_send──→ [bounded mpsc] ──→ worker ──→ Processor ──→ Router
//!      ↑                                                    │
//!      └──────── diagnostics posted by actions ─────────────┘
//! ```
//!
//! Diagnostic events posted from inside the action chain go back through
//! the same queue, so they are processed later and never re-entrantly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tally_config::{Config, SessionConfig};
use tally_manifest::{FileManifestSource, Manifest, ManifestSource};
use tally_protocol::{Event, ProtocolError, PropertyValue};
use tally_routing::{Channel, DrainReport, Router};
use tally_transform::{Action, Session, SessionIdentity};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::builtin::builtin_actions;
use crate::reload::{ManifestReloadHandle, ReloadConfig, spawn_reload_worker};
use crate::{PipelineError, Processor, Result, SessionMetrics, SessionMetricsSnapshot};

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

// =============================================================================
// Options
// =============================================================================

/// Settings fixed for the lifetime of a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub identity: SessionIdentity,
    pub opted_in: bool,
    pub collect_pii: bool,
    /// Ingress queue capacity
    pub queue_size: usize,
    /// Default deadline for [`TelemetrySession::dispose_and_transmit`]
    pub drain_timeout: Duration,
    /// Route to test-only channels instead of unit-test-excluded ones
    pub test_mode: bool,
}

impl SessionOptions {
    pub fn new(identity: SessionIdentity) -> Self {
        let defaults = SessionConfig::default();
        Self {
            identity,
            opted_in: defaults.opted_in,
            collect_pii: defaults.collect_pii,
            queue_size: defaults.queue_size,
            drain_timeout: defaults.drain_timeout,
            test_mode: false,
        }
    }

    /// Options for a new session described by config, with a fresh session id
    pub fn from_config(config: &SessionConfig) -> Self {
        let identity = SessionIdentity::new(
            config.machine_id.clone(),
            config.user_id.clone(),
            Uuid::new_v4().to_string(),
        );
        Self {
            identity,
            opted_in: config.opted_in,
            collect_pii: config.collect_pii,
            queue_size: config.queue_size,
            drain_timeout: config.drain_timeout,
            test_mode: false,
        }
    }

    pub fn with_opted_in(mut self, opted_in: bool) -> Self {
        self.opted_in = opted_in;
        self
    }

    pub fn with_collect_pii(mut self, collect_pii: bool) -> Self {
        self.collect_pii = collect_pii;
        self
    }

    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size.max(1);
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }
}

// =============================================================================
// Session context
// =============================================================================

/// The [`Session`] actions see: identity, consent and the ingress queue
#[derive(Debug)]
pub struct SessionContext {
    identity: SessionIdentity,
    opted_in: AtomicBool,
    collect_pii: AtomicBool,
    ingress: Mutex<Option<mpsc::Sender<Event>>>,
    metrics: SessionMetrics,
}

impl SessionContext {
    fn new(options: &SessionOptions) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(options.queue_size.max(1));
        let context = Self {
            identity: options.identity.clone(),
            opted_in: AtomicBool::new(options.opted_in),
            collect_pii: AtomicBool::new(options.collect_pii),
            ingress: Mutex::new(Some(tx)),
            metrics: SessionMetrics::new(),
        };
        (context, rx)
    }

    /// Change consent; applies to events processed from now on
    pub fn set_opted_in(&self, opted_in: bool) {
        self.opted_in.store(opted_in, Ordering::Relaxed);
    }

    pub fn set_collect_pii(&self, allowed: bool) {
        self.collect_pii.store(allowed, Ordering::Relaxed);
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// Whether the queue still accepts events
    pub fn is_accepting(&self) -> bool {
        self.ingress.lock().is_some()
    }

    /// Stop accepting events; the worker finishes what is queued
    fn close_ingress(&self) -> bool {
        self.ingress.lock().take().is_some()
    }
}

impl Session for SessionContext {
    fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    fn is_opted_in(&self) -> bool {
        self.opted_in.load(Ordering::Relaxed)
    }

    fn can_collect_pii(&self) -> bool {
        self.collect_pii.load(Ordering::Relaxed)
    }

    fn post_event(&self, event: Event) {
        let ingress = self.ingress.lock();
        let Some(tx) = ingress.as_ref() else {
            debug!(event = %event.name(), "session closed, event dropped");
            self.metrics.record_ingress_dropped();
            return;
        };

        match tx.try_send(event) {
            Ok(()) => self.metrics.record_enqueued(),
            Err(TrySendError::Full(event)) => {
                debug!(event = %event.name(), "ingress queue full, event dropped");
                self.metrics.record_ingress_dropped();
            }
            Err(TrySendError::Closed(event)) => {
                debug!(event = %event.name(), "ingress queue closed, event dropped");
                self.metrics.record_ingress_dropped();
            }
        }
    }
}

// =============================================================================
// Telemetry session
// =============================================================================

/// A running session: ingress queue, worker task and processor
///
/// Must be started inside a tokio runtime.
pub struct TelemetrySession {
    context: Arc<SessionContext>,
    processor: Arc<Processor>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
    drain_timeout: Duration,
}

impl TelemetrySession {
    /// Start a session with the given custom actions and the built-in manifest
    pub fn start(options: SessionOptions, custom_actions: Vec<Arc<dyn Action>>) -> Result<Self> {
        let (context, rx) = SessionContext::new(&options);
        let context = Arc::new(context);

        let router = Router::new().with_test_mode(options.test_mode);
        let processor = Arc::new(Processor::new(router).with_custom_actions(custom_actions));
        processor.install_manifest(Manifest::default_manifest(), context.as_ref())?;

        let worker = tokio::spawn(run_worker(rx, Arc::clone(&processor), Arc::clone(&context)));

        info!(
            session = %options.identity.session_id,
            queue_size = options.queue_size,
            opted_in = options.opted_in,
            "telemetry session started"
        );

        Ok(Self {
            context,
            processor,
            worker: Mutex::new(Some(worker)),
            shutdown: CancellationToken::new(),
            drain_timeout: options.drain_timeout,
        })
    }

    /// Start a session described by config
    ///
    /// Registers the built-in actions and, when `[manifest] path` is set,
    /// watches that file.
    pub fn from_config(config: &Config) -> Result<Self> {
        let options = SessionOptions::from_config(&config.session);
        let session = Self::start(options, builtin_actions(config))?;

        if let Some(path) = &config.manifest.path {
            session.watch_manifest(
                Arc::new(FileManifestSource::new(path)),
                config.manifest.reload_interval,
            );
        }
        Ok(session)
    }

    /// Poll a manifest source in the background until the session ends
    pub fn watch_manifest(
        &self,
        source: Arc<dyn ManifestSource>,
        interval: Duration,
    ) -> ManifestReloadHandle {
        spawn_reload_worker(
            source,
            Arc::clone(&self.processor),
            Arc::clone(&self.context) as Arc<dyn Session>,
            ReloadConfig::default().with_interval(interval),
            self.shutdown.child_token(),
        )
    }

    pub fn identity(&self) -> &SessionIdentity {
        self.context.identity()
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    pub fn processor(&self) -> &Arc<Processor> {
        &self.processor
    }

    pub fn metrics(&self) -> SessionMetricsSnapshot {
        self.context.metrics().snapshot()
    }

    /// Queue an event; never blocks
    pub fn post_event(&self, event: Event) {
        self.context.post_event(event);
    }

    /// Queue a single-property event; see [`Session::post_property`]
    pub fn post_property(
        &self,
        name: &str,
        value: PropertyValue,
    ) -> std::result::Result<(), ProtocolError> {
        self.context.post_property(name, value)
    }

    pub fn add_channel(&self, channel: Arc<dyn Channel>) -> Result<()> {
        self.processor.add_channel(channel)
    }

    pub fn add_custom_action(&self, action: Arc<dyn Action>) -> Result<()> {
        self.processor.add_custom_action(action)
    }

    pub fn install_manifest(&self, manifest: Manifest) -> Result<()> {
        self.processor.install_manifest(manifest, self.context.as_ref())
    }

    pub fn current_manifest(&self) -> Option<Arc<Manifest>> {
        self.processor.current_manifest()
    }

    /// Configured drain deadline
    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// Close ingress, let the worker finish the queue, then drain channels
    ///
    /// The whole operation is bounded by `deadline`: whatever the worker
    /// leaves of it is what channels get to flush.
    pub async fn dispose_and_transmit(&self, deadline: Duration) -> Result<DrainReport> {
        self.dispose_and_transmit_with_cancel(deadline, CancellationToken::new())
            .await
    }

    /// [`TelemetrySession::dispose_and_transmit`], stopping early when `cancel` fires
    pub async fn dispose_and_transmit_with_cancel(
        &self,
        deadline: Duration,
        cancel: CancellationToken,
    ) -> Result<DrainReport> {
        if self.processor.is_disposed() {
            return Err(PipelineError::Disposed);
        }
        let started = tokio::time::Instant::now();
        self.begin_shutdown();

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            match tokio::time::timeout(deadline, worker).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "session worker failed"),
                Err(_) => warn!(
                    pending = self.metrics().pending(),
                    "ingress not drained before deadline"
                ),
            }
        }

        let remaining = deadline.saturating_sub(started.elapsed());
        self.processor.dispose_and_transmit(remaining, cancel).await
    }

    /// Close ingress and dispose every channel immediately
    ///
    /// Events still queued are not delivered.
    pub fn dispose(&self) -> Result<usize> {
        self.begin_shutdown();
        self.processor.dispose()
    }

    fn begin_shutdown(&self) {
        if self.context.close_ingress() {
            info!(session = %self.identity().session_id, "telemetry session closing");
        }
        self.shutdown.cancel();
    }
}

impl Drop for TelemetrySession {
    fn drop(&mut self) {
        self.context.close_ingress();
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for TelemetrySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetrySession")
            .field("identity", self.identity())
            .field("processor", &self.processor)
            .field("metrics", &self.metrics())
            .finish()
    }
}

/// Drain the ingress queue through the processor, one event at a time
async fn run_worker(
    mut rx: mpsc::Receiver<Event>,
    processor: Arc<Processor>,
    context: Arc<SessionContext>,
) {
    debug!(session = %context.identity().session_id, "session worker started");

    while let Some(event) = rx.recv().await {
        match processor.process_event(event, context.as_ref()) {
            Ok(outcome) => context.metrics().record_processed(outcome.dropped),
            Err(PipelineError::Disposed) => {
                context.metrics().record_failed();
                break;
            }
            Err(e) => {
                context.metrics().record_failed();
                warn!(error = %e, "event processing failed");
            }
        }
    }

    debug!(session = %context.identity().session_id, "session worker stopped");
}
