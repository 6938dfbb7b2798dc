//! Tally Pipeline
//!
//! The processor that runs events through manifest and custom actions,
//! and the session that feeds it.
//!
//! # Architecture
//!
//! ```text
//! [Producers]             [TelemetrySession]                      [Channels]
//!   thread A ──┐                                              ┌──→ analytics
//!   thread B ──┼──→ mpsc (bounded) ──→ worker ──→ Processor ──┼──→ crash upload
//!   actions  ──┘                                   │          └──→ developer log
//!                                                  │
//!                     ManifestReloadWorker ──→ ArcSwap<Manifest>
//! ```
//!
//! # Key Design
//!
//! - **Single worker**: one task drains the ingress queue, so events are
//!   processed strictly one at a time
//! - **Non-blocking ingress**: `try_send`; a full queue drops and counts
//! - **Snapshot manifests**: installed by atomic replacement, loaded once
//!   per event
//! - **Bounded shutdown**: `dispose_and_transmit` drains the queue and gives
//!   flush-capable channels a deadline
//!
//! # Example
//!
//! ```ignore
//! use tally_pipeline::{SessionOptions, TelemetrySession};
//!
//! let session = TelemetrySession::start(SessionOptions::new(identity), actions)?;
//! session.add_channel(stdout_channel)?;
//! session.post_event(Event::new("app/start"));
//! session.dispose_and_transmit(Duration::from_secs(5)).await?;
//! ```

mod builtin;
mod error;
mod metrics;
mod processor;
mod reload;
mod session;

pub use builtin::builtin_actions;
pub use error::{PipelineError, Result};
pub use metrics::{SessionMetrics, SessionMetricsSnapshot};
pub use processor::{MANIFEST_DIAGNOSTICS_EVENT, ProcessOutcome, Processor};
pub use reload::{
    DEFAULT_RELOAD_INTERVAL, ManifestReloadHandle, ManifestReloadWorker, ReloadConfig,
    ReloadOutcome, spawn_reload_worker,
};
pub use session::{SessionContext, SessionOptions, TelemetrySession};
