//! Session metrics
//!
//! Atomic counters for the ingress queue and the processing worker.
//! All operations use relaxed ordering; values are eventually consistent.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one telemetry session
///
/// Safe to update from any thread: posts arrive from producers while the
/// worker records processing outcomes.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    /// Events accepted onto the ingress queue
    enqueued: AtomicU64,

    /// Events rejected because the queue was full or closed
    ingress_dropped: AtomicU64,

    /// Events that went through the action chain
    processed: AtomicU64,

    /// Processed events marked dropped (still seen by developer channels)
    pipeline_dropped: AtomicU64,

    /// Events the processor refused with an error
    failed: AtomicU64,
}

impl SessionMetrics {
    /// Create new metrics instance with all counters at zero
    #[inline]
    pub const fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            ingress_dropped: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            pipeline_dropped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_ingress_dropped(&self) {
        self.ingress_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one pass through the processor
    #[inline]
    pub fn record_processed(&self, dropped: bool) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if dropped {
            self.pipeline_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a point-in-time snapshot of all metrics
    pub fn snapshot(&self) -> SessionMetricsSnapshot {
        SessionMetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            ingress_dropped: self.ingress_dropped.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            pipeline_dropped: self.pipeline_dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of session metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionMetricsSnapshot {
    pub enqueued: u64,
    pub ingress_dropped: u64,
    pub processed: u64,
    pub pipeline_dropped: u64,
    pub failed: u64,
}

impl SessionMetricsSnapshot {
    /// Events accepted but not yet processed or failed
    pub fn pending(&self) -> u64 {
        self.enqueued
            .saturating_sub(self.processed)
            .saturating_sub(self.failed)
    }
}
