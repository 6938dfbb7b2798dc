//! Router metrics
//!
//! Atomic counters for tracking routing outcomes.
//! All operations use relaxed ordering; values are eventually consistent.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for the router
#[derive(Debug, Default)]
pub struct RouterMetrics {
    /// Events handed to the router
    events_received: AtomicU64,

    /// Events delivered to at least one non-developer channel
    events_delivered: AtomicU64,

    /// Events that arrived with the dropped flag set
    events_dropped: AtomicU64,

    /// Individual channel deliveries (including developer channels)
    channel_posts: AtomicU64,

    /// Channels started lazily on first delivery
    channels_started: AtomicU64,
}

impl RouterMetrics {
    #[inline]
    pub const fn new() -> Self {
        Self {
            events_received: AtomicU64::new(0),
            events_delivered: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            channel_posts: AtomicU64::new(0),
            channels_started: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_received(&self, dropped: bool) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
        if dropped {
            self.events_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_delivered(&self) {
        self.events_delivered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_post(&self) {
        self.channel_posts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_started(&self) {
        self.channels_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> RouterMetricsSnapshot {
        RouterMetricsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            channel_posts: self.channel_posts.load(Ordering::Relaxed),
            channels_started: self.channels_started.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of router metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouterMetricsSnapshot {
    pub events_received: u64,
    pub events_delivered: u64,
    pub events_dropped: u64,
    pub channel_posts: u64,
    pub channels_started: u64,
}
