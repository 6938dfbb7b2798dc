//! Per-event processing context
//!
//! [`ProcessingState`] is scratch state owned by the processor and reused
//! for every event. [`ActionContext`] is the short-lived view handed to
//! actions: the event, the router, the session and the state, plus the
//! settings and counters of the manifest that matched the event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tally_protocol::{Event, PropertyMap};
use tally_routing::Router;

use crate::Session;

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;

/// Throttling hint set by a manifest directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThrottlingDirective {
    #[default]
    Default,
    /// Drop the event regardless of the bucket
    ForceThrottle,
    /// Never throttle the event
    ForcePass,
}

/// Throttle limits of the active manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleSettings {
    /// Events allowed per window
    pub threshold: u64,
    /// Bucket length
    pub reset_window: Duration,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            threshold: 1000,
            reset_window: Duration::from_secs(60),
        }
    }
}

/// Counters accumulated for one manifest version
///
/// Owned by the manifest, so a new manifest starts from zero and the
/// previous manifest's values stay readable for its diagnostics event.
#[derive(Debug, Default)]
pub struct ManifestCounters {
    events_dropped: AtomicU64,
    events_throttled: AtomicU64,
    pii_hashed: AtomicU64,
}

impl ManifestCounters {
    pub const fn new() -> Self {
        Self {
            events_dropped: AtomicU64::new(0),
            events_throttled: AtomicU64::new(0),
            pii_hashed: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_throttled(&self) {
        self.events_throttled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_pii_hashed(&self, count: u64) {
        self.pii_hashed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ManifestCountersSnapshot {
        ManifestCountersSnapshot {
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            events_throttled: self.events_throttled.load(Ordering::Relaxed),
            pii_hashed: self.pii_hashed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ManifestCounters`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManifestCountersSnapshot {
    pub events_dropped: u64,
    pub events_throttled: u64,
    pub pii_hashed: u64,
}

/// Scratch state for one event, reused across events
#[derive(Debug, Default)]
pub struct ProcessingState {
    dropped: bool,
    excluded: PropertyMap,
    directive: ThrottlingDirective,
}

impl ProcessingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear everything left over from the previous event
    pub fn reset(&mut self) {
        self.dropped = false;
        self.excluded.clear();
        self.directive = ThrottlingDirective::Default;
    }

    #[inline]
    pub fn is_dropped(&self) -> bool {
        self.dropped
    }

    #[inline]
    pub fn excluded(&self) -> &PropertyMap {
        &self.excluded
    }

    #[inline]
    pub fn directive(&self) -> ThrottlingDirective {
        self.directive
    }
}

/// View of one event's processing handed to each action
pub struct ActionContext<'a> {
    event: &'a mut Event,
    router: &'a mut Router,
    session: &'a dyn Session,
    state: &'a mut ProcessingState,
    throttle: ThrottleSettings,
    counters: &'a ManifestCounters,
}

impl<'a> ActionContext<'a> {
    pub fn new(
        event: &'a mut Event,
        router: &'a mut Router,
        session: &'a dyn Session,
        state: &'a mut ProcessingState,
        throttle: ThrottleSettings,
        counters: &'a ManifestCounters,
    ) -> Self {
        Self {
            event,
            router,
            session,
            state,
            throttle,
            counters,
        }
    }

    #[inline]
    pub fn event(&self) -> &Event {
        &*self.event
    }

    #[inline]
    pub fn event_mut(&mut self) -> &mut Event {
        &mut *self.event
    }

    #[inline]
    pub fn router(&mut self) -> &mut Router {
        &mut *self.router
    }

    #[inline]
    pub fn session(&self) -> &dyn Session {
        self.session
    }

    #[inline]
    pub fn throttle_settings(&self) -> ThrottleSettings {
        self.throttle
    }

    #[inline]
    pub fn counters(&self) -> &ManifestCounters {
        self.counters
    }

    /// Mark the event dropped without stopping the chain
    ///
    /// Dropped events still reach developer channels.
    pub fn mark_dropped(&mut self) {
        self.state.dropped = true;
    }

    #[inline]
    pub fn is_dropped(&self) -> bool {
        self.state.dropped
    }

    /// Move a property out of the event into the excluded side-table
    ///
    /// Developer channels see excluded properties restored.
    pub fn exclude_property(&mut self, name: &str) -> bool {
        match self.event.remove_property(name) {
            Some(value) => {
                self.state.excluded.insert(name.to_string(), value);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn excluded(&self) -> &PropertyMap {
        &self.state.excluded
    }

    /// Excluded properties, for actions that must rewrite them before they
    /// are restored on developer channels
    #[inline]
    pub fn excluded_mut(&mut self) -> &mut PropertyMap {
        &mut self.state.excluded
    }

    #[inline]
    pub fn directive(&self) -> ThrottlingDirective {
        self.state.directive
    }

    pub fn set_directive(&mut self, directive: ThrottlingDirective) {
        self.state.directive = directive;
    }
}
