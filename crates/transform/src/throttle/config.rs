//! Throttle action configuration

use std::collections::HashSet;

/// Configuration for the throttle action
///
/// Threshold and window come from the active manifest, not from here.
#[derive(Debug, Clone, Default)]
pub struct ThrottleConfig {
    /// Event names never throttled (lower-case, exact match)
    pub passthrough_events: HashSet<String>,
}

impl ThrottleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event name that bypasses throttling
    pub fn with_passthrough(mut self, name: impl AsRef<str>) -> Self {
        self.passthrough_events.insert(name.as_ref().to_lowercase());
        self
    }

    pub fn is_passthrough(&self, name: &str) -> bool {
        self.passthrough_events.contains(name)
    }
}
