//! Protocol error types
//!
//! Errors that can occur when building events.

use thiserror::Error;

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

/// Errors that can occur while building an event
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Caller tried to write into the reserved namespace
    #[error("property name '{0}' uses the reserved prefix")]
    ReservedName(String),

    /// Property name is empty
    #[error("property name must not be empty")]
    EmptyName,

    /// Event name is empty
    #[error("event name must not be empty")]
    EmptyEventName,
}

impl ProtocolError {
    /// Create a reserved name error
    #[inline]
    pub fn reserved_name(name: impl Into<String>) -> Self {
        Self::ReservedName(name.into())
    }
}
