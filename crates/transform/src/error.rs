//! Action error types
//!
//! Errors raised while building or configuring actions. Executing an action
//! never fails: problems with individual events are recorded on the event.

use thiserror::Error;

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

/// Errors that can occur while creating actions
#[derive(Debug, Error)]
pub enum ActionError {
    /// Action type tag not present in the registry
    #[error("unknown action type '{type_name}', available: [{available}]")]
    UnknownType { type_name: String, available: String },

    /// Action options missing or malformed
    #[error("invalid configuration for '{action}': {message}")]
    Config { action: String, message: String },

    /// Complex property could not be serialized
    #[error("serialization failed: {0}")]
    Serialize(String),
}

impl ActionError {
    /// Create a config error
    pub fn config(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialize(msg: impl Into<String>) -> Self {
        Self::Serialize(msg.into())
    }
}

/// Result type for action construction
pub type ActionResult<T> = Result<T, ActionError>;
