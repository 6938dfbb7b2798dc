//! Routing error types

use thiserror::Error;

/// Result type for routing operations
pub type Result<T> = std::result::Result<T, RoutingError>;

/// Errors that can occur while managing channels
#[derive(Debug, Error)]
pub enum RoutingError {
    /// A channel with this id is already registered
    #[error("channel '{id}' is already registered")]
    DuplicateChannel {
        /// Id of the conflicting channel
        id: String,
    },

    /// Channel id is empty
    #[error("channel id must not be empty")]
    EmptyChannelId,

    /// Too many channels for the route table
    #[error("route table is full ({max} channels)")]
    TableFull {
        /// Maximum supported channel count
        max: usize,
    },
}

impl RoutingError {
    /// Create a DuplicateChannel error
    #[inline]
    pub fn duplicate_channel(id: impl Into<String>) -> Self {
        Self::DuplicateChannel { id: id.into() }
    }
}
