//! Pipeline error types
//!
//! Only caller contract violations surface here. Malformed manifests,
//! throttling and channel failures are absorbed inside the pipeline.

use thiserror::Error;

use tally_routing::RoutingError;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An event was processed before any manifest was installed
    #[error("no manifest installed")]
    NoManifest,

    /// The processor or session was already disposed
    #[error("processor is disposed")]
    Disposed,

    /// `process_event` was entered while another call was in flight
    #[error("process_event re-entered while an event is in flight")]
    Reentrant,

    /// Channel registration failed
    #[error(transparent)]
    Routing(#[from] RoutingError),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert!(PipelineError::NoManifest.to_string().contains("no manifest"));
        assert!(PipelineError::Disposed.to_string().contains("disposed"));
        assert!(PipelineError::Reentrant.to_string().contains("re-entered"));

        let err = PipelineError::from(RoutingError::duplicate_channel("stdout"));
        assert!(err.to_string().contains("stdout"));
    }
}
