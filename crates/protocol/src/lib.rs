//! Tally Protocol - Core event types for the tally telemetry pipeline
//!
//! This crate provides the types that flow through the pipeline:
//! - `Event` - A named telemetry event with properties and bookkeeping
//! - `PropertyValue` - Scalar, PII-marked or complex property values
//! - `ComplexValue` - Structured values serialized late in the pipeline
//! - `reserved` - The pipeline-owned `Reserved.` property namespace
//!
//! # Reserved Properties
//!
//! Callers can never write properties whose name starts with
//! [`RESERVED_PREFIX`]. The pipeline is the only writer of that namespace
//! and uses it for severity, correlation, delivery auditing and
//! diagnostics about properties it had to rewrite.
//!
//! # Example
//!
//! ```
//! use tally_protocol::{Event, PropertyValue};
//!
//! let mut event = Event::new("VS/Editor/Open");
//! assert_eq!(event.name(), "vs/editor/open");
//!
//! event.set_property("file.kind", "rust").unwrap();
//! event.set_property("user.email", PropertyValue::pii("dev@example.com")).unwrap();
//! assert!(event.set_property("Reserved.Sneaky", 1).is_err());
//! ```

mod error;
mod event;
pub mod reserved;
mod value;

pub use error::ProtocolError;
pub use event::{Correlation, Event, PropertyMap, Severity};
pub use reserved::{RAW_PII_PREFIX, RESERVED_PREFIX, is_reserved};
pub use value::{ComplexValue, PropertyValue};

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Schema version stamped into `Reserved.SchemaVersion`
pub const SCHEMA_VERSION: &str = "1";
