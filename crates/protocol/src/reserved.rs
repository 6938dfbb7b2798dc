//! Reserved property namespace
//!
//! Names under [`RESERVED_PREFIX`] are written by the pipeline only.

/// Prefix of every pipeline-owned property
pub const RESERVED_PREFIX: &str = "Reserved.";

/// Prefix of the unhashed companion of a PII property
pub const RAW_PII_PREFIX: &str = "Reserved.RawPii.";

/// Session the event was processed in
pub const SESSION_ID: &str = "Reserved.SessionId";

/// Event severity
pub const SEVERITY: &str = "Reserved.Severity";

/// Correlation identifier
pub const CORRELATION_ID: &str = "Reserved.CorrelationId";

/// Correlation kind (operation, fault, asset, ...)
pub const CORRELATION_TYPE: &str = "Reserved.CorrelationType";

/// Event schema version
pub const SCHEMA_VERSION: &str = "Reserved.SchemaVersion";

/// Per-session processing sequence number
pub const SEQUENCE: &str = "Reserved.Sequence";

/// Transports that actually carried the event
pub const CHANNEL_USED: &str = "Reserved.ChannelUsed";

/// Property names removed for violating naming restrictions
pub const INVALID_PROPERTY_NAMES: &str = "Reserved.InvalidPropertyNames";

/// Property names whose values were truncated in place
pub const TRUNCATED_PROPERTIES: &str = "Reserved.TruncatedProperties";

/// Complex properties dropped because serialization failed
pub const COMPLEX_PROPERTY_ERRORS: &str = "Reserved.ComplexPropertyErrors";

/// Complex properties whose serialized form was truncated
pub const TRUNCATED_COMPLEX_PROPERTIES: &str = "Reserved.TruncatedComplexProperties";

/// Whether a property name belongs to the reserved namespace
#[inline]
pub fn is_reserved(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

/// Name of the raw companion property for a PII property
pub fn raw_pii_name(name: &str) -> String {
    format!("{RAW_PII_PREFIX}{name}")
}
