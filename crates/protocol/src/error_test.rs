//! Tests for protocol error types

use super::ProtocolError;

#[test]
fn test_reserved_name_display() {
    let err = ProtocolError::reserved_name("Reserved.Foo");
    assert!(err.to_string().contains("Reserved.Foo"));
    assert!(err.to_string().contains("reserved prefix"));
}

#[test]
fn test_empty_name_display() {
    assert!(ProtocolError::EmptyName.to_string().contains("empty"));
    assert!(ProtocolError::EmptyEventName.to_string().contains("event name"));
}
