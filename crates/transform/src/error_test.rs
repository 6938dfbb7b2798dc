//! Tests for action error types

use super::*;

#[test]
fn test_error_creation() {
    let err = ActionError::config("route", "missing channel");
    assert!(matches!(err, ActionError::Config { .. }));

    let err = ActionError::serialize("cycle detected");
    assert!(matches!(err, ActionError::Serialize(_)));
}

#[test]
fn test_error_display() {
    let err = ActionError::config("markPii", "properties must not be empty");
    assert_eq!(
        err.to_string(),
        "invalid configuration for 'markPii': properties must not be empty"
    );

    let err = ActionError::UnknownType {
        type_name: "explode".into(),
        available: "drop, route".into(),
    };
    assert_eq!(
        err.to_string(),
        "unknown action type 'explode', available: [drop, route]"
    );

    let err = ActionError::serialize("bad value");
    assert_eq!(err.to_string(), "serialization failed: bad value");
}
