//! Tests for the action registry

use serde_json::json;

use super::*;
use crate::DropAction;

struct AlwaysDrop;

impl ActionFactory for AlwaysDrop {
    fn create(&self, _config: &ActionConfig) -> ActionResult<Arc<dyn Action>> {
        Ok(Arc::new(DropAction))
    }

    fn name(&self) -> &'static str {
        "alwaysDrop"
    }
}

#[test]
fn test_empty_registry() {
    let registry = ActionRegistry::new();
    assert!(registry.is_empty());
    assert_eq!(registry.len(), 0);
    assert!(registry.available_types().is_empty());
}

#[test]
fn test_register_and_create() {
    let mut registry = ActionRegistry::new();
    assert!(registry.register(AlwaysDrop));
    assert!(registry.contains("alwaysDrop"));
    assert!(!registry.contains("drop"));

    let action = registry.create("alwaysDrop", &ActionConfig::new()).unwrap();
    assert_eq!(action.name(), "drop");
}

#[test]
fn test_duplicate_registration_rejected() {
    let mut registry = ActionRegistry::new();
    assert!(registry.register(AlwaysDrop));
    assert!(!registry.register(AlwaysDrop));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_create_unknown_type() {
    let registry = default_registry();
    let err = registry.create("explode", &ActionConfig::new()).err().unwrap();

    assert!(matches!(err, ActionError::UnknownType { .. }));
    assert!(err.to_string().contains("unknown action type 'explode'"));
    assert!(err.to_string().contains("excludeChannels"));
}

#[test]
fn test_default_registry_types() {
    let registry = default_registry();
    assert_eq!(
        registry.available_types(),
        vec!["drop", "excludeChannels", "markPii", "renameSuffix", "route", "throttle"]
    );
}

#[test]
fn test_create_from_json_requires_object_with_type() {
    let registry = default_registry();

    assert!(registry.create_from_json(&json!("drop")).is_err());
    assert!(registry.create_from_json(&json!({"mode": "forcePass"})).is_err());
    assert!(registry.create_from_json(&json!({"type": 7})).is_err());
    assert!(registry.create_from_json(&json!({"type": "drop"})).is_ok());
}

#[test]
fn test_create_runs_validation() {
    let registry = default_registry();
    let err = registry
        .create_from_json(&json!({"type": "excludeChannels", "channels": []}))
        .err()
        .unwrap();
    assert!(matches!(err, ActionError::Config { .. }));
}

#[test]
fn test_parse_options_reports_action_name() {
    #[derive(Debug, serde::Deserialize)]
    struct Options {
        #[allow(dead_code)]
        count: u32,
    }

    let mut config = ActionConfig::new();
    config.insert("count".into(), json!("many"));

    let err = parse_options::<Options>("counter", &config).unwrap_err();
    assert!(err.to_string().contains("'counter'"));
}
