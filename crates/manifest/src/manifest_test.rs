//! Tests for manifest parsing and validation

use serde_json::json;
use tally_transform::default_registry;
use tally_transform::test_utils::Harness;

use super::*;
use crate::SamplingInput;

fn parse(value: Value) -> Manifest {
    Manifest::from_value(value, &default_registry()).unwrap()
}

fn rule(name: &str, event: &str) -> Value {
    json!({"name": name, "when": {"event": event}, "do": [{"type": "drop"}]})
}

// =============================================================================
// Top level
// =============================================================================

#[test]
fn test_default_manifest() {
    let manifest = Manifest::default_manifest();
    assert_eq!(manifest.version(), DEFAULT_VERSION);
    assert_eq!(manifest.rule_count(), 0);
    assert_eq!(manifest.throttle_settings().threshold, 1000);
    assert_eq!(manifest.throttle_settings().reset_window, Duration::from_secs(60));
    assert!(manifest.report().is_clean());
}

#[test]
fn test_parse_throttle_settings() {
    let manifest = parse(json!({
        "version": "v1",
        "throttlingThreshold": 100,
        "throttlingTimerReset": 10
    }));
    assert_eq!(manifest.throttle_settings().threshold, 100);
    assert_eq!(manifest.throttle_settings().reset_window, Duration::from_secs(10));
}

#[test]
fn test_top_level_errors() {
    let registry = default_registry();
    assert!(matches!(
        Manifest::parse("[]", &registry),
        Err(ManifestError::Parse(_))
    ));
    assert!(matches!(
        Manifest::from_value(json!({"rules": []}), &registry),
        Err(ManifestError::Parse(_))
    ));
    assert!(matches!(
        Manifest::from_value(json!({"version": "  "}), &registry),
        Err(ManifestError::Invalid(_))
    ));
}

// =============================================================================
// Validation isolation
// =============================================================================

#[test]
fn test_one_invalid_rule_among_valid_ones() {
    let manifest = parse(json!({
        "version": "v1",
        "rules": [
            rule("r1", "a"),
            rule("r2", "b"),
            {"name": "broken", "do": [{"type": "drop"}]},
            rule("r3", "c"),
            rule("r4", "d"),
        ]
    }));

    assert_eq!(manifest.rule_count(), 4);
    assert_eq!(manifest.report().invalid_rules, 1);
    assert_eq!(manifest.report().invalid_rule_names, vec!["broken"]);
}

#[test]
fn test_invalid_actions_dropped_individually() {
    let manifest = parse(json!({
        "version": "v1",
        "rules": [{
            "name": "mixed",
            "when": {"event": "a"},
            "do": [
                {"type": "explode"},
                {"type": "excludeChannels", "channels": []},
                {"type": "drop"}
            ]
        }]
    }));

    assert_eq!(manifest.rule_count(), 1);
    assert_eq!(manifest.rules()[0].actions().len(), 1);
    assert_eq!(manifest.report().invalid_actions, 2);
    assert_eq!(
        manifest.report().invalid_action_names,
        vec!["mixed/explode", "mixed/excludeChannels"]
    );
}

#[test]
fn test_rule_without_surviving_actions_dropped() {
    let manifest = parse(json!({
        "version": "v1",
        "rules": [
            {"name": "empty", "when": {"event": "a"}, "do": []},
            {"name": "all-bad", "when": {"event": "a"}, "do": [{"type": "nope"}]}
        ]
    }));

    assert_eq!(manifest.rule_count(), 0);
    assert_eq!(manifest.report().invalid_rules, 2);
    assert_eq!(manifest.report().invalid_actions, 1);
}

#[test]
fn test_bad_predicates_and_names_dropped() {
    let manifest = parse(json!({
        "version": "v1",
        "rules": [
            {"name": "", "when": {"event": "a"}, "do": [{"type": "drop"}]},
            {"name": "bad-rate", "when": {"flightName": "f", "rate": 4}, "do": [{"type": "drop"}]},
            {"name": "bad-shape", "when": {"severity": 1}, "do": [{"type": "drop"}]},
            "not even an object",
            rule("ok", "a")
        ]
    }));

    assert_eq!(manifest.rule_count(), 1);
    assert_eq!(manifest.report().invalid_rules, 4);
    assert!(manifest.report().invalid_rule_names.contains(&"bad-rate".to_string()));
    assert!(manifest.report().invalid_rule_names.contains(&"bad-shape".to_string()));
}

#[test]
fn test_programmatic_manifest_is_validated() {
    let rules = vec![
        Rule::new("good", EventMatch::name("a"), vec![Arc::new(tally_transform::DropAction)]),
        Rule::new("no-actions", EventMatch::name("a"), Vec::new()),
    ];
    let manifest = Manifest::new("v1", rules, ThrottleSettings::default());

    assert_eq!(manifest.rule_count(), 1);
    assert_eq!(manifest.report().invalid_rules, 1);
}

// =============================================================================
// Matching
// =============================================================================

#[test]
fn test_actions_for_event_in_rule_order() {
    let manifest = parse(json!({
        "version": "v1",
        "rules": [
            {"name": "rename", "when": {"event": "app/*"}, "do": [{"type": "renameSuffix", "suffix": "/x"}]},
            {"name": "other", "when": {"event": "web/*"}, "do": [{"type": "drop"}]},
            {"name": "hide", "when": {"event": "app/start"}, "do": [
                {"type": "excludeChannels", "channels": ["a"]},
                {"type": "throttle", "mode": "forcePass"}
            ]}
        ]
    }));

    let names: Vec<_> = manifest
        .actions_for(&Event::new("App/Start"))
        .map(|a| a.name())
        .collect();
    assert_eq!(names, vec!["renameSuffix", "excludeChannels", "throttle"]);

    assert!(manifest.get_actions_for_event(&Event::new("none")).is_empty());
}

#[test]
fn test_sampling_rules_inactive_until_computed() {
    let manifest = parse(json!({
        "version": "v1",
        "rules": [{
            "name": "flight",
            "when": {"all": [
                {"event": "a"},
                {"flightName": "on", "rate": 1.0, "inputs": ["machineId"]}
            ]},
            "do": [{"type": "drop"}]
        }]
    }));

    let event = Event::new("a");
    assert_eq!(manifest.get_actions_for_event(&event).len(), 0);

    let active = manifest.compute_sampling(&SessionIdentity::new("m", "u", "s"));
    assert_eq!(active, 1);
    assert_eq!(manifest.get_actions_for_event(&event).len(), 1);
}

#[test]
fn test_sampling_without_inputs_never_active() {
    let manifest = parse(json!({
        "version": "v1",
        "rules": [{
            "name": "closed",
            "when": {"flightName": "f", "rate": 0.999},
            "do": [{"type": "drop"}]
        }]
    }));

    assert_eq!(manifest.compute_sampling(&SessionIdentity::new("m", "u", "s")), 0);
    assert!(manifest.get_actions_for_event(&Event::new("anything")).is_empty());
}

#[test]
fn test_sampling_id_uses_rule_name() {
    let manifest = parse(json!({
        "version": "v1",
        "rules": [{
            "name": "r",
            "when": {"flightName": "f", "rate": 0.5, "inputs": ["samplingId"]},
            "do": [{"type": "drop"}]
        }]
    }));
    manifest.compute_sampling(&SessionIdentity::default());

    let EventMatch::Sampling(sampling) = manifest.rules()[0].when() else {
        panic!("expected sampling predicate");
    };
    assert_eq!(sampling.inputs(), &[SamplingInput::SamplingId]);
    assert_eq!(sampling.is_active(), crate::is_sample_active(0.5, "r.f"));
}

#[test]
fn test_manifest_actions_run_against_context() {
    let manifest = parse(json!({
        "version": "v1",
        "rules": [{"name": "d", "when": {"event": "x"}, "do": [{"type": "drop"}]}]
    }));

    let mut harness = Harness::new();
    let mut event = Event::new("x");
    let actions = manifest.get_actions_for_event(&event);
    assert!(!harness.run(actions[0].as_ref(), &mut event));
}
