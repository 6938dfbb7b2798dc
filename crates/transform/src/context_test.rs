//! Tests for the processing context

use tally_protocol::{Event, PropertyValue};

use super::*;
use crate::test_utils::Harness;

#[test]
fn test_state_reset_clears_everything() {
    let mut harness = Harness::new();
    let mut event = Event::new("x").with_property("secret", "s").unwrap();

    {
        let mut ctx = harness.context(&mut event);
        ctx.mark_dropped();
        ctx.set_directive(ThrottlingDirective::ForcePass);
        assert!(ctx.exclude_property("secret"));
    }
    assert!(harness.state.is_dropped());
    assert_eq!(harness.state.directive(), ThrottlingDirective::ForcePass);
    assert_eq!(harness.state.excluded().len(), 1);

    harness.state.reset();
    assert!(!harness.state.is_dropped());
    assert_eq!(harness.state.directive(), ThrottlingDirective::Default);
    assert!(harness.state.excluded().is_empty());
}

#[test]
fn test_exclude_property_moves_value() {
    let mut harness = Harness::new();
    let mut event = Event::new("x").with_property("a", 1).unwrap();

    let mut ctx = harness.context(&mut event);
    assert!(ctx.exclude_property("a"));
    assert!(!ctx.exclude_property("missing"));
    assert_eq!(ctx.excluded().get("a"), Some(&PropertyValue::Int(1)));
    assert!(ctx.event().property("a").is_none());
}

#[test]
fn test_manifest_counters() {
    let counters = ManifestCounters::new();
    counters.record_dropped();
    counters.record_throttled();
    counters.record_throttled();
    counters.record_pii_hashed(3);

    assert_eq!(
        counters.snapshot(),
        ManifestCountersSnapshot {
            events_dropped: 1,
            events_throttled: 2,
            pii_hashed: 3,
        }
    );
}

#[test]
fn test_default_throttle_settings() {
    let settings = ThrottleSettings::default();
    assert_eq!(settings.threshold, 1000);
    assert_eq!(settings.reset_window, Duration::from_secs(60));
}
