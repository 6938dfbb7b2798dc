//! Tests for the event processor

use std::sync::{OnceLock, Weak};

use tally_manifest::{EventMatch, Rule, SamplingInput};
use tally_protocol::ComplexValue;
use tally_routing::test_utils::RecordingChannel;
use tally_routing::ChannelCapabilities;
use tally_transform::test_utils::TestSession;
use tally_transform::{
    DropAction, ExcludeChannelsAction, OptOutAction, ThrottleAction, ThrottleConfig,
    ThrottleSettings,
};

use super::*;

// =============================================================================
// Helpers
// =============================================================================

type Log = Arc<Mutex<Vec<&'static str>>>;

/// Action that records its name and continues or stops
struct Probe {
    name: &'static str,
    priority: i32,
    proceed: bool,
    log: Log,
}

impl Probe {
    fn new(name: &'static str, priority: i32, log: &Log) -> Arc<dyn Action> {
        Arc::new(Self {
            name,
            priority,
            proceed: true,
            log: Arc::clone(log),
        })
    }

    fn stopping(name: &'static str, priority: i32, log: &Log) -> Arc<dyn Action> {
        Arc::new(Self {
            name,
            priority,
            proceed: false,
            log: Arc::clone(log),
        })
    }
}

impl Action for Probe {
    fn name(&self) -> &'static str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn execute(&self, _ctx: &mut ActionContext<'_>) -> bool {
        self.log.lock().push(self.name);
        self.proceed
    }
}

fn manifest_with(rules: Vec<Rule>) -> Manifest {
    Manifest::new(
        "v1",
        rules,
        ThrottleSettings {
            threshold: 1000,
            reset_window: Duration::from_secs(60),
        },
    )
}

fn rule(name: &str, event: &str, actions: Vec<Arc<dyn Action>>) -> Rule {
    Rule::new(name, EventMatch::name(event), actions)
}

fn processor_with_default_manifest(session: &TestSession) -> Processor {
    let processor = Processor::default();
    processor
        .install_manifest(Manifest::default_manifest(), session)
        .unwrap();
    processor
}

// =============================================================================
// Contract errors
// =============================================================================

#[test]
fn test_process_without_manifest() {
    let processor = Processor::default();
    let session = TestSession::default();

    let result = processor.process_event(Event::new("a"), &session);
    assert!(matches!(result, Err(PipelineError::NoManifest)));
}

#[test]
fn test_disposed_processor_rejects_everything() {
    let session = TestSession::default();
    let processor = processor_with_default_manifest(&session);
    let channel = RecordingChannel::default_channel("a");
    processor.add_channel(channel.clone()).unwrap();

    assert_eq!(processor.dispose().unwrap(), 1);
    assert_eq!(channel.dispose_count(), 1);

    assert!(matches!(
        processor.process_event(Event::new("a"), &session),
        Err(PipelineError::Disposed)
    ));
    assert!(matches!(processor.dispose(), Err(PipelineError::Disposed)));
    assert!(matches!(
        processor.add_channel(RecordingChannel::default_channel("b")),
        Err(PipelineError::Disposed)
    ));
    assert!(matches!(
        processor.install_manifest(Manifest::default_manifest(), &session),
        Err(PipelineError::Disposed)
    ));
}

/// Calls back into the processor from inside the chain
struct Reenter {
    processor: OnceLock<Weak<Processor>>,
    result: Mutex<Option<Result<ProcessOutcome>>>,
}

impl Action for Reenter {
    fn name(&self) -> &'static str {
        "reenter"
    }

    fn priority(&self) -> i32 {
        0
    }

    fn execute(&self, ctx: &mut ActionContext<'_>) -> bool {
        if let Some(processor) = self.processor.get().and_then(Weak::upgrade) {
            let nested = processor.process_event(Event::new("nested"), ctx.session());
            *self.result.lock() = Some(nested);
        }
        true
    }
}

#[test]
fn test_reentrant_call_rejected() {
    let session = TestSession::default();
    let reenter = Arc::new(Reenter {
        processor: OnceLock::new(),
        result: Mutex::new(None),
    });
    let processor = Arc::new(
        Processor::default().with_custom_actions([reenter.clone() as Arc<dyn Action>]),
    );
    processor
        .install_manifest(Manifest::default_manifest(), &session)
        .unwrap();
    reenter.processor.set(Arc::downgrade(&processor)).unwrap();

    processor.process_event(Event::new("outer"), &session).unwrap();

    let nested = reenter.result.lock().take();
    assert!(matches!(nested, Some(Err(PipelineError::Reentrant))));

    // The guard is released once the outer call returns
    assert!(processor.process_event(Event::new("after"), &session).is_ok());
}

// =============================================================================
// Chain ordering
// =============================================================================

#[test]
fn test_custom_actions_run_in_priority_order() {
    let log: Log = Arc::default();
    let session = TestSession::default();
    let processor = processor_with_default_manifest(&session);
    for (name, priority) in [("p1000", 1000), ("p1", 1), ("p250", 250), ("p100", 100)] {
        processor.add_custom_action(Probe::new(name, priority, &log)).unwrap();
    }

    let outcome = processor.process_event(Event::new("a"), &session).unwrap();

    assert_eq!(outcome.executed, 4);
    assert_eq!(*log.lock(), vec!["p1", "p100", "p250", "p1000"]);
}

#[test]
fn test_equal_priorities_keep_manifest_before_custom() {
    let log: Log = Arc::default();
    let session = TestSession::default();
    let processor = Processor::default().with_custom_actions([Probe::new("custom", 100, &log)]);
    processor
        .install_manifest(
            manifest_with(vec![rule("r", "a", vec![Probe::new("manifest", 100, &log)])]),
            &session,
        )
        .unwrap();

    processor.process_event(Event::new("a"), &session).unwrap();
    assert_eq!(*log.lock(), vec!["manifest", "custom"]);

    log.lock().clear();
    processor.process_event(Event::new("b"), &session).unwrap();
    assert_eq!(*log.lock(), vec!["custom"]);
}

// =============================================================================
// Drop semantics
// =============================================================================

#[test]
fn test_stop_short_circuits_and_reaches_developer_only() {
    let log: Log = Arc::default();
    let session = TestSession::default();
    let processor = Processor::default().with_custom_actions([
        Probe::stopping("stop", 10, &log),
        Probe::new("later", 20, &log),
    ]);
    processor
        .install_manifest(Manifest::default_manifest(), &session)
        .unwrap();

    let default = RecordingChannel::default_channel("analytics");
    let developer = RecordingChannel::developer("debug");
    processor.add_channel(default.clone()).unwrap();
    processor.add_channel(developer.clone()).unwrap();

    let outcome = processor.process_event(Event::new("a"), &session).unwrap();

    assert_eq!(outcome.stopped_by, Some("stop"));
    assert!(outcome.dropped);
    assert_eq!(outcome.posted, 1);
    assert_eq!(*log.lock(), vec!["stop"]);
    assert_eq!(default.delivery_count(), 0);
    assert_eq!(developer.event_names(), vec!["a"]);
}

#[test]
fn test_manifest_drop_counted_on_manifest() {
    let session = TestSession::default();
    let processor = Processor::default();
    processor
        .install_manifest(
            manifest_with(vec![rule("noise", "debug/*", vec![Arc::new(DropAction)])]),
            &session,
        )
        .unwrap();

    let channel = RecordingChannel::default_channel("analytics");
    processor.add_channel(channel.clone()).unwrap();

    processor.process_event(Event::new("debug/one"), &session).unwrap();
    processor.process_event(Event::new("debug/two"), &session).unwrap();
    processor.process_event(Event::new("app/start"), &session).unwrap();

    assert_eq!(channel.event_names(), vec!["app/start"]);
    let manifest = processor.current_manifest().unwrap();
    assert_eq!(manifest.counters().snapshot().events_dropped, 2);
}

#[test]
fn test_opted_out_event_reaches_developer_with_properties() {
    let session = TestSession::default();
    session.set_opted_in(false);
    let processor = Processor::default().with_custom_actions([Arc::new(OptOutAction::new()) as Arc<dyn Action>]);
    processor
        .install_manifest(Manifest::default_manifest(), &session)
        .unwrap();

    let default = RecordingChannel::default_channel("analytics");
    let developer = RecordingChannel::developer("debug");
    processor.add_channel(default.clone()).unwrap();
    processor.add_channel(developer.clone()).unwrap();

    let mut event = Event::new("app/start");
    event.set_property("mode", "safe").unwrap();
    let outcome = processor.process_event(event, &session).unwrap();

    assert!(outcome.dropped);
    assert_eq!(outcome.stopped_by, None);
    assert_eq!(default.delivery_count(), 0);
    assert_eq!(developer.delivery_count(), 1);
}

#[test]
fn test_opted_out_excluded_properties_sanitized_for_developer() {
    let session = TestSession::default();
    session.set_opted_in(false);
    let config = tally_config::Config::default();
    let processor = Processor::default().with_custom_actions(crate::builtin_actions(&config));
    processor
        .install_manifest(Manifest::default_manifest(), &session)
        .unwrap();

    let default = RecordingChannel::default_channel("analytics");
    let developer = RecordingChannel::developer("debug");
    processor.add_channel(default.clone()).unwrap();
    processor.add_channel(developer.clone()).unwrap();

    let mut event = Event::new("app/signin");
    event
        .set_property("user.email", PropertyValue::pii("alice@example.com"))
        .unwrap();
    event
        .set_property(
            "details",
            ComplexValue::from_json(serde_json::json!({"tabs": 3})),
        )
        .unwrap();
    event.set_property("build", "1.2.3").unwrap();
    event.mark_property_opt_out_friendly("build");
    processor.process_event(event, &session).unwrap();

    let visible = &default.events()[0];
    assert!(visible.property("user.email").is_none());
    assert_eq!(visible.property("build"), Some(&PropertyValue::from("1.2.3")));

    let full = &developer.events()[0];
    let email = full.property("user.email").and_then(PropertyValue::as_str).unwrap();
    assert!(email.starts_with(tally_transform::pii::HASH_PREFIX));
    assert_ne!(email, "alice@example.com");
    assert_eq!(
        full.property("details"),
        Some(&PropertyValue::from(r#"{"tabs":3}"#))
    );
    assert!(full.properties().values().all(|v| v.is_scalar()));
}

// =============================================================================
// Routing
// =============================================================================

#[test]
fn test_channel_exclusion_scenario() {
    let session = TestSession::default();
    let processor = Processor::default();
    processor
        .install_manifest(
            manifest_with(vec![rule(
                "hide",
                "app/*",
                vec![Arc::new(ExcludeChannelsAction::new(vec!["analytics".into()]))],
            )]),
            &session,
        )
        .unwrap();

    let analytics = RecordingChannel::default_channel("analytics");
    let crash = RecordingChannel::default_channel("crash");
    let developer = RecordingChannel::developer("debug");
    processor.add_channel(analytics.clone()).unwrap();
    processor.add_channel(crash.clone()).unwrap();
    processor.add_channel(developer.clone()).unwrap();

    let outcome = processor.process_event(Event::new("app/start"), &session).unwrap();

    assert!(!outcome.dropped);
    assert_eq!(analytics.delivery_count(), 0);
    assert_eq!(crash.delivery_count(), 1);
    assert_eq!(developer.delivery_count(), 1);
    assert_eq!(
        crash.events()[0].property(reserved::CHANNEL_USED),
        Some(&PropertyValue::from("crash"))
    );

    // Exclusion lasts for one event only
    processor.process_event(Event::new("web/load"), &session).unwrap();
    assert_eq!(analytics.delivery_count(), 1);
}

#[test]
fn test_bookkeeping_stamped() {
    let session = TestSession::default();
    let processor = processor_with_default_manifest(&session);
    let channel = RecordingChannel::default_channel("analytics");
    processor.add_channel(channel.clone()).unwrap();

    processor.process_event(Event::new("a"), &session).unwrap();
    processor.process_event(Event::new("b"), &session).unwrap();

    let events = channel.events();
    assert_eq!(
        events[0].property(reserved::SESSION_ID),
        Some(&PropertyValue::from("session-1"))
    );
    assert_eq!(events[0].property(reserved::SEQUENCE), Some(&PropertyValue::Int(1)));
    assert_eq!(events[1].property(reserved::SEQUENCE), Some(&PropertyValue::Int(2)));
    assert!(events[0].property(reserved::SEVERITY).is_some());
    assert_eq!(channel.started_session().as_deref(), Some("session-1"));
}

#[test]
fn test_complex_property_serialized_through_builtins() {
    let session = TestSession::default();
    let config = tally_config::Config::default();
    let processor = Processor::default().with_custom_actions(crate::builtin_actions(&config));
    processor
        .install_manifest(Manifest::default_manifest(), &session)
        .unwrap();
    let channel = RecordingChannel::new("analytics", ChannelCapabilities::DEFAULT);
    let channel = Arc::new(channel);
    processor.add_channel(channel.clone()).unwrap();

    let mut event = Event::new("app/open");
    event
        .set_property(
            "details",
            ComplexValue::from_json(serde_json::json!({"tabs": 3})),
        )
        .unwrap();
    processor.process_event(event, &session).unwrap();

    let delivered = &channel.events()[0];
    assert_eq!(
        delivered.property("details"),
        Some(&PropertyValue::from(r#"{"tabs":3}"#))
    );
}

// =============================================================================
// Manifest install
// =============================================================================

#[test]
fn test_install_posts_previous_manifest_diagnostics() {
    let session = TestSession::default();
    let processor = Processor::default();
    processor
        .install_manifest(
            manifest_with(vec![rule("noise", "debug/*", vec![Arc::new(DropAction)])]),
            &session,
        )
        .unwrap();
    assert!(session.posted_named(MANIFEST_DIAGNOSTICS_EVENT).is_empty());

    processor.process_event(Event::new("debug/x"), &session).unwrap();

    let next = Manifest::new("v2", Vec::new(), ThrottleSettings::default());
    processor.install_manifest(next, &session).unwrap();

    let posted = session.posted_named(MANIFEST_DIAGNOSTICS_EVENT);
    assert_eq!(posted.len(), 1);
    assert_eq!(
        posted[0].property("ManifestVersion"),
        Some(&PropertyValue::from("v1"))
    );
    assert_eq!(posted[0].property("EventsDropped"), Some(&PropertyValue::Int(1)));
    assert_eq!(posted[0].property("InvalidRules"), Some(&PropertyValue::Int(0)));
    assert_eq!(processor.current_manifest().unwrap().version(), "v2");
}

#[test]
fn test_install_collects_custom_action_diagnostics() {
    let session = TestSession::default();
    let throttle = Arc::new(ThrottleAction::new(ThrottleConfig::new()));
    let processor = Processor::default().with_custom_actions([throttle.clone() as Arc<dyn Action>]);
    processor
        .install_manifest(
            Manifest::new(
                "tight",
                Vec::new(),
                ThrottleSettings {
                    threshold: 1,
                    reset_window: Duration::from_secs(60),
                },
            ),
            &session,
        )
        .unwrap();

    for _ in 0..3 {
        processor.process_event(Event::new("burst"), &session).unwrap();
    }
    assert_eq!(throttle.pending_dropped(), 2);

    processor
        .install_manifest(Manifest::default_manifest(), &session)
        .unwrap();

    let summaries = session.posted_named("tally/diagnostics/throttling");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].property("TotalDropped"), Some(&PropertyValue::Int(2)));
    assert_eq!(
        summaries[0].property("ManifestVersion"),
        Some(&PropertyValue::from("tight"))
    );
    assert_eq!(throttle.pending_dropped(), 0);
}

#[test]
fn test_install_computes_sampling() {
    let session = TestSession::default();
    let processor = Processor::default();
    let when = EventMatch::All(vec![
        EventMatch::name("a"),
        EventMatch::sampling("everyone", 1.0, vec![SamplingInput::MachineId]),
    ]);
    processor
        .install_manifest(
            manifest_with(vec![Rule::new("flight", when, vec![Arc::new(DropAction)])]),
            &session,
        )
        .unwrap();

    let outcome = processor.process_event(Event::new("a"), &session).unwrap();
    assert_eq!(outcome.stopped_by, Some("drop"));
}

// =============================================================================
// Drain
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_dispose_and_transmit_flushes_channels() {
    let session = TestSession::default();
    let processor = processor_with_default_manifest(&session);
    let slow = Arc::new(
        RecordingChannel::new("upload", ChannelCapabilities::DEFAULT)
            .with_flush_delay(Duration::from_millis(100)),
    );
    let plain = RecordingChannel::default_channel("log");
    processor.add_channel(slow.clone()).unwrap();
    processor.add_channel(plain.clone()).unwrap();

    let report = processor
        .dispose_and_transmit(Duration::from_secs(1), CancellationToken::new())
        .await
        .unwrap();

    assert!(report.completed);
    assert_eq!(report.flushed, 1);
    assert_eq!(report.disposed, 2);
    assert!(slow.was_flushed());
    assert_eq!(plain.dispose_count(), 1);
    assert!(processor.is_disposed());
}
