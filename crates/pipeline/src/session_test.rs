//! Tests for the telemetry session

use std::io::Write;
use std::str::FromStr;

use tally_manifest::{EventMatch, Rule};
use tally_protocol::PropertyValue;
use tally_routing::test_utils::RecordingChannel;
use tally_transform::{DropAction, ThrottleSettings};

use super::*;
use crate::MANIFEST_DIAGNOSTICS_EVENT;

fn options() -> SessionOptions {
    SessionOptions::new(SessionIdentity::new("machine-1", "user-1", "session-1"))
}

fn start(options: SessionOptions) -> TelemetrySession {
    TelemetrySession::start(options, Vec::new()).unwrap()
}

/// Wait until the worker has processed `count` events
async fn settle(session: &TelemetrySession, count: u64) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while session.metrics().processed < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "worker did not process {count} events");
}

// =============================================================================
// Options
// =============================================================================

#[test]
fn test_options_from_config() {
    let config = Config::from_str(
        r#"
[session]
machine_id = "m"
user_id = "u"
opted_in = false
queue_size = 8
"#,
    )
    .unwrap();
    let options = SessionOptions::from_config(&config.session);

    assert_eq!(options.identity.machine_id, "m");
    assert_eq!(options.identity.user_id, "u");
    assert!(Uuid::parse_str(&options.identity.session_id).is_ok());
    assert!(!options.opted_in);
    assert_eq!(options.queue_size, 8);
}

#[test]
fn test_session_ids_unique() {
    let config = SessionConfig::default();
    let a = SessionOptions::from_config(&config);
    let b = SessionOptions::from_config(&config);
    assert_ne!(a.identity.session_id, b.identity.session_id);
}

// =============================================================================
// Ingress
// =============================================================================

#[tokio::test]
async fn test_events_delivered_in_order() {
    let session = start(options());
    let channel = RecordingChannel::default_channel("analytics");
    session.add_channel(channel.clone()).unwrap();

    for name in ["a", "b", "c"] {
        session.post_event(Event::new(name));
    }

    let report = session
        .dispose_and_transmit(Duration::from_secs(1))
        .await
        .unwrap();

    assert!(report.completed);
    assert_eq!(channel.event_names(), vec!["a", "b", "c"]);
    assert_eq!(channel.dispose_count(), 1);

    let metrics = session.metrics();
    assert_eq!(metrics.enqueued, 3);
    assert_eq!(metrics.processed, 3);
    assert_eq!(metrics.pending(), 0);
}

#[tokio::test]
async fn test_post_property_goes_through_queue() {
    let session = start(options());
    let channel = RecordingChannel::default_channel("default");
    session.add_channel(channel.clone()).unwrap();

    session
        .post_property("app/theme", PropertyValue::from("dark"))
        .unwrap();
    assert!(session.post_property("Reserved.Theme", PropertyValue::Int(1)).is_err());

    session
        .dispose_and_transmit(Duration::from_secs(1))
        .await
        .unwrap();

    let events = channel.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].property("app/theme"), Some(&PropertyValue::from("dark")));
    assert_eq!(session.metrics().enqueued, 1);
}

#[tokio::test]
async fn test_full_queue_drops_without_blocking() {
    // The current-thread runtime does not run the worker until we yield
    let session = start(options().with_queue_size(2));

    for _ in 0..5 {
        session.post_event(Event::new("burst"));
    }

    let metrics = session.metrics();
    assert_eq!(metrics.enqueued, 2);
    assert_eq!(metrics.ingress_dropped, 3);

    session
        .dispose_and_transmit(Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(session.metrics().processed, 2);
}

#[tokio::test]
async fn test_posts_after_dispose_are_dropped() {
    let session = start(options());
    assert!(session.context().is_accepting());

    session
        .dispose_and_transmit(Duration::from_secs(1))
        .await
        .unwrap();
    assert!(!session.context().is_accepting());

    session.post_event(Event::new("late"));
    assert_eq!(session.metrics().ingress_dropped, 1);

    assert!(matches!(
        session.dispose_and_transmit(Duration::from_secs(1)).await,
        Err(PipelineError::Disposed)
    ));
    assert!(matches!(session.dispose(), Err(PipelineError::Disposed)));
}

#[tokio::test]
async fn test_sync_dispose_disposes_channels() {
    let session = start(options());
    let channel = RecordingChannel::default_channel("analytics");
    session.add_channel(channel.clone()).unwrap();

    assert_eq!(session.dispose().unwrap(), 1);
    assert_eq!(channel.dispose_count(), 1);
    assert!(session.processor().is_disposed());
}

// =============================================================================
// Manifests
// =============================================================================

#[tokio::test]
async fn test_default_manifest_installed_at_start() {
    let session = start(options());
    let manifest = session.current_manifest().unwrap();
    assert_eq!(manifest.version(), tally_manifest::DEFAULT_VERSION);
}

#[tokio::test]
async fn test_manifest_diagnostics_routed_through_queue() {
    let session = start(options());
    let developer = RecordingChannel::developer("debug");
    session.add_channel(developer.clone()).unwrap();

    session
        .install_manifest(Manifest::new(
            "noisy",
            vec![Rule::new(
                "mute",
                EventMatch::name("debug/*"),
                vec![Arc::new(DropAction)],
            )],
            ThrottleSettings::default(),
        ))
        .unwrap();

    session.post_event(Event::new("debug/a"));
    session.post_event(Event::new("debug/b"));
    // The first summary plus both events
    settle(&session, 3).await;

    session
        .install_manifest(Manifest::default_manifest())
        .unwrap();
    session
        .dispose_and_transmit(Duration::from_secs(1))
        .await
        .unwrap();

    let summaries: Vec<_> = developer
        .events()
        .into_iter()
        .filter(|e| e.name() == MANIFEST_DIAGNOSTICS_EVENT)
        .collect();
    // One for the built-in manifest, one for "noisy"
    assert_eq!(summaries.len(), 2);
    let noisy = &summaries[1];
    assert_eq!(
        noisy.property("ManifestVersion"),
        Some(&PropertyValue::from("noisy"))
    );
    assert_eq!(noisy.property("EventsDropped"), Some(&PropertyValue::Int(2)));
}

#[tokio::test]
async fn test_from_config_watches_manifest_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(br#"{"version": "from-file", "rules": []}"#)
        .unwrap();

    let toml = format!(
        "[manifest]\npath = {:?}\nreload_interval = \"1h\"",
        file.path().display().to_string()
    );
    let config = Config::from_str(&toml).unwrap();
    let session = TelemetrySession::from_config(&config).unwrap();

    let installed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if session
                .current_manifest()
                .is_some_and(|m| m.version() == "from-file")
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(installed.is_ok());

    assert_eq!(
        session.processor().custom_action_names(),
        vec!["throttle", "opt_out", "pii", "restriction", "complex_property"]
    );
    session.dispose().unwrap();
}

// =============================================================================
// Consent
// =============================================================================

#[tokio::test]
async fn test_opted_out_session_reaches_developer_only() {
    let config = Config::default();
    let session = TelemetrySession::start(
        options().with_opted_in(false),
        builtin_actions(&config),
    )
    .unwrap();
    let default = RecordingChannel::default_channel("analytics");
    let developer = RecordingChannel::developer("debug");
    session.add_channel(default.clone()).unwrap();
    session.add_channel(developer.clone()).unwrap();

    session.post_event(Event::new("app/start"));
    session
        .dispose_and_transmit(Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(default.delivery_count(), 0);
    assert_eq!(developer.event_names(), vec!["app/start"]);
    assert_eq!(session.metrics().pipeline_dropped, 1);
}

#[tokio::test]
async fn test_consent_change_applies_to_later_events() {
    let config = Config::default();
    let session = TelemetrySession::start(options(), builtin_actions(&config)).unwrap();
    let default = RecordingChannel::default_channel("analytics");
    session.add_channel(default.clone()).unwrap();

    session.post_event(Event::new("before"));
    settle(&session, 1).await;
    session.context().set_opted_in(false);
    session.post_event(Event::new("after"));

    session
        .dispose_and_transmit(Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(default.event_names(), vec!["before"]);
}
