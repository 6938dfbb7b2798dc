//! Replay command - Run recorded events through a telemetry session
//!
//! # Usage
//!
//! ```bash
//! # Replay against the manifest named in the config file
//! tally replay --config tally.toml --events events.jsonl
//!
//! # Replay from stdin as an opted-out user, showing dropped events too
//! tally replay --events - --manifest manifest.json --opt-out --developer
//! ```
//!
//! # Input Format
//!
//! One JSON object per line. Blank lines and lines starting with `#` are
//! skipped.
//!
//! ```text
//! {"name": "app/open", "properties": {"kind": "rust"}, "pii": ["user"], "severity": "high"}
//! ```

use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use tally_config::Config;
use tally_manifest::{FileManifestSource, ManifestSource};
use tally_pipeline::{SessionOptions, TelemetrySession, builtin_actions};
use tally_protocol::{Event, PropertyValue, Severity};
use tally_routing::ChannelCapabilities;

use crate::stdout::StdoutChannel;

/// Extra ingress capacity beyond the replayed events, for diagnostics
const QUEUE_HEADROOM: usize = 64;

/// Replay command arguments
#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON-lines event file, or `-` for stdin
    #[arg(short, long)]
    pub events: String,

    /// Manifest file (defaults to `[manifest] path` from config)
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// Replay as a user who opted out of telemetry
    #[arg(long)]
    pub opt_out: bool,

    /// Allow PII to leave the pipeline (hashed)
    #[arg(long)]
    pub collect_pii: bool,

    /// Also print events as a developer channel sees them, dropped ones included
    #[arg(long)]
    pub developer: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// One line of replay input
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRecord {
    name: String,
    #[serde(default)]
    properties: Map<String, Value>,
    /// Properties whose string value is PII
    #[serde(default)]
    pii: Vec<String>,
    severity: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    opt_out_friendly: bool,
}

impl EventRecord {
    fn into_event(self) -> Result<Event> {
        let mut event = Event::try_new(&self.name)?;

        for (name, value) in self.properties {
            let value = match value {
                Value::String(s) if self.pii.contains(&name) => PropertyValue::pii(s),
                other => PropertyValue::from_json(other),
            };
            event
                .set_property(name.as_str(), value)
                .with_context(|| format!("property '{name}'"))?;
        }

        if let Some(severity) = &self.severity {
            let severity = Severity::parse(severity)
                .with_context(|| format!("unknown severity '{severity}'"))?;
            event.set_severity(severity);
        }
        if let Some(timestamp) = self.timestamp {
            event.set_post_timestamp(timestamp);
        }
        event.set_opt_out_friendly(self.opt_out_friendly);
        Ok(event)
    }
}

/// Run the replay command
pub async fn run(args: ReplayArgs, config_path: Option<&Path>) -> Result<()> {
    let config = match config_path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    let input = read_input(&args.events)?;
    let events = parse_events(&input);

    let mut options = SessionOptions::from_config(&config.session)
        .with_queue_size(config.session.queue_size.max(events.len() + QUEUE_HEADROOM));
    if args.opt_out {
        options = options.with_opted_in(false);
    }
    if args.collect_pii {
        options = options.with_collect_pii(true);
    }

    let session = TelemetrySession::start(options, builtin_actions(&config))?;

    let color = !args.no_color && std::io::stdout().is_terminal();
    session.add_channel(Arc::new(
        StdoutChannel::new("default", ChannelCapabilities::DEFAULT).with_color(color),
    ))?;
    if args.developer {
        session.add_channel(Arc::new(
            StdoutChannel::new("developer", ChannelCapabilities::DEVELOPER).with_color(color),
        ))?;
    }

    if let Some(path) = args.manifest.or(config.manifest.path.clone()) {
        let source = FileManifestSource::new(&path);
        let manifest = source
            .load()
            .with_context(|| format!("manifest {} did not load", path.display()))?;
        info!(
            version = manifest.version(),
            rules = manifest.rule_count(),
            "manifest installed"
        );
        session.install_manifest(manifest)?;
    }

    for event in events {
        session.post_event(event);
    }

    let drain = session.dispose_and_transmit(session.drain_timeout()).await?;
    let metrics = session.metrics();
    info!(
        enqueued = metrics.enqueued,
        processed = metrics.processed,
        dropped = metrics.pipeline_dropped + metrics.ingress_dropped,
        failed = metrics.failed,
        flushed = drain.flushed,
        "replay complete"
    );
    if !drain.completed {
        warn!("channels did not finish flushing before the drain deadline");
    }
    Ok(())
}

fn read_input(source: &str) -> Result<String> {
    if source == "-" {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("failed to read events from stdin")?;
        return Ok(input);
    }
    std::fs::read_to_string(source).with_context(|| format!("failed to read events from {source}"))
}

/// Parse every usable line, logging and skipping the rest
fn parse_events(input: &str) -> Vec<Event> {
    let mut events = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parsed = serde_json::from_str::<EventRecord>(line)
            .map_err(anyhow::Error::from)
            .and_then(EventRecord::into_event);
        match parsed {
            Ok(event) => events.push(event),
            Err(e) => warn!(line = index + 1, error = %e, "skipping event"),
        }
    }
    events
}
