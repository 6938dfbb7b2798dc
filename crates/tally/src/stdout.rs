//! Stdout channel - Human-readable event output
//!
//! Prints each delivered event on one line. Used by `tally replay` to show
//! what every channel would receive.
//!
//! # Example Output
//!
//! ```text
//! 07:34:59.161 default   app/editor/open {"file.kind":"rust","Reserved.Sequence":1}
//! 07:34:59.162 developer app/crash       {"Reserved.ChannelUsed":"developer"}
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use owo_colors::{OwoColorize, Style};
use serde_json::{Map, Value};
use tally_protocol::{Event, PropertyValue};
use tally_routing::{Channel, ChannelCapabilities, RouteArguments};

// =============================================================================
// Color Styles
// =============================================================================

struct Styles {
    timestamp: Style,
    channel: Style,
    name: Style,
    payload: Style,
}

impl Styles {
    fn new(enabled: bool) -> Self {
        if enabled {
            Self {
                timestamp: Style::new().dimmed(),
                channel: Style::new().cyan(),
                name: Style::new().bold(),
                payload: Style::new().dimmed(),
            }
        } else {
            Self {
                timestamp: Style::new(),
                channel: Style::new(),
                name: Style::new(),
                payload: Style::new(),
            }
        }
    }
}

// =============================================================================
// Channel
// =============================================================================

/// Channel writing one line per event to stdout
pub struct StdoutChannel {
    id: String,
    capabilities: ChannelCapabilities,
    color: bool,
    started: AtomicBool,
    printed: AtomicU64,
}

impl StdoutChannel {
    pub fn new(id: impl Into<String>, capabilities: ChannelCapabilities) -> Self {
        Self {
            id: id.into(),
            capabilities,
            color: true,
            started: AtomicBool::new(false),
            printed: AtomicU64::new(0),
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Events printed so far
    pub fn printed(&self) -> u64 {
        self.printed.load(Ordering::Relaxed)
    }

    fn format_line(&self, event: &Event, args: Option<&RouteArguments>) -> String {
        let styles = Styles::new(self.color);
        let timestamp = event.post_timestamp().format("%H:%M:%S%.3f").to_string();
        let channel = format!("{:<9}", self.id);
        let mut line = format!(
            "{} {} {} {}",
            timestamp.style(styles.timestamp),
            channel.style(styles.channel),
            event.name().style(styles.name),
            properties_json(event).style(styles.payload),
        );
        if let Some(args) = args
            && !args.is_empty()
        {
            let args = args
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(",");
            line.push_str(&format!(" [{}]", args.style(styles.payload)));
        }
        line
    }
}

impl Channel for StdoutChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> ChannelCapabilities {
        self.capabilities
    }

    fn start(&self, _session_id: &str) {
        self.started.store(true, Ordering::Relaxed);
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }

    fn post_event(&self, event: &Event, args: Option<&RouteArguments>) {
        let line = self.format_line(event, args);
        let mut out = std::io::stdout().lock();
        // Closed pipe: nothing left to show
        if writeln!(out, "{line}").is_ok() {
            self.printed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn can_flush(&self) -> bool {
        true
    }

    fn flush(&self) -> tally_routing::FlushFuture<'_> {
        let _ = std::io::stdout().lock().flush();
        Box::pin(std::future::ready(()))
    }
}

/// Properties as a compact JSON object
///
/// PII should be hashed before any channel sees it; a leftover marker prints
/// as `<pii>` rather than the raw value.
fn properties_json(event: &Event) -> String {
    let mut map = Map::with_capacity(event.properties().len());
    for (name, value) in event.properties() {
        let value = match value {
            PropertyValue::String(s) => Value::String(s.clone()),
            PropertyValue::Int(i) => Value::from(*i),
            PropertyValue::Double(d) => Value::from(*d),
            PropertyValue::Bool(b) => Value::Bool(*b),
            PropertyValue::Pii(_) => Value::String("<pii>".to_string()),
            PropertyValue::Complex(c) => c.to_json_with(&mut |_| "<pii>".to_string()),
        };
        map.insert(name.clone(), value);
    }
    Value::Object(map).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event() -> Event {
        Event::new("App/Open")
            .with_property("kind", "rust")
            .unwrap()
            .with_property("count", 2)
            .unwrap()
            .with_post_timestamp(Utc.with_ymd_and_hms(2024, 5, 1, 7, 34, 59).unwrap())
    }

    #[test]
    fn test_plain_line_format() {
        let channel = StdoutChannel::new("default", ChannelCapabilities::DEFAULT).with_color(false);
        let line = channel.format_line(&event(), None);
        assert_eq!(
            line,
            r#"07:34:59.000 default   app/open {"count":2,"kind":"rust"}"#
        );
    }

    #[test]
    fn test_route_arguments_appended() {
        let channel = StdoutChannel::new("crash", ChannelCapabilities::NONE).with_color(false);
        let mut args = RouteArguments::new();
        args.insert("bucket".to_string(), "hot".to_string());
        let line = channel.format_line(&event(), Some(&args));
        assert!(line.ends_with(" [bucket=hot]"));
    }

    #[test]
    fn test_pii_never_printed_raw() {
        let event = Event::new("a/b")
            .with_property("user.email", PropertyValue::pii("dev@example.com"))
            .unwrap();
        let json = properties_json(&event);
        assert!(!json.contains("dev@example.com"));
        assert!(json.contains("<pii>"));
    }

    #[test]
    fn test_start_marks_started() {
        let channel = StdoutChannel::new("default", ChannelCapabilities::DEFAULT);
        assert!(!channel.is_started());
        channel.start("s1");
        assert!(channel.is_started());
        assert!(channel.can_flush());
    }
}
