//! Throttle Action - Windowed event volume limit
//!
//! Caps the number of events per window. Threshold and window length come
//! from the active manifest and are re-read whenever a window starts.
//!
//! # Windows
//!
//! The window is reset lazily: the first event whose post time falls after
//! `window start + reset window` starts a new window before it is counted.
//! No timer runs, so after a long idle period the first burst always lands
//! in a fresh window.
//!
//! # Exempt events
//!
//! Events forced through by a manifest `throttle` directive, listed as
//! passthrough, or emitted by the pipeline itself are never throttled. They
//! are counted separately and reported as noisy once that count passes the
//! threshold.
//!
//! # Diagnostics
//!
//! When a window closes with drops or noisy events, or when a manifest is
//! replaced, a `tally/diagnostics/throttling` event is posted with:
//!
//! | Property | Description |
//! |----------|-------------|
//! | `TotalDropped` | Events dropped since the last summary |
//! | `DroppedEvents` | `name:count` pairs, comma separated |
//! | `NoisyEvents` | Exempt event names that passed the threshold |
//! | `Threshold` | Threshold of the closing window |
//! | `WindowSeconds` | Length of the closing window |
//! | `ManifestVersion` | Replaced manifest (manifest swaps only) |

mod config;

pub use config::ThrottleConfig;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use tally_protocol::{Event, PropertyValue};
use tracing::debug;

use crate::{Action, ActionContext, Session, ThrottleSettings, ThrottlingDirective, is_diagnostic_event};

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

pub const THROTTLE_PRIORITY: i32 = 300;

/// Name of the summary event
pub const THROTTLING_DIAGNOSTICS_EVENT: &str = "tally/diagnostics/throttling";

/// Window state, guarded by the action's mutex
#[derive(Debug, Default)]
struct Window {
    start: Option<DateTime<Utc>>,
    settings: ThrottleSettings,
    count: u64,
    exempt_count: u64,
    summary: Summary,
}

/// Activity since the last posted summary
#[derive(Debug, Default)]
struct Summary {
    total_dropped: u64,
    dropped: BTreeMap<String, u64>,
    noisy: BTreeSet<String>,
}

impl Summary {
    fn is_empty(&self) -> bool {
        self.total_dropped == 0 && self.noisy.is_empty()
    }

    fn record_drop(&mut self, name: &str) {
        self.total_dropped += 1;
        *self.dropped.entry(name.to_string()).or_default() += 1;
    }

    fn into_event(self, settings: ThrottleSettings, manifest_version: Option<&str>) -> Event {
        let mut event = Event::new(THROTTLING_DIAGNOSTICS_EVENT);
        let dropped = self
            .dropped
            .iter()
            .map(|(name, count)| format!("{name}:{count}"))
            .collect::<Vec<_>>()
            .join(",");
        let noisy = self.noisy.into_iter().collect::<Vec<_>>().join(",");

        let properties = event.properties_mut();
        properties.insert("TotalDropped".into(), to_int(self.total_dropped));
        properties.insert("DroppedEvents".into(), dropped.into());
        properties.insert("NoisyEvents".into(), noisy.into());
        properties.insert("Threshold".into(), to_int(settings.threshold));
        properties.insert(
            "WindowSeconds".into(),
            to_int(settings.reset_window.as_secs()),
        );
        if let Some(version) = manifest_version {
            properties.insert("ManifestVersion".into(), version.into());
        }
        event
    }
}

fn to_int(value: u64) -> PropertyValue {
    PropertyValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
}

/// Throttle action
///
/// Custom action, one instance per session.
#[derive(Debug)]
pub struct ThrottleAction {
    config: ThrottleConfig,
    window: Mutex<Window>,
}

impl ThrottleAction {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            window: Mutex::new(Window::default()),
        }
    }

    /// Events dropped since the last summary
    pub fn pending_dropped(&self) -> u64 {
        self.window.lock().summary.total_dropped
    }

    fn is_exempt(&self, directive: ThrottlingDirective, name: &str) -> bool {
        directive == ThrottlingDirective::ForcePass
            || self.config.is_passthrough(name)
            || is_diagnostic_event(name)
    }
}

impl Default for ThrottleAction {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}

impl Action for ThrottleAction {
    fn name(&self) -> &'static str {
        "throttle"
    }

    fn priority(&self) -> i32 {
        THROTTLE_PRIORITY
    }

    fn execute(&self, ctx: &mut ActionContext<'_>) -> bool {
        let directive = ctx.directive();
        let posted_at = ctx.event().post_timestamp();
        let mut window = self.window.lock();

        if directive == ThrottlingDirective::ForceThrottle {
            window.summary.record_drop(ctx.event().name());
            ctx.counters().record_throttled();
            return false;
        }

        if self.is_exempt(directive, ctx.event().name()) {
            window.exempt_count += 1;
            // No window yet: the active manifest's threshold applies
            let threshold = match window.start {
                Some(_) => window.settings.threshold,
                None => ctx.throttle_settings().threshold,
            };
            if window.exempt_count > threshold {
                window.summary.noisy.insert(ctx.event().name().to_string());
            }
            return true;
        }

        let current_start = window.start;
        match current_start {
            None => {
                window.start = Some(posted_at);
                window.settings = ctx.throttle_settings();
            }
            Some(start) if posted_at > window_end(start, window.settings) => {
                let closing = window.settings;
                let summary = std::mem::take(&mut window.summary);
                if !summary.is_empty() {
                    ctx.session().post_event(summary.into_event(closing, None));
                }
                window.start = Some(posted_at);
                window.settings = ctx.throttle_settings();
                window.count = 0;
                window.exempt_count = 0;
            }
            Some(_) => {}
        }

        window.count += 1;
        if window.count <= window.settings.threshold {
            return true;
        }

        if window.count == window.settings.threshold + 1 {
            debug!(
                event = %ctx.event().name(),
                threshold = window.settings.threshold,
                "throttle threshold reached"
            );
        }
        window.summary.record_drop(ctx.event().name());
        ctx.counters().record_throttled();
        false
    }

    fn post_diagnostics(&self, session: &dyn Session, manifest_version: &str) {
        let mut window = self.window.lock();
        let summary = std::mem::take(&mut window.summary);
        if !summary.is_empty() {
            session.post_event(summary.into_event(window.settings, Some(manifest_version)));
        }
    }
}

/// Last instant of the window starting at `start`
fn window_end(start: DateTime<Utc>, settings: ThrottleSettings) -> DateTime<Utc> {
    TimeDelta::from_std(settings.reset_window)
        .ok()
        .and_then(|delta| start.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
