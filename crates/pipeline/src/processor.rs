//! Event processor
//!
//! Runs every event through the manifest actions matching it plus the
//! session's custom actions, then hands the result to the router.
//!
//! # Concurrency
//!
//! One processor serves one session and processes strictly one event at a
//! time: the per-event [`ProcessingState`], the action chain and the route
//! table are reused across events. The surrounding scheduler (the session
//! worker) guarantees this; the processor enforces it with a non-reentrant
//! guard and returns [`PipelineError::Reentrant`] on overlap.
//!
//! The active manifest is an immutable snapshot behind an [`ArcSwapOption`].
//! Each event loads it once, so an install racing with processing never
//! mixes two manifest versions within one event.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use tally_manifest::Manifest;
use tally_protocol::{Event, PropertyValue, reserved};
use tally_routing::{Channel, DrainReport, Router, drain_and_dispose};
use tally_transform::{Action, ActionChain, ActionContext, ProcessingState, Session};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{PipelineError, Result};

#[cfg(test)]
#[path = "processor_test.rs"]
mod tests;

/// Name of the event describing a manifest as it is replaced
pub const MANIFEST_DIAGNOSTICS_EVENT: &str = "tally/diagnostics/manifest";

/// Result of processing one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Actions that ran
    pub executed: usize,
    /// Action that stopped the chain, if any
    pub stopped_by: Option<&'static str>,
    /// The event was dropped for non-developer channels
    pub dropped: bool,
    /// Channels the event was posted to
    pub posted: usize,
}

/// Scratch state reused by every event
#[derive(Default)]
struct Scratch {
    state: ProcessingState,
    chain: ActionChain,
}

/// Resets the in-flight flag when processing ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Orchestrates manifest actions, custom actions and routing
pub struct Processor {
    manifest: ArcSwapOption<Manifest>,
    install_lock: Mutex<()>,
    custom_actions: Mutex<Vec<Arc<dyn Action>>>,
    router: Mutex<Router>,
    scratch: Mutex<Scratch>,
    in_flight: AtomicBool,
    disposed: AtomicBool,
    sequence: AtomicU64,
}

impl Processor {
    /// Create a processor routing through `router`, with no manifest installed
    pub fn new(router: Router) -> Self {
        Self {
            manifest: ArcSwapOption::empty(),
            install_lock: Mutex::new(()),
            custom_actions: Mutex::new(Vec::new()),
            router: Mutex::new(router),
            scratch: Mutex::new(Scratch::default()),
            in_flight: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
        }
    }

    /// Register custom actions before the processor is shared
    pub fn with_custom_actions(self, actions: impl IntoIterator<Item = Arc<dyn Action>>) -> Self {
        self.custom_actions.lock().extend(actions);
        self
    }

    /// Process one event
    ///
    /// Stamps the session bookkeeping, runs the combined action chain in
    /// priority order until an action stops it, then routes the event in its
    /// current state. A stopped or opted-out event is still routed with
    /// `dropped` set, so developer channels see it.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Disposed`] after [`Processor::dispose`]
    /// - [`PipelineError::Reentrant`] while another call is in flight
    /// - [`PipelineError::NoManifest`] before the first install
    pub fn process_event(&self, mut event: Event, session: &dyn Session) -> Result<ProcessOutcome> {
        self.ensure_live()?;
        let _in_flight = self.enter()?;
        let manifest = self.manifest.load_full().ok_or(PipelineError::NoManifest)?;

        let session_id = session.identity().session_id.as_str();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        event.set_reserved(reserved::SESSION_ID, session_id);
        event.set_reserved(
            reserved::SEQUENCE,
            PropertyValue::Int(i64::try_from(sequence).unwrap_or(i64::MAX)),
        );
        event.stamp_bookkeeping();

        let mut scratch = self.scratch.lock();
        let Scratch { state, chain } = &mut *scratch;
        {
            let custom = self.custom_actions.lock();
            chain.rebuild(manifest.actions_for(&event), &custom);
        }

        let mut router = self.router.lock();
        state.reset();
        router.reset_for_event();

        let chain_outcome = {
            let mut ctx = ActionContext::new(
                &mut event,
                &mut router,
                session,
                state,
                manifest.throttle_settings(),
                manifest.counters(),
            );
            chain.execute(&mut ctx)
        };

        let dropped = chain_outcome.is_stopped() || state.is_dropped();
        let posted = router.route_event(&mut event, state.excluded(), session_id, dropped);
        chain.clear();

        debug!(
            event = %event.name(),
            sequence,
            executed = chain_outcome.executed,
            dropped,
            posted,
            "event processed"
        );

        Ok(ProcessOutcome {
            executed: chain_outcome.executed,
            stopped_by: chain_outcome.stopped_by,
            dropped,
            posted,
        })
    }

    /// Install a manifest, replacing the active one
    ///
    /// Computes every sampling decision for the session first. If a manifest
    /// was active, posts its diagnostics summary and asks every custom
    /// action for its own summary before the swap, so each summary only
    /// covers activity under the manifest it names.
    pub fn install_manifest(&self, manifest: Manifest, session: &dyn Session) -> Result<()> {
        self.ensure_live()?;
        let _guard = self.install_lock.lock();

        let sampled = manifest.compute_sampling(session.identity());

        if let Some(previous) = self.manifest.load_full() {
            session.post_event(manifest_diagnostics(&previous));
            let custom = self.custom_actions.lock().clone();
            for action in &custom {
                action.post_diagnostics(session, previous.version());
            }
        }

        info!(
            version = %manifest.version(),
            rules = manifest.rule_count(),
            invalid_rules = manifest.report().invalid_rules,
            invalid_actions = manifest.report().invalid_actions,
            sampled,
            "manifest installed"
        );
        self.manifest.store(Some(Arc::new(manifest)));
        Ok(())
    }

    /// The active manifest, if any
    pub fn current_manifest(&self) -> Option<Arc<Manifest>> {
        self.manifest.load_full()
    }

    /// Register a channel; the route table is rebuilt
    pub fn add_channel(&self, channel: Arc<dyn Channel>) -> Result<()> {
        self.ensure_live()?;
        self.router.lock().add_channel(channel)?;
        Ok(())
    }

    /// Add an action that runs for every event for the rest of the session
    pub fn add_custom_action(&self, action: Arc<dyn Action>) -> Result<()> {
        self.ensure_live()?;
        debug!(action = action.name(), priority = action.priority(), "custom action added");
        self.custom_actions.lock().push(action);
        Ok(())
    }

    pub fn custom_action_names(&self) -> Vec<&'static str> {
        self.custom_actions.lock().iter().map(|a| a.name()).collect()
    }

    pub fn channel_count(&self) -> usize {
        self.router.lock().channel_count()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Dispose every channel immediately
    ///
    /// Returns the number of channels disposed.
    pub fn dispose(&self) -> Result<usize> {
        self.mark_disposed()?;
        Ok(self.router.lock().dispose())
    }

    /// Give flush-capable channels up to `deadline` to transmit, then dispose
    pub async fn dispose_and_transmit(
        &self,
        deadline: Duration,
        cancel: CancellationToken,
    ) -> Result<DrainReport> {
        self.mark_disposed()?;
        let channels = self.router.lock().take_channels();
        let report = drain_and_dispose(channels, deadline, cancel).await;
        info!(
            flushed = report.flushed,
            disposed = report.disposed,
            completed = report.completed,
            "processor drained"
        );
        Ok(report)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(PipelineError::Disposed);
        }
        Ok(())
    }

    fn mark_disposed(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Err(PipelineError::Disposed);
        }
        Ok(())
    }

    fn enter(&self) -> Result<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| PipelineError::Reentrant)?;
        Ok(InFlight(&self.in_flight))
    }
}

impl Default for Processor {
    fn default() -> Self {
        Self::new(Router::new())
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field(
                "manifest",
                &self.current_manifest().map(|m| m.version().to_string()),
            )
            .field("custom_actions", &self.custom_action_names())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Summary of a manifest's validation and the activity it governed
fn manifest_diagnostics(manifest: &Manifest) -> Event {
    let report = manifest.report();
    let counters = manifest.counters().snapshot();

    let mut event = Event::new(MANIFEST_DIAGNOSTICS_EVENT);
    let properties = event.properties_mut();
    properties.insert("ManifestVersion".into(), manifest.version().into());
    properties.insert("InvalidRules".into(), to_int(report.invalid_rules as u64));
    properties.insert("InvalidActions".into(), to_int(report.invalid_actions as u64));
    properties.insert(
        "InvalidRuleNames".into(),
        report.invalid_rule_names.join(",").into(),
    );
    properties.insert(
        "InvalidActionNames".into(),
        report.invalid_action_names.join(",").into(),
    );
    properties.insert("EventsDropped".into(), to_int(counters.events_dropped));
    properties.insert("EventsThrottled".into(), to_int(counters.events_throttled));
    properties.insert("PiiHashed".into(), to_int(counters.pii_hashed));
    event
}

fn to_int(value: u64) -> PropertyValue {
    PropertyValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
}
