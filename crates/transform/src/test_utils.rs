//! Test utilities for actions
//!
//! [`TestSession`] records diagnostic events instead of queueing them.
//! [`Harness`] owns everything an [`ActionContext`] borrows so a test can
//! run one action, or a whole chain, over an event.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tally_protocol::Event;
use tally_routing::Router;

use crate::{
    Action, ActionChain, ActionContext, ChainOutcome, ManifestCounters, ProcessingState, Session,
    SessionIdentity, ThrottleSettings,
};

/// Session that keeps posted events in memory
#[derive(Debug)]
pub struct TestSession {
    identity: SessionIdentity,
    opted_in: AtomicBool,
    can_collect_pii: AtomicBool,
    posted: Mutex<Vec<Event>>,
}

impl Default for TestSession {
    fn default() -> Self {
        Self::new(SessionIdentity::new("machine-1", "user-1", "session-1"))
    }
}

impl TestSession {
    /// Opted-in session without PII authorization
    pub fn new(identity: SessionIdentity) -> Self {
        Self {
            identity,
            opted_in: AtomicBool::new(true),
            can_collect_pii: AtomicBool::new(false),
            posted: Mutex::new(Vec::new()),
        }
    }

    pub fn set_opted_in(&self, opted_in: bool) {
        self.opted_in.store(opted_in, Ordering::Relaxed);
    }

    pub fn set_can_collect_pii(&self, allowed: bool) {
        self.can_collect_pii.store(allowed, Ordering::Relaxed);
    }

    pub fn posted(&self) -> Vec<Event> {
        self.posted.lock().clone()
    }

    /// Posted events with the given name
    pub fn posted_named(&self, name: &str) -> Vec<Event> {
        self.posted
            .lock()
            .iter()
            .filter(|e| e.name() == name)
            .cloned()
            .collect()
    }
}

impl Session for TestSession {
    fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    fn is_opted_in(&self) -> bool {
        self.opted_in.load(Ordering::Relaxed)
    }

    fn can_collect_pii(&self) -> bool {
        self.can_collect_pii.load(Ordering::Relaxed)
    }

    fn post_event(&self, event: Event) {
        self.posted.lock().push(event);
    }
}

/// Owner of the state an [`ActionContext`] borrows
#[derive(Debug, Default)]
pub struct Harness {
    pub router: Router,
    pub session: TestSession,
    pub state: ProcessingState,
    pub counters: ManifestCounters,
    pub settings: ThrottleSettings,
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(mut self, settings: ThrottleSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Reset per-event state and run a single action
    pub fn run(&mut self, action: &dyn Action, event: &mut Event) -> bool {
        self.begin_event();
        let mut ctx = self.context(event);
        action.execute(&mut ctx)
    }

    /// Reset per-event state and run a chain
    pub fn run_chain(&mut self, chain: &ActionChain, event: &mut Event) -> ChainOutcome {
        self.begin_event();
        let mut ctx = self.context(event);
        chain.execute(&mut ctx)
    }

    pub fn begin_event(&mut self) {
        self.state.reset();
        self.router.reset_for_event();
    }

    pub fn context<'a>(&'a mut self, event: &'a mut Event) -> ActionContext<'a> {
        ActionContext::new(
            event,
            &mut self.router,
            &self.session,
            &mut self.state,
            self.settings,
            &self.counters,
        )
    }
}
