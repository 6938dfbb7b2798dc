//! Test utilities for routing
//!
//! Provides [`RecordingChannel`], an in-memory channel that records every
//! delivery. Public so downstream crates can use it in their own tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tally_protocol::Event;

use crate::{Channel, ChannelCapabilities, FlushFuture, RouteArguments};

/// One recorded delivery
#[derive(Debug, Clone)]
pub struct Delivery {
    pub event: Event,
    pub args: Option<RouteArguments>,
}

/// In-memory channel recording everything it receives
#[derive(Debug)]
pub struct RecordingChannel {
    id: String,
    transport: String,
    capabilities: ChannelCapabilities,
    flush_delay: Option<Duration>,
    started_with: Mutex<Option<String>>,
    deliveries: Mutex<Vec<Delivery>>,
    starts: AtomicUsize,
    flushed: AtomicBool,
    disposed: AtomicUsize,
}

impl RecordingChannel {
    pub fn new(id: &str, capabilities: ChannelCapabilities) -> Self {
        Self {
            id: id.to_string(),
            transport: id.to_string(),
            capabilities,
            flush_delay: None,
            started_with: Mutex::new(None),
            deliveries: Mutex::new(Vec::new()),
            starts: AtomicUsize::new(0),
            flushed: AtomicBool::new(false),
            disposed: AtomicUsize::new(0),
        }
    }

    /// Default-capability channel
    pub fn default_channel(id: &str) -> Arc<Self> {
        Arc::new(Self::new(id, ChannelCapabilities::DEFAULT))
    }

    /// Developer channel
    pub fn developer(id: &str) -> Arc<Self> {
        Arc::new(Self::new(id, ChannelCapabilities::DEVELOPER))
    }

    pub fn with_transport(mut self, transport: &str) -> Self {
        self.transport = transport.to_string();
        self
    }

    /// Make the channel flush-capable, taking `delay` to flush
    pub fn with_flush_delay(mut self, delay: Duration) -> Self {
        self.flush_delay = Some(delay);
        self
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.deliveries.lock().iter().map(|d| d.event.clone()).collect()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.deliveries
            .lock()
            .iter()
            .map(|d| d.event.name().to_string())
            .collect()
    }

    pub fn delivery_count(&self) -> usize {
        self.deliveries.lock().len()
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::Relaxed)
    }

    pub fn started_session(&self) -> Option<String> {
        self.started_with.lock().clone()
    }

    pub fn was_flushed(&self) -> bool {
        self.flushed.load(Ordering::Relaxed)
    }

    pub fn dispose_count(&self) -> usize {
        self.disposed.load(Ordering::Relaxed)
    }
}

impl Channel for RecordingChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn transport(&self) -> &str {
        &self.transport
    }

    fn capabilities(&self) -> ChannelCapabilities {
        self.capabilities
    }

    fn start(&self, session_id: &str) {
        self.starts.fetch_add(1, Ordering::Relaxed);
        *self.started_with.lock() = Some(session_id.to_string());
    }

    fn is_started(&self) -> bool {
        self.starts.load(Ordering::Relaxed) > 0
    }

    fn post_event(&self, event: &Event, args: Option<&RouteArguments>) {
        self.deliveries.lock().push(Delivery {
            event: event.clone(),
            args: args.cloned(),
        });
    }

    fn can_flush(&self) -> bool {
        self.flush_delay.is_some()
    }

    fn flush(&self) -> FlushFuture<'_> {
        let delay = self.flush_delay.unwrap_or_default();
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            self.flushed.store(true, Ordering::Relaxed);
        })
    }

    fn dispose(&self) {
        self.disposed.fetch_add(1, Ordering::Relaxed);
    }
}
