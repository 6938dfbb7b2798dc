//! Router - Fan-out of processed events to registered channels
//!
//! The `Router` owns the channel registrations and the per-event
//! [`RouteTable`]. It is driven by a single processing thread: reset the
//! table, let actions disable channels or attach arguments, then route.

use std::sync::Arc;

use tally_protocol::{Event, PropertyMap, reserved};
use tracing::{debug, info};

use crate::drain::dispose_all;
use crate::{
    Channel, ChannelCapabilities, ChannelSlot, Result, RouteArguments, RouteTable, RouterMetrics,
    RoutingError,
};

#[cfg(test)]
#[path = "router_test.rs"]
mod tests;

/// Fan-out router for processed events
///
/// # Design
///
/// - Channels stored in registration order, slot `i` belongs to channel `i`
/// - Per-event state lives in the route table and is reset, not reallocated
/// - Channels are started on their first delivery, not on registration
pub struct Router {
    /// Registered channels in slot order
    channels: Vec<Arc<dyn Channel>>,

    /// Per-event routing state
    table: RouteTable,

    /// Router metrics (Arc for sharing with metrics readers)
    metrics: Arc<RouterMetrics>,

    /// Unit-test mode: enables TEST_ONLY channels, skips EXCLUDED_FROM_UNIT_TESTS ones
    test_mode: bool,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
            table: RouteTable::new(),
            metrics: Arc::new(RouterMetrics::new()),
            test_mode: false,
        }
    }

    /// Run the router in unit-test mode
    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    /// Shared handle to the router metrics
    pub fn metrics(&self) -> Arc<RouterMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Register a channel and rebuild the route table
    ///
    /// # Errors
    ///
    /// Fails if a channel with the same id is already registered.
    pub fn add_channel(&mut self, channel: Arc<dyn Channel>) -> Result<()> {
        if self.channels.iter().any(|c| c.id() == channel.id()) {
            return Err(RoutingError::duplicate_channel(channel.id()));
        }

        self.channels.push(channel);
        if let Err(e) = self.rebuild_table() {
            self.channels.pop();
            return Err(e);
        }

        if let Some(channel) = self.channels.last() {
            debug!(
                channel = %channel.id(),
                capabilities = ?channel.capabilities(),
                channel_count = self.channels.len(),
                "registered channel with router"
            );
        }
        Ok(())
    }

    /// Unregister a channel and rebuild the route table
    ///
    /// The channel is returned without being disposed.
    pub fn remove_channel(&mut self, id: &str) -> Option<Arc<dyn Channel>> {
        let position = self.channels.iter().position(|c| c.id() == id)?;
        let channel = self.channels.remove(position);
        // Remaining ids are unique, rebuild cannot fail
        let _ = self.rebuild_table();
        Some(channel)
    }

    fn rebuild_table(&mut self) -> Result<()> {
        self.table.rebuild(self.channels.iter().map(|c| c.id()))
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel_ids(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.id()).collect()
    }

    #[inline]
    pub fn route_table(&self) -> &RouteTable {
        &self.table
    }

    /// Clear per-event state. Called at the start of every event.
    #[inline]
    pub fn reset_for_event(&mut self) {
        self.table.reset();
    }

    /// Exclude a channel from the current event
    pub fn disable_channel(&mut self, id: &str) -> bool {
        let found = self.table.disable(id);
        if !found {
            debug!(channel = %id, "disable requested for unknown channel");
        }
        found
    }

    #[inline]
    pub fn is_channel_disabled(&self, id: &str) -> bool {
        self.table.is_disabled(id)
    }

    /// Attach routing arguments to a channel for the current event
    pub fn try_add_route_argument(&mut self, id: &str, args: &RouteArguments) -> bool {
        self.table.try_add_args(id, args)
    }

    #[inline]
    pub fn try_get_route_argument(&self, id: &str) -> Option<&RouteArguments> {
        self.table.args(id)
    }

    /// Deliver an event to every eligible channel
    ///
    /// Developer channels always receive the event, with `excluded`
    /// properties restored. Other channels receive it only when it was not
    /// dropped, the channel is not disabled, and the channel is a default
    /// channel or has routing arguments for this event. The transports of
    /// those channels are recorded in `Reserved.ChannelUsed`.
    ///
    /// # Returns
    ///
    /// The number of channels the event was posted to.
    pub fn route_event(
        &mut self,
        event: &mut Event,
        excluded: &PropertyMap,
        session_id: &str,
        dropped: bool,
    ) -> usize {
        self.metrics.record_received(dropped);

        let mut transports: Vec<&str> = Vec::new();
        let mut developer_selected = false;

        for (i, channel) in self.channels.iter().enumerate() {
            let slot = ChannelSlot::new(i as u16);
            let caps = channel.capabilities();

            let available = if !runs_in_mode(caps, self.test_mode) {
                false
            } else if caps.is_developer() {
                developer_selected = true;
                true
            } else {
                !dropped
                    && !self.table.is_disabled_at(slot)
                    && (caps.contains(ChannelCapabilities::DEFAULT)
                        || self.table.args_at(slot).is_some())
            };

            self.table.set_available(slot, available);

            if available && !caps.is_developer() && !transports.contains(&channel.transport()) {
                transports.push(channel.transport());
            }
        }

        if transports.is_empty() {
            event.remove_property(reserved::CHANNEL_USED);
        } else {
            event.set_reserved(reserved::CHANNEL_USED, transports.join(","));
        }

        let restored = (developer_selected && !excluded.is_empty()).then(|| {
            let mut full = event.clone();
            full.properties_mut()
                .extend(excluded.iter().map(|(k, v)| (k.clone(), v.clone())));
            full
        });

        let mut posted = 0;
        let mut delivered = false;

        for (i, channel) in self.channels.iter().enumerate() {
            let slot = ChannelSlot::new(i as u16);
            if !self.table.is_available_at(slot) {
                continue;
            }

            if !channel.is_started() {
                channel.start(session_id);
                self.metrics.record_started();
                info!(channel = %channel.id(), session = %session_id, "channel started");
            }

            let developer = channel.capabilities().is_developer();
            let target = match (&restored, developer) {
                (Some(full), true) => full,
                _ => &*event,
            };

            channel.post_event(target, self.table.args_at(slot));
            self.metrics.record_post();
            posted += 1;
            delivered |= !developer;
        }

        if delivered {
            self.metrics.record_delivered();
        }

        debug!(
            event = %event.name(),
            dropped,
            posted,
            "event routed"
        );
        posted
    }

    /// Remove every channel, leaving an empty router
    ///
    /// Used by the asynchronous drain, which disposes the channels itself.
    pub fn take_channels(&mut self) -> Vec<Arc<dyn Channel>> {
        let channels = std::mem::take(&mut self.channels);
        self.table = RouteTable::new();
        channels
    }

    /// Dispose every channel immediately
    pub fn dispose(&mut self) -> usize {
        let channels = self.take_channels();
        let disposed = dispose_all(&channels);
        info!(disposed, "router disposed");
        disposed
    }
}

/// Whether a channel participates given the router's test mode
fn runs_in_mode(caps: ChannelCapabilities, test_mode: bool) -> bool {
    if caps.contains(ChannelCapabilities::TEST_ONLY) && !test_mode {
        return false;
    }
    !(caps.contains(ChannelCapabilities::EXCLUDED_FROM_UNIT_TESTS) && test_mode)
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("channels", &self.channel_ids())
            .field("test_mode", &self.test_mode)
            .finish()
    }
}
