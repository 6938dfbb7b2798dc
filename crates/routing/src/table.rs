//! Per-event route table
//!
//! One slot per registered channel. The table is rebuilt when the channel
//! set changes and reset (not reallocated) at the start of every event.

use std::collections::HashMap;

use crate::{ChannelSlot, Result, RouteArguments, RoutingError};

#[cfg(test)]
#[path = "table_test.rs"]
mod tests;

/// Per-event state of one channel
#[derive(Debug, Clone, Default)]
struct RouteSlot {
    /// Channel receives the current event
    available: bool,
    /// Channel was excluded for the current event
    disabled: bool,
    /// Routing arguments attached for the current event
    args: RouteArguments,
}

impl RouteSlot {
    fn reset(&mut self) {
        self.available = false;
        self.disabled = false;
        self.args.clear();
    }
}

/// Route table indexed by [`ChannelSlot`]
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    slots: Vec<RouteSlot>,
    index: HashMap<String, ChannelSlot>,
}

impl RouteTable {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the table for a new channel set
    ///
    /// All per-event state is discarded. Slots are assigned in iteration order.
    ///
    /// # Errors
    ///
    /// Fails on duplicate or empty ids, or more than `ChannelSlot::MAX` channels.
    pub fn rebuild<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let mut index = HashMap::new();
        for (i, id) in ids.into_iter().enumerate() {
            if id.is_empty() {
                return Err(RoutingError::EmptyChannelId);
            }
            let slot = u16::try_from(i).map_err(|_| RoutingError::TableFull {
                max: ChannelSlot::MAX as usize,
            })?;
            if index.insert(id.to_string(), ChannelSlot::new(slot)).is_some() {
                return Err(RoutingError::duplicate_channel(id));
            }
        }

        self.slots.clear();
        self.slots.resize_with(index.len(), RouteSlot::default);
        self.index = index;
        Ok(())
    }

    /// Clear per-event state of every slot
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.reset();
        }
    }

    #[inline]
    pub fn slot_of(&self, id: &str) -> Option<ChannelSlot> {
        self.index.get(id).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Exclude a channel for the current event
    ///
    /// Returns `false` if no such channel is registered.
    pub fn disable(&mut self, id: &str) -> bool {
        match self.slot_mut(id) {
            Some(slot) => {
                slot.disabled = true;
                true
            }
            None => false,
        }
    }

    pub fn is_disabled(&self, id: &str) -> bool {
        self.slot(id).is_some_and(|s| s.disabled)
    }

    /// Merge routing arguments into a channel's slot for the current event
    ///
    /// Returns `false` if the channel is unknown or disabled for this event.
    pub fn try_add_args(&mut self, id: &str, args: &RouteArguments) -> bool {
        match self.slot_mut(id) {
            Some(slot) if !slot.disabled => {
                slot.args.extend(args.iter().map(|(k, v)| (k.clone(), v.clone())));
                true
            }
            _ => false,
        }
    }

    /// Routing arguments attached to a channel for the current event
    pub fn args(&self, id: &str) -> Option<&RouteArguments> {
        self.slot(id).map(|s| &s.args).filter(|a| !a.is_empty())
    }

    pub(crate) fn args_at(&self, slot: ChannelSlot) -> Option<&RouteArguments> {
        self.slots
            .get(slot.as_usize())
            .map(|s| &s.args)
            .filter(|a| !a.is_empty())
    }

    pub(crate) fn is_disabled_at(&self, slot: ChannelSlot) -> bool {
        self.slots.get(slot.as_usize()).is_some_and(|s| s.disabled)
    }

    pub(crate) fn set_available(&mut self, slot: ChannelSlot, available: bool) {
        if let Some(s) = self.slots.get_mut(slot.as_usize()) {
            s.available = available;
        }
    }

    pub(crate) fn is_available_at(&self, slot: ChannelSlot) -> bool {
        self.slots.get(slot.as_usize()).is_some_and(|s| s.available)
    }

    /// Whether the channel was selected for the current event
    pub fn is_available(&self, id: &str) -> bool {
        self.slot(id).is_some_and(|s| s.available)
    }

    fn slot(&self, id: &str) -> Option<&RouteSlot> {
        let slot = self.index.get(id)?;
        self.slots.get(slot.as_usize())
    }

    fn slot_mut(&mut self, id: &str) -> Option<&mut RouteSlot> {
        let slot = self.index.get(id)?;
        self.slots.get_mut(slot.as_usize())
    }
}
