//! Route table slot index
//!
//! `ChannelSlot` is a lightweight, Copy index into the route table.

use std::fmt;

/// Index of a channel's slot in the route table
///
/// Assigned in registration order when the table is rebuilt. Not stable
/// across rebuilds; resolve by channel id when in doubt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelSlot(u16);

impl ChannelSlot {
    /// Maximum number of slots supported
    pub const MAX: u16 = u16::MAX;

    #[inline]
    #[must_use]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> u16 {
        self.0
    }

    /// Get the index as usize (for array indexing)
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ChannelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot:{}", self.0)
    }
}

impl From<u16> for ChannelSlot {
    #[inline]
    fn from(index: u16) -> Self {
        Self::new(index)
    }
}
