//! Channel abstraction
//!
//! A channel is an output backend (crash uploader, analytics uploader, local
//! logger, ...). The router only knows channels through this trait.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::ops::BitOr;
use std::pin::Pin;

use tally_protocol::Event;

/// Backend-specific routing metadata attached to a channel for one event
pub type RouteArguments = BTreeMap<String, String>;

/// Future returned by a channel's flush capability
pub type FlushFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Capability bitmask of a channel
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChannelCapabilities(u8);

impl ChannelCapabilities {
    /// No capabilities: receives events only when routed explicitly
    pub const NONE: Self = Self(0);
    /// Standard channel, receives every non-dropped event
    pub const DEFAULT: Self = Self(1);
    /// Developer/diagnostic channel, receives every event including dropped ones
    pub const DEVELOPER: Self = Self(1 << 1);
    /// Only active when the router runs in test mode
    pub const TEST_ONLY: Self = Self(1 << 2);
    /// Skipped when the router runs in test mode
    pub const EXCLUDED_FROM_UNIT_TESTS: Self = Self(1 << 3);

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every bit of `other` is set
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    #[inline]
    pub const fn is_developer(self) -> bool {
        self.contains(Self::DEVELOPER)
    }
}

impl BitOr for ChannelCapabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for ChannelCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        for (flag, name) in [
            (Self::DEFAULT, "DEFAULT"),
            (Self::DEVELOPER, "DEVELOPER"),
            (Self::TEST_ONLY, "TEST_ONLY"),
            (Self::EXCLUDED_FROM_UNIT_TESTS, "EXCLUDED_FROM_UNIT_TESTS"),
        ] {
            if self.contains(flag) {
                names.push(name);
            }
        }
        if names.is_empty() {
            names.push("NONE");
        }
        write!(f, "ChannelCapabilities({})", names.join(" | "))
    }
}

/// Output backend for processed events
///
/// Implementors must be `Send + Sync`: channels are registered from
/// administrative threads and drained concurrently on shutdown.
///
/// Delivery errors stay inside the channel. `post_event` is fire-and-forget;
/// retry policy belongs to the implementation.
pub trait Channel: Send + Sync {
    /// Unique identifier used by manifests to address the channel
    fn id(&self) -> &str;

    /// Transport name recorded in `Reserved.ChannelUsed`
    fn transport(&self) -> &str {
        self.id()
    }

    fn capabilities(&self) -> ChannelCapabilities;

    /// Bring the backend up. Called lazily before the first delivery.
    fn start(&self, session_id: &str);

    fn is_started(&self) -> bool;

    /// Hand one event to the channel
    fn post_event(&self, event: &Event, args: Option<&RouteArguments>);

    /// Whether the channel has the flush-on-drain capability
    ///
    /// Channels without it are disposed immediately on drain.
    fn can_flush(&self) -> bool {
        false
    }

    /// Transmit queued data. Only awaited when [`Channel::can_flush`] is true.
    fn flush(&self) -> FlushFuture<'_> {
        Box::pin(std::future::ready(()))
    }

    /// Release resources. Called exactly once by the router.
    fn dispose(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        let caps = ChannelCapabilities::DEFAULT | ChannelCapabilities::EXCLUDED_FROM_UNIT_TESTS;
        assert!(caps.contains(ChannelCapabilities::DEFAULT));
        assert!(caps.contains(ChannelCapabilities::EXCLUDED_FROM_UNIT_TESTS));
        assert!(!caps.contains(ChannelCapabilities::DEVELOPER));
        assert!(!caps.contains(ChannelCapabilities::NONE));
    }

    #[test]
    fn test_is_developer() {
        assert!(ChannelCapabilities::DEVELOPER.is_developer());
        assert!(!ChannelCapabilities::DEFAULT.is_developer());
    }

    #[test]
    fn test_debug_lists_flags() {
        let caps = ChannelCapabilities::DEFAULT | ChannelCapabilities::DEVELOPER;
        let debug = format!("{caps:?}");
        assert!(debug.contains("DEFAULT"));
        assert!(debug.contains("DEVELOPER"));
        assert_eq!(format!("{:?}", ChannelCapabilities::NONE), "ChannelCapabilities(NONE)");
    }
}
