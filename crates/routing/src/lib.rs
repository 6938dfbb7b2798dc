//! Tally Routing - Fan-out of processed events to output channels
//!
//! # Design
//!
//! Every registered channel owns one slot in the [`RouteTable`]. Slots hold
//! per-event state only (availability, disable flag, routing arguments) and
//! are cleared at the start of every event, never reallocated. The table is
//! rebuilt in full whenever the channel set changes, so slot indices are not
//! stable across registrations.
//!
//! Delivery rules:
//! - Developer channels always receive the event, dropped or not
//! - Other channels receive it only if it was not dropped, the channel was
//!   not disabled for this event, and the channel is either a default channel
//!   or has routing arguments attached for this event
//! - Channels are started lazily on their first delivery
//!
//! # Example
//!
//! ```ignore
//! use tally_routing::{Router, ChannelCapabilities};
//!
//! let mut router = Router::new();
//! router.add_channel(analytics)?;
//! router.add_channel(console)?;
//!
//! router.reset_for_event();
//! router.disable_channel("analytics");
//! router.route_event(&mut event, &excluded, "session-1", false);
//! ```

mod channel;
mod drain;
mod error;
mod metrics;
mod router;
mod slot;
mod table;
pub mod test_utils;

pub use channel::{Channel, ChannelCapabilities, FlushFuture, RouteArguments};
pub use drain::{DrainReport, dispose_all, drain_and_dispose};
pub use error::{Result, RoutingError};
pub use metrics::{RouterMetrics, RouterMetricsSnapshot};
pub use router::Router;
pub use slot::ChannelSlot;
pub use table::RouteTable;
