//! Tally - Transform
//!
//! Prioritised actions applied to each event before routing.
//!
//! # Overview
//!
//! Every event passes through a chain of actions sorted by priority (lower
//! runs first). Actions come from two places:
//!
//! - **Manifest actions** are built from the `do` list of a matching rule and
//!   live as long as the manifest that declared them
//! - **Custom actions** are registered once per session: throttling, opt-out,
//!   PII hashing, restriction enforcement and complex-property serialization
//!
//! An action may rewrite the event, disable channels, attach routing
//! arguments, mark the event dropped, or stop the chain. A stopped event is
//! still routed to developer channels.
//!
//! # Priorities
//!
//! | Action | Priority |
//! |--------|----------|
//! | `drop` | 0 |
//! | `markPii` | 100 |
//! | `throttle` directive | 150 |
//! | `excludeChannels`, `route` | 200 |
//! | `renameSuffix` | 250 |
//! | throttling | 300 |
//! | opt-out | 400 |
//! | PII hashing | 500 |
//! | restrictions | 600 |
//! | complex properties | 700 |
//!
//! # Modules
//!
//! - `chain` - Priority-sorted execution
//! - `registry` - Manifest action creation by type tag
//! - `directive` - Manifest actions
//! - `throttle` - Windowed volume limiting
//! - `opt_out` - Consent filtering
//! - `pii` - One-way hashing of PII-marked values
//! - `restrict` - Property name and value limits
//! - `complex` - Structured property serialization
//!
//! # Example
//!
//! ```ignore
//! use tally_transform::{ActionChain, ThrottleAction, ThrottleConfig};
//!
//! let custom: Vec<Arc<dyn Action>> = vec![Arc::new(ThrottleAction::new(ThrottleConfig::default()))];
//!
//! let mut chain = ActionChain::new();
//! chain.rebuild(manifest.actions_for(&event), &custom);
//! let outcome = chain.execute(&mut ctx);
//! ```

mod chain;
mod context;
mod error;
mod session;
pub mod complex;
pub mod directive;
pub mod opt_out;
pub mod pii;
pub mod registry;
pub mod restrict;
pub mod test_utils;
pub mod throttle;

pub use chain::{ActionChain, ChainOutcome};
pub use complex::{ComplexConfig, ComplexPropertyAction, ComplexPropertySerializer, JsonSerializer};
pub use context::{
    ActionContext, ManifestCounters, ManifestCountersSnapshot, ProcessingState, ThrottleSettings,
    ThrottlingDirective,
};
pub use directive::{
    DropAction, ExcludeChannelsAction, MarkPiiAction, RenameSuffixAction, RouteAction,
    ThrottleDirectiveAction,
};
pub use error::{ActionError, ActionResult};
pub use opt_out::OptOutAction;
pub use pii::{PiiAction, PiiHasher};
pub use registry::{ActionConfig, ActionFactory, ActionRegistry, default_registry};
pub use restrict::{RestrictionAction, RestrictionLimits};
pub use session::{Session, SessionIdentity};
pub use throttle::{ThrottleAction, ThrottleConfig};

/// Name prefix of events emitted by the pipeline itself
pub const DIAGNOSTICS_PREFIX: &str = "tally/diagnostics/";

/// A prioritised unit of per-event work
///
/// Implementors must be `Send + Sync`: manifests are swapped from
/// administrative threads while the processing thread holds the previous
/// one. Stateful actions use interior mutability.
///
/// # Example
///
/// ```ignore
/// struct Stamp;
///
/// impl Action for Stamp {
///     fn name(&self) -> &'static str {
///         "stamp"
///     }
///
///     fn priority(&self) -> i32 {
///         900
///     }
///
///     fn execute(&self, ctx: &mut ActionContext<'_>) -> bool {
///         ctx.event_mut().set_reserved("Reserved.Stamped", true);
///         true
///     }
/// }
/// ```
pub trait Action: Send + Sync {
    /// Name for logging and diagnostics
    fn name(&self) -> &'static str;

    /// Execution order, lower runs first
    fn priority(&self) -> i32;

    /// Apply the action to the current event
    ///
    /// Returns `false` to stop the chain. The event is then treated as
    /// dropped for every non-developer channel.
    fn execute(&self, ctx: &mut ActionContext<'_>) -> bool;

    /// Structural check run when a manifest is validated
    fn validate(&self) -> ActionResult<()> {
        Ok(())
    }

    /// Post a summary of activity since the last summary
    ///
    /// Called for custom actions when a new manifest is installed, with the
    /// version of the manifest being replaced. Default is a no-op.
    fn post_diagnostics(&self, _session: &dyn Session, _manifest_version: &str) {}
}

/// Whether an event was emitted by the pipeline itself
#[inline]
pub fn is_diagnostic_event(name: &str) -> bool {
    name.starts_with(DIAGNOSTICS_PREFIX)
}
