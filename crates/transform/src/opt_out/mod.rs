//! Opt-out Action - Consent filtering
//!
//! For sessions that have not opted in, only opt-out-friendly data leaves
//! the pipeline:
//!
//! - Events marked opt-out friendly pass unchanged
//! - Events with opt-out-friendly properties pass with every other caller
//!   property moved to the excluded side-table
//! - Everything else is marked dropped
//!
//! The action never stops the chain, so later actions still see the event
//! and developer channels still receive it.

use tally_protocol::reserved::is_reserved;
use tracing::trace;

use crate::{Action, ActionContext};

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

pub const OPT_OUT_PRIORITY: i32 = 400;

/// Opt-out action
#[derive(Debug, Default)]
pub struct OptOutAction;

impl OptOutAction {
    pub fn new() -> Self {
        Self
    }
}

impl Action for OptOutAction {
    fn name(&self) -> &'static str {
        "opt_out"
    }

    fn priority(&self) -> i32 {
        OPT_OUT_PRIORITY
    }

    fn execute(&self, ctx: &mut ActionContext<'_>) -> bool {
        if ctx.session().is_opted_in() || ctx.event().is_opt_out_friendly() {
            return true;
        }

        if !ctx.event().has_opt_out_friendly_properties() {
            trace!(event = %ctx.event().name(), "dropping event for opted-out session");
            ctx.mark_dropped();
            ctx.counters().record_dropped();
            return true;
        }

        let excluded: Vec<String> = ctx
            .event()
            .properties()
            .keys()
            .filter(|name| !is_reserved(name) && !ctx.event().is_property_opt_out_friendly(name))
            .cloned()
            .collect();

        for name in &excluded {
            ctx.exclude_property(name);
        }
        true
    }
}
