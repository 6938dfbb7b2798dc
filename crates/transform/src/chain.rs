//! Action Chain - Priority-ordered execution
//!
//! The `ActionChain` merges the manifest actions matched for an event with
//! the session's custom actions and runs them lowest priority first.
//!
//! # Design
//!
//! - **Stable order**: equal priorities keep insertion order, manifest
//!   actions (in rule order) ahead of custom actions (in registration order)
//! - **Reused buffer**: the chain is rebuilt per event without reallocating
//! - **Short-circuit**: the first action returning `false` stops the chain

use std::sync::Arc;

use tracing::debug;

use crate::{Action, ActionContext};

#[cfg(test)]
#[path = "chain_test.rs"]
mod tests;

/// Result of running the chain over one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChainOutcome {
    /// Actions executed, including the one that stopped the chain
    pub executed: usize,
    /// Name of the action that stopped the chain
    pub stopped_by: Option<&'static str>,
}

impl ChainOutcome {
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped_by.is_some()
    }
}

/// Priority-sorted actions for the current event
#[derive(Default)]
pub struct ActionChain {
    actions: Vec<Arc<dyn Action>>,
}

impl ActionChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the chain with `manifest` followed by `custom`, sorted by priority
    pub fn rebuild<'a>(
        &mut self,
        manifest: impl IntoIterator<Item = &'a Arc<dyn Action>>,
        custom: &[Arc<dyn Action>],
    ) {
        self.actions.clear();
        self.actions.extend(manifest.into_iter().cloned());
        self.actions.extend(custom.iter().cloned());
        // sort_by_key is stable
        self.actions.sort_by_key(|a| a.priority());
    }

    /// Drop every action, keeping the allocation
    pub fn clear(&mut self) {
        self.actions.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Names of the actions in execution order
    pub fn names(&self) -> Vec<&'static str> {
        self.actions.iter().map(|a| a.name()).collect()
    }

    /// Run actions in order until one returns `false`
    pub fn execute(&self, ctx: &mut ActionContext<'_>) -> ChainOutcome {
        let mut outcome = ChainOutcome::default();

        for action in &self.actions {
            outcome.executed += 1;
            if !action.execute(ctx) {
                debug!(
                    event = %ctx.event().name(),
                    action = action.name(),
                    priority = action.priority(),
                    "action stopped chain"
                );
                outcome.stopped_by = Some(action.name());
                break;
            }
        }

        outcome
    }
}

impl std::fmt::Debug for ActionChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionChain")
            .field("actions", &self.names())
            .finish()
    }
}
