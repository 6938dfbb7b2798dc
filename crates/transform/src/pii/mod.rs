//! PII Action - One-way hashing of PII-marked values
//!
//! Every scalar property carrying the PII marker is replaced by its hash.
//! When the session is authorized to collect PII, the unhashed value is
//! also kept under `Reserved.RawPii.<name>`.
//!
//! Excluded properties are hashed too, without a raw companion: they are
//! restored on developer channels.
//!
//! PII inside complex values is handled by the complex-property action,
//! which shares the same hasher.

mod hasher;

pub use hasher::{DEFAULT_HASH_KEY, HASH_PREFIX, PiiHasher};

use std::sync::Arc;

use tally_protocol::{PropertyMap, PropertyValue};
use tally_protocol::reserved::raw_pii_name;

use crate::{Action, ActionContext};

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

pub const PII_PRIORITY: i32 = 500;

/// PII action
#[derive(Debug, Default)]
pub struct PiiAction {
    hasher: Arc<PiiHasher>,
}

impl PiiAction {
    pub fn new(hasher: Arc<PiiHasher>) -> Self {
        Self { hasher }
    }

    pub fn hasher(&self) -> &Arc<PiiHasher> {
        &self.hasher
    }

    /// Replace every PII value by its hash, returning `(name, raw)` pairs
    fn hash_all(&self, properties: &mut PropertyMap) -> Vec<(String, String)> {
        let mut raw_values = Vec::new();
        for (name, value) in properties.iter_mut() {
            if let PropertyValue::Pii(raw) = value {
                let hashed = self.hasher.hash(raw);
                let raw = std::mem::take(raw);
                *value = PropertyValue::String(hashed);
                raw_values.push((name.clone(), raw));
            }
        }
        raw_values
    }
}

impl Action for PiiAction {
    fn name(&self) -> &'static str {
        "pii"
    }

    fn priority(&self) -> i32 {
        PII_PRIORITY
    }

    fn execute(&self, ctx: &mut ActionContext<'_>) -> bool {
        let keep_raw = ctx.session().can_collect_pii();

        let excluded_hashed = self.hash_all(ctx.excluded_mut()).len();
        let raw_values = self.hash_all(ctx.event_mut().properties_mut());

        let hashed = raw_values.len() + excluded_hashed;
        if hashed == 0 {
            return true;
        }
        ctx.counters().record_pii_hashed(hashed as u64);

        if keep_raw {
            let event = ctx.event_mut();
            for (name, raw) in raw_values {
                event.set_reserved(&raw_pii_name(&name), raw);
            }
        }
        true
    }
}
