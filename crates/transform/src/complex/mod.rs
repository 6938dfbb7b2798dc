//! Complex Property Action - Late serialization of structured values
//!
//! Complex properties are serialized to strings as the last step before
//! routing, after PII leaves inside them have been replaced by their hash.
//!
//! - Serializer failures drop the property and list it in
//!   `Reserved.ComplexPropertyErrors`
//! - Output longer than `max_length` is truncated and listed in
//!   `Reserved.TruncatedComplexProperties`
//! - With PII authorization, a second serialization holding the raw PII is
//!   kept under `Reserved.RawPii.<name>`
//! - Excluded complex properties are serialized in place with PII hashed,
//!   unlisted and without a raw companion

use std::sync::Arc;

use serde_json::Value;
use tally_protocol::reserved::{self, raw_pii_name};
use tally_protocol::{ComplexValue, PropertyMap, PropertyValue};
use tracing::debug;

use crate::pii::PiiHasher;
use crate::restrict::{join_capped, truncate_with_suffix};
use crate::{Action, ActionContext, ActionError, ActionResult};

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

pub const COMPLEX_PRIORITY: i32 = 700;

/// Turns a complex value into its wire string
pub trait ComplexPropertySerializer: Send + Sync {
    /// # Errors
    /// Returns `ActionError::Serialize` if the value cannot be represented
    fn serialize(&self, value: &Value) -> ActionResult<String>;
}

/// Compact JSON serializer
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl ComplexPropertySerializer for JsonSerializer {
    fn serialize(&self, value: &Value) -> ActionResult<String> {
        serde_json::to_string(value).map_err(|e| ActionError::serialize(e.to_string()))
    }
}

/// Configuration for the complex property action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplexConfig {
    /// Maximum serialized length, in characters
    pub max_length: usize,
    /// Cap applied to the reserved lists
    pub max_list_length: usize,
}

impl Default for ComplexConfig {
    fn default() -> Self {
        Self {
            max_length: 61_440,
            max_list_length: 1024,
        }
    }
}

/// Complex property action
pub struct ComplexPropertyAction {
    config: ComplexConfig,
    hasher: Arc<PiiHasher>,
    serializer: Arc<dyn ComplexPropertySerializer>,
}

impl ComplexPropertyAction {
    pub fn new(config: ComplexConfig, hasher: Arc<PiiHasher>) -> Self {
        Self {
            config,
            hasher,
            serializer: Arc::new(JsonSerializer),
        }
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn ComplexPropertySerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    fn hashed_json(&self, value: &ComplexValue) -> (Value, u64) {
        let mut hashed = 0u64;
        let json = value.to_json_with(&mut |raw| {
            hashed += 1;
            self.hasher.hash(raw)
        });
        (json, hashed)
    }

    /// Serialize complex values left in a side-table, returning PII leaves hashed
    fn serialize_excluded(&self, properties: &mut PropertyMap) -> u64 {
        let max = self.config.max_length;
        let mut hashed_total = 0;
        properties.retain(|name, value| {
            let PropertyValue::Complex(complex) = value else {
                return true;
            };
            let (json, hashed) = self.hashed_json(complex);
            match self.serializer.serialize(&json) {
                Ok(serialized) => {
                    hashed_total += hashed;
                    *value = truncate_with_suffix(&serialized, max).into();
                    true
                }
                Err(e) => {
                    debug!(property = %name, error = %e, "excluded complex property dropped");
                    false
                }
            }
        });
        hashed_total
    }
}

impl Default for ComplexPropertyAction {
    fn default() -> Self {
        Self::new(ComplexConfig::default(), Arc::new(PiiHasher::default()))
    }
}

impl std::fmt::Debug for ComplexPropertyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComplexPropertyAction")
            .field("config", &self.config)
            .finish()
    }
}

impl Action for ComplexPropertyAction {
    fn name(&self) -> &'static str {
        "complex_property"
    }

    fn priority(&self) -> i32 {
        COMPLEX_PRIORITY
    }

    fn execute(&self, ctx: &mut ActionContext<'_>) -> bool {
        let excluded_hashed = self.serialize_excluded(ctx.excluded_mut());
        if excluded_hashed > 0 {
            ctx.counters().record_pii_hashed(excluded_hashed);
        }

        let names: Vec<String> = ctx
            .event()
            .properties()
            .iter()
            .filter(|(_, v)| v.is_complex())
            .map(|(k, _)| k.clone())
            .collect();
        if names.is_empty() {
            return true;
        }

        let keep_raw = ctx.session().can_collect_pii();
        let max = self.config.max_length;
        let mut failed = Vec::new();
        let mut truncated = Vec::new();
        let mut hashed_total = 0;

        for name in names {
            let Some(PropertyValue::Complex(value)) = ctx.event_mut().remove_property(&name) else {
                continue;
            };

            let (json, hashed) = self.hashed_json(&value);
            let serialized = match self.serializer.serialize(&json) {
                Ok(s) => s,
                Err(e) => {
                    debug!(property = %name, error = %e, "complex property dropped");
                    failed.push(name);
                    continue;
                }
            };
            hashed_total += hashed;

            if serialized.chars().count() > max {
                truncated.push(name.clone());
            }
            let event = ctx.event_mut();
            event
                .properties_mut()
                .insert(name.clone(), truncate_with_suffix(&serialized, max).into());

            if keep_raw && value.contains_pii() {
                let raw = value.to_json_with(&mut |raw| raw.to_string());
                if let Ok(raw) = self.serializer.serialize(&raw) {
                    event.set_reserved(&raw_pii_name(&name), truncate_with_suffix(&raw, max));
                }
            }
        }

        if hashed_total > 0 {
            ctx.counters().record_pii_hashed(hashed_total);
        }

        let list_max = self.config.max_list_length;
        let event = ctx.event_mut();
        if !failed.is_empty() {
            event.set_reserved(reserved::COMPLEX_PROPERTY_ERRORS, join_capped(&failed, list_max));
        }
        if !truncated.is_empty() {
            event.set_reserved(
                reserved::TRUNCATED_COMPLEX_PROPERTIES,
                join_capped(&truncated, list_max),
            );
        }
        true
    }
}
