//! Restriction Action - Property name and value limits
//!
//! Caller properties must have names of allowed characters
//! (`A-Z a-z 0-9 . _ / -`) within the name limit, and string values within
//! the value limit. Reserved properties are not checked.
//!
//! | Violation | Effect | Listed in |
//! |-----------|--------|-----------|
//! | Bad name | Property removed | `Reserved.InvalidPropertyNames` |
//! | Long value | Value truncated in place | `Reserved.TruncatedProperties` |
//!
//! Excluded properties get the same treatment but are not listed, since
//! the lists travel on the event to every channel.
//!
//! Truncated text ends in `...` and never exceeds the limit. Lists are comma
//! separated, hold names truncated to the name limit, and are themselves
//! capped at the value limit.

mod config;

pub use config::RestrictionLimits;

use once_cell::sync::Lazy;
use regex::Regex;
use tally_protocol::{PropertyMap, PropertyValue};
use tally_protocol::reserved::{self, is_reserved};
use tracing::debug;

use crate::{Action, ActionContext};

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

pub const RESTRICTION_PRIORITY: i32 = 600;

/// Appended to truncated text
pub const TRUNCATION_SUFFIX: &str = "...";

static NAME_CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._/-]+$").expect("valid name regex"));

/// Truncate to at most `max` characters, ending in [`TRUNCATION_SUFFIX`]
///
/// Text within the limit is returned unchanged.
pub fn truncate_with_suffix(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(TRUNCATION_SUFFIX.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_SUFFIX);
    out
}

/// Join names into one comma-separated list capped at `max` characters
pub(crate) fn join_capped(names: &[String], max: usize) -> String {
    truncate_with_suffix(&names.join(","), max)
}

/// Restriction action
#[derive(Debug, Default)]
pub struct RestrictionAction {
    limits: RestrictionLimits,
}

impl RestrictionAction {
    pub fn new(limits: RestrictionLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> RestrictionLimits {
        self.limits
    }

    fn is_valid_name(&self, name: &str) -> bool {
        name.chars().count() <= self.limits.max_name_length && NAME_CHARSET.is_match(name)
    }

    /// Remove bad names and truncate long values, collecting what changed
    fn enforce(&self, properties: &mut PropertyMap, invalid: &mut Vec<String>, truncated: &mut Vec<String>) {
        let limits = self.limits;
        properties.retain(|name, value| {
            if is_reserved(name) {
                return true;
            }
            if !self.is_valid_name(name) {
                invalid.push(truncate_with_suffix(name, limits.max_name_length));
                return false;
            }
            if let PropertyValue::String(text) = value
                && text.chars().count() > limits.max_value_length
            {
                *text = truncate_with_suffix(text, limits.max_value_length);
                truncated.push(name.clone());
            }
            true
        });
    }
}

impl Action for RestrictionAction {
    fn name(&self) -> &'static str {
        "restriction"
    }

    fn priority(&self) -> i32 {
        RESTRICTION_PRIORITY
    }

    fn execute(&self, ctx: &mut ActionContext<'_>) -> bool {
        let limits = self.limits;

        let (mut hidden_invalid, mut hidden_truncated) = (Vec::new(), Vec::new());
        self.enforce(ctx.excluded_mut(), &mut hidden_invalid, &mut hidden_truncated);
        if !hidden_invalid.is_empty() || !hidden_truncated.is_empty() {
            debug!(
                event = %ctx.event().name(),
                invalid = hidden_invalid.len(),
                truncated = hidden_truncated.len(),
                "restrictions applied to excluded properties"
            );
        }

        let mut invalid = Vec::new();
        let mut truncated = Vec::new();
        self.enforce(ctx.event_mut().properties_mut(), &mut invalid, &mut truncated);

        if invalid.is_empty() && truncated.is_empty() {
            return true;
        }

        debug!(
            event = %ctx.event().name(),
            invalid = invalid.len(),
            truncated = truncated.len(),
            "property restrictions applied"
        );

        let event = ctx.event_mut();
        if !invalid.is_empty() {
            event.set_reserved(
                reserved::INVALID_PROPERTY_NAMES,
                join_capped(&invalid, limits.max_value_length),
            );
        }
        if !truncated.is_empty() {
            event.set_reserved(
                reserved::TRUNCATED_PROPERTIES,
                join_capped(&truncated, limits.max_value_length),
            );
        }
        true
    }

    fn validate(&self) -> crate::ActionResult<()> {
        self.limits
            .validate()
            .map_err(|e| crate::ActionError::config("restriction", e))
    }
}
