//! Manifest directives - Actions declared in a rule's `do` list
//!
//! | Type tag | Options | Priority | Effect |
//! |----------|---------|----------|--------|
//! | `drop` | - | 0 | Stop the chain |
//! | `markPii` | `properties` | 100 | Wrap named string properties as PII |
//! | `throttle` | `mode` (`forcePass`, `forceThrottle`) | 150 | Set the throttling directive |
//! | `excludeChannels` | `channels` | 200 | Disable channels for this event |
//! | `route` | `channel`, `arguments` | 200 | Attach routing arguments |
//! | `renameSuffix` | `suffix` | 250 | Append a suffix to the event name |
//!
//! # Example
//!
//! ```json
//! {"type": "excludeChannels", "channels": ["analytics"]}
//! {"type": "route", "channel": "audit", "arguments": {"table": "logins"}}
//! ```

use std::sync::Arc;

use serde::Deserialize;
use tally_protocol::PropertyValue;
use tally_routing::RouteArguments;
use tracing::debug;

use crate::registry::{ActionConfig, ActionFactory, parse_options};
use crate::{Action, ActionContext, ActionError, ActionResult, ThrottlingDirective};

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

pub const DROP_PRIORITY: i32 = 0;
pub const MARK_PII_PRIORITY: i32 = 100;
pub const THROTTLE_DIRECTIVE_PRIORITY: i32 = 150;
pub const CHANNEL_PRIORITY: i32 = 200;
pub const RENAME_PRIORITY: i32 = 250;

// =============================================================================
// drop
// =============================================================================

/// Stops the chain, dropping the event for non-developer channels
#[derive(Debug, Default)]
pub struct DropAction;

impl Action for DropAction {
    fn name(&self) -> &'static str {
        "drop"
    }

    fn priority(&self) -> i32 {
        DROP_PRIORITY
    }

    fn execute(&self, ctx: &mut ActionContext<'_>) -> bool {
        ctx.counters().record_dropped();
        false
    }
}

pub struct DropFactory;

impl ActionFactory for DropFactory {
    fn create(&self, _config: &ActionConfig) -> ActionResult<Arc<dyn Action>> {
        Ok(Arc::new(DropAction))
    }

    fn name(&self) -> &'static str {
        "drop"
    }
}

// =============================================================================
// markPii
// =============================================================================

/// Wraps named string properties in the PII marker
#[derive(Debug, Clone, Deserialize)]
pub struct MarkPiiAction {
    properties: Vec<String>,
}

impl MarkPiiAction {
    pub fn new(properties: Vec<String>) -> Self {
        Self { properties }
    }
}

impl Action for MarkPiiAction {
    fn name(&self) -> &'static str {
        "markPii"
    }

    fn priority(&self) -> i32 {
        MARK_PII_PRIORITY
    }

    fn execute(&self, ctx: &mut ActionContext<'_>) -> bool {
        let properties = ctx.event_mut().properties_mut();
        for name in &self.properties {
            if let Some(value) = properties.get_mut(name)
                && let PropertyValue::String(raw) = value
            {
                *value = PropertyValue::Pii(std::mem::take(raw));
            }
        }
        true
    }

    fn validate(&self) -> ActionResult<()> {
        if self.properties.is_empty() {
            return Err(ActionError::config("markPii", "properties must not be empty"));
        }
        Ok(())
    }
}

pub struct MarkPiiFactory;

impl ActionFactory for MarkPiiFactory {
    fn create(&self, config: &ActionConfig) -> ActionResult<Arc<dyn Action>> {
        Ok(Arc::new(parse_options::<MarkPiiAction>("markPii", config)?))
    }

    fn name(&self) -> &'static str {
        "markPii"
    }
}

// =============================================================================
// throttle
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
enum DirectiveMode {
    ForcePass,
    ForceThrottle,
}

#[derive(Debug, Deserialize)]
struct ThrottleDirectiveOptions {
    mode: DirectiveMode,
}

/// Overrides the throttling decision for matching events
#[derive(Debug, Clone, Copy)]
pub struct ThrottleDirectiveAction {
    directive: ThrottlingDirective,
}

impl ThrottleDirectiveAction {
    pub fn new(directive: ThrottlingDirective) -> Self {
        Self { directive }
    }
}

impl Action for ThrottleDirectiveAction {
    fn name(&self) -> &'static str {
        "throttle"
    }

    fn priority(&self) -> i32 {
        THROTTLE_DIRECTIVE_PRIORITY
    }

    fn execute(&self, ctx: &mut ActionContext<'_>) -> bool {
        ctx.set_directive(self.directive);
        true
    }

    fn validate(&self) -> ActionResult<()> {
        if self.directive == ThrottlingDirective::Default {
            return Err(ActionError::config("throttle", "mode must force pass or throttle"));
        }
        Ok(())
    }
}

pub struct ThrottleDirectiveFactory;

impl ActionFactory for ThrottleDirectiveFactory {
    fn create(&self, config: &ActionConfig) -> ActionResult<Arc<dyn Action>> {
        let options: ThrottleDirectiveOptions = parse_options("throttle", config)?;
        let directive = match options.mode {
            DirectiveMode::ForcePass => ThrottlingDirective::ForcePass,
            DirectiveMode::ForceThrottle => ThrottlingDirective::ForceThrottle,
        };
        Ok(Arc::new(ThrottleDirectiveAction::new(directive)))
    }

    fn name(&self) -> &'static str {
        "throttle"
    }
}

// =============================================================================
// excludeChannels
// =============================================================================

/// Disables channels for matching events
#[derive(Debug, Clone, Deserialize)]
pub struct ExcludeChannelsAction {
    channels: Vec<String>,
}

impl ExcludeChannelsAction {
    pub fn new(channels: Vec<String>) -> Self {
        Self { channels }
    }
}

impl Action for ExcludeChannelsAction {
    fn name(&self) -> &'static str {
        "excludeChannels"
    }

    fn priority(&self) -> i32 {
        CHANNEL_PRIORITY
    }

    fn execute(&self, ctx: &mut ActionContext<'_>) -> bool {
        for channel in &self.channels {
            ctx.router().disable_channel(channel);
        }
        true
    }

    fn validate(&self) -> ActionResult<()> {
        if self.channels.is_empty() || self.channels.iter().any(String::is_empty) {
            return Err(ActionError::config(
                "excludeChannels",
                "channels must be a non-empty list of ids",
            ));
        }
        Ok(())
    }
}

pub struct ExcludeChannelsFactory;

impl ActionFactory for ExcludeChannelsFactory {
    fn create(&self, config: &ActionConfig) -> ActionResult<Arc<dyn Action>> {
        Ok(Arc::new(parse_options::<ExcludeChannelsAction>(
            "excludeChannels",
            config,
        )?))
    }

    fn name(&self) -> &'static str {
        "excludeChannels"
    }
}

// =============================================================================
// route
// =============================================================================

/// Attaches routing arguments to one channel for matching events
#[derive(Debug, Clone, Deserialize)]
pub struct RouteAction {
    channel: String,
    #[serde(default)]
    arguments: RouteArguments,
}

impl RouteAction {
    pub fn new(channel: impl Into<String>, arguments: RouteArguments) -> Self {
        Self {
            channel: channel.into(),
            arguments,
        }
    }
}

impl Action for RouteAction {
    fn name(&self) -> &'static str {
        "route"
    }

    fn priority(&self) -> i32 {
        CHANNEL_PRIORITY
    }

    fn execute(&self, ctx: &mut ActionContext<'_>) -> bool {
        if !ctx.router().try_add_route_argument(&self.channel, &self.arguments) {
            debug!(channel = %self.channel, "route arguments not attached");
        }
        true
    }

    fn validate(&self) -> ActionResult<()> {
        if self.channel.is_empty() {
            return Err(ActionError::config("route", "channel must not be empty"));
        }
        Ok(())
    }
}

pub struct RouteFactory;

impl ActionFactory for RouteFactory {
    fn create(&self, config: &ActionConfig) -> ActionResult<Arc<dyn Action>> {
        Ok(Arc::new(parse_options::<RouteAction>("route", config)?))
    }

    fn name(&self) -> &'static str {
        "route"
    }
}

// =============================================================================
// renameSuffix
// =============================================================================

/// Appends a suffix to the event name, once
#[derive(Debug, Clone, Deserialize)]
pub struct RenameSuffixAction {
    suffix: String,
}

impl RenameSuffixAction {
    pub fn new(suffix: impl AsRef<str>) -> Self {
        Self {
            suffix: suffix.as_ref().to_lowercase(),
        }
    }
}

impl Action for RenameSuffixAction {
    fn name(&self) -> &'static str {
        "renameSuffix"
    }

    fn priority(&self) -> i32 {
        RENAME_PRIORITY
    }

    fn execute(&self, ctx: &mut ActionContext<'_>) -> bool {
        let name = ctx.event().name();
        if !name.ends_with(&self.suffix) {
            let renamed = format!("{name}{}", self.suffix);
            ctx.event_mut().set_name(renamed);
        }
        true
    }

    fn validate(&self) -> ActionResult<()> {
        if self.suffix.trim().is_empty() {
            return Err(ActionError::config("renameSuffix", "suffix must not be empty"));
        }
        Ok(())
    }
}

pub struct RenameSuffixFactory;

impl ActionFactory for RenameSuffixFactory {
    fn create(&self, config: &ActionConfig) -> ActionResult<Arc<dyn Action>> {
        let action: RenameSuffixAction = parse_options("renameSuffix", config)?;
        Ok(Arc::new(RenameSuffixAction::new(action.suffix)))
    }

    fn name(&self) -> &'static str {
        "renameSuffix"
    }
}
