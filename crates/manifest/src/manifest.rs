//! Manifest - Versioned rule set
//!
//! # Document
//!
//! ```json
//! {
//!   "version": "2024-05-01.1",
//!   "throttlingThreshold": 500,
//!   "throttlingTimerReset": 30,
//!   "rules": [
//!     {
//!       "name": "hide-debug",
//!       "when": {"event": "app/debug/*"},
//!       "do": [{"type": "excludeChannels", "channels": ["analytics"]}]
//!     }
//!   ]
//! }
//! ```
//!
//! # Validation
//!
//! Only the top level can fail a load. A rule with no name, a bad `when`,
//! or no surviving actions is dropped; an action with an unknown type or
//! bad options is dropped. Both are counted, with names, in the
//! [`ValidationReport`].

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tally_protocol::Event;
use tally_transform::{
    Action, ActionRegistry, ManifestCounters, SessionIdentity, ThrottleSettings,
};
use tracing::{debug, warn};

use crate::{EventMatch, ManifestError, Result};

#[cfg(test)]
#[path = "manifest_test.rs"]
mod tests;

/// Version of the built-in manifest
pub const DEFAULT_VERSION: &str = "default";

/// Default events allowed per throttle window
pub const DEFAULT_THROTTLE_THRESHOLD: u64 = 1000;

/// Default throttle window
pub const DEFAULT_THROTTLE_RESET: Duration = Duration::from_secs(60);

/// Name recorded for rules without one
const UNNAMED_RULE: &str = "<unnamed>";

// =============================================================================
// Rule
// =============================================================================

/// Named predicate with its actions
pub struct Rule {
    name: String,
    when: EventMatch,
    actions: Vec<Arc<dyn Action>>,
}

impl Rule {
    pub fn new(name: impl Into<String>, when: EventMatch, actions: Vec<Arc<dyn Action>>) -> Self {
        Self {
            name: name.into(),
            when,
            actions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn when(&self) -> &EventMatch {
        &self.when
    }

    pub fn actions(&self) -> &[Arc<dyn Action>] {
        &self.actions
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.when.matches(event)
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("when", &self.when)
            .field(
                "actions",
                &self.actions.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// =============================================================================
// Validation report
// =============================================================================

/// Units dropped while loading a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub invalid_rules: usize,
    pub invalid_actions: usize,
    /// Names of dropped rules
    pub invalid_rule_names: Vec<String>,
    /// `<rule>/<type>` of dropped actions
    pub invalid_action_names: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.invalid_rules == 0 && self.invalid_actions == 0
    }

    fn reject_rule(&mut self, name: &str, reason: &str) {
        warn!(rule = %name, reason, "manifest rule dropped");
        self.invalid_rules += 1;
        self.invalid_rule_names.push(name.to_string());
    }

    fn reject_action(&mut self, rule: &str, action: &str, reason: &str) {
        warn!(rule = %rule, action = %action, reason, "manifest action dropped");
        self.invalid_actions += 1;
        self.invalid_action_names.push(format!("{rule}/{action}"));
    }
}

// =============================================================================
// Document shapes
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestDocument {
    version: String,
    #[serde(default)]
    rules: Vec<Value>,
    throttling_threshold: Option<u64>,
    /// Seconds
    throttling_timer_reset: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RuleDocument {
    #[serde(default)]
    name: String,
    when: Option<EventMatch>,
    #[serde(rename = "do", default)]
    actions: Vec<Value>,
}

// =============================================================================
// Manifest
// =============================================================================

/// Immutable, validated rule set
///
/// Replaced wholesale, never mutated after load. Also carries the counters
/// accumulated while it was active.
pub struct Manifest {
    version: String,
    rules: Vec<Rule>,
    throttle: ThrottleSettings,
    report: ValidationReport,
    counters: ManifestCounters,
}

impl Manifest {
    /// Build a manifest from rules, dropping invalid ones
    pub fn new(version: impl Into<String>, rules: Vec<Rule>, throttle: ThrottleSettings) -> Self {
        let mut manifest = Self {
            version: version.into(),
            rules,
            throttle,
            report: ValidationReport::default(),
            counters: ManifestCounters::new(),
        };
        manifest.validate();
        manifest
    }

    /// The built-in manifest: no rules, default throttling
    pub fn default_manifest() -> Self {
        Self::new(
            DEFAULT_VERSION,
            Vec::new(),
            ThrottleSettings {
                threshold: DEFAULT_THROTTLE_THRESHOLD,
                reset_window: DEFAULT_THROTTLE_RESET,
            },
        )
    }

    /// Parse a manifest document
    ///
    /// # Errors
    ///
    /// Fails only if the document is not JSON, lacks `version`, or has an
    /// empty `version`. Rule-level problems are recorded in the report.
    pub fn parse(json: &str, registry: &ActionRegistry) -> Result<Self> {
        let doc: ManifestDocument = serde_json::from_str(json)?;
        Self::from_document(doc, registry)
    }

    /// Parse a manifest from an already-decoded JSON value
    pub fn from_value(value: Value, registry: &ActionRegistry) -> Result<Self> {
        let doc: ManifestDocument = serde_json::from_value(value)?;
        Self::from_document(doc, registry)
    }

    fn from_document(doc: ManifestDocument, registry: &ActionRegistry) -> Result<Self> {
        if doc.version.trim().is_empty() {
            return Err(ManifestError::invalid("version must not be empty"));
        }

        let mut report = ValidationReport::default();
        let mut rules = Vec::with_capacity(doc.rules.len());

        for raw in doc.rules {
            let fallback_name = raw
                .get("name")
                .and_then(Value::as_str)
                .filter(|n| !n.is_empty())
                .unwrap_or(UNNAMED_RULE)
                .to_string();

            let rule_doc: RuleDocument = match serde_json::from_value(raw) {
                Ok(r) => r,
                Err(e) => {
                    report.reject_rule(&fallback_name, &e.to_string());
                    continue;
                }
            };

            let Some(when) = rule_doc.when else {
                report.reject_rule(&fallback_name, "missing 'when'");
                continue;
            };

            let mut actions = Vec::with_capacity(rule_doc.actions.len());
            for action in &rule_doc.actions {
                match registry.create_from_json(action) {
                    Ok(a) => actions.push(a),
                    Err(e) => {
                        let type_name = action
                            .get("type")
                            .and_then(Value::as_str)
                            .unwrap_or("?");
                        report.reject_action(&fallback_name, type_name, &e.to_string());
                    }
                }
            }

            rules.push(Rule::new(rule_doc.name, when, actions));
        }

        let throttle = ThrottleSettings {
            threshold: doc
                .throttling_threshold
                .unwrap_or(DEFAULT_THROTTLE_THRESHOLD),
            reset_window: doc
                .throttling_timer_reset
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_THROTTLE_RESET),
        };

        let mut manifest = Self {
            version: doc.version,
            rules,
            throttle,
            report,
            counters: ManifestCounters::new(),
        };
        manifest.validate();

        debug!(
            version = %manifest.version,
            rules = manifest.rules.len(),
            invalid_rules = manifest.report.invalid_rules,
            invalid_actions = manifest.report.invalid_actions,
            "manifest parsed"
        );
        Ok(manifest)
    }

    /// Drop rules and actions that fail structural checks
    ///
    /// Checks: non-empty rule name, valid predicate tree, every action valid,
    /// at least one action left.
    fn validate(&mut self) {
        let report = &mut self.report;
        self.rules.retain_mut(|rule| {
            if rule.name.trim().is_empty() {
                report.reject_rule(UNNAMED_RULE, "empty name");
                return false;
            }
            if let Err(reason) = rule.when.validate() {
                report.reject_rule(&rule.name, &reason);
                return false;
            }
            let name = rule.name.clone();
            rule.actions.retain(|action| match action.validate() {
                Ok(()) => true,
                Err(e) => {
                    report.reject_action(&name, action.name(), &e.to_string());
                    false
                }
            });
            if rule.actions.is_empty() {
                report.reject_rule(&rule.name, "no valid actions");
                return false;
            }
            true
        });
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn throttle_settings(&self) -> ThrottleSettings {
        self.throttle
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    /// Counters accumulated while this manifest was active
    pub fn counters(&self) -> &ManifestCounters {
        &self.counters
    }

    /// Actions of every rule matching the event, in rule then declaration order
    pub fn actions_for<'a>(&'a self, event: &'a Event) -> impl Iterator<Item = &'a Arc<dyn Action>> + 'a {
        self.rules
            .iter()
            .filter(move |rule| rule.matches(event))
            .flat_map(|rule| rule.actions.iter())
    }

    /// Collected form of [`Manifest::actions_for`]
    pub fn get_actions_for_event(&self, event: &Event) -> Vec<Arc<dyn Action>> {
        self.actions_for(event).cloned().collect()
    }

    /// Compute every sampling decision for a session
    ///
    /// Returns the number of sampling predicates that are active.
    pub fn compute_sampling(&self, identity: &SessionIdentity) -> usize {
        let mut active = 0;
        for rule in &self.rules {
            rule.when.for_each_sampling(&mut |sampling| {
                if sampling.compute(&rule.name, identity) {
                    active += 1;
                }
            });
        }
        active
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::default_manifest()
    }
}

impl std::fmt::Debug for Manifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manifest")
            .field("version", &self.version)
            .field("rules", &self.rules.len())
            .field("throttle", &self.throttle)
            .field("report", &self.report)
            .finish()
    }
}
