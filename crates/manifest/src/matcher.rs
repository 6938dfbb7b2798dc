//! Event predicates
//!
//! A rule's `when` clause is a small tree:
//!
//! | JSON | Predicate |
//! |------|-----------|
//! | `{"event": "app/start"}` | Name equals (case-insensitive) |
//! | `{"event": "app/*"}` | Name starts with `app/` |
//! | `{"flightName": "f", "rate": 0.1, "inputs": ["userId"]}` | Sampled in for this session |
//! | `{"all": [...]}` | Every child matches |
//! | `{"any": [...]}` | Some child matches |
//! | `{"not": {...}}` | Child does not match |
//!
//! Sampling predicates do not hash per event: their decision is computed
//! once when the manifest is installed (see [`EventMatch::for_each_sampling`])
//! and read back on every evaluation. An uncomputed decision reads as
//! inactive.

use std::sync::OnceLock;

use serde::Deserialize;
use tally_protocol::Event;
use tally_transform::SessionIdentity;

use crate::sampling::{KeySource, SamplingInput, calculate_is_sample_active};

#[cfg(test)]
#[path = "matcher_test.rs"]
mod tests;

/// Trailing wildcard in name patterns
pub const WILDCARD: char = '*';

// =============================================================================
// Name
// =============================================================================

/// Event name equality or prefix match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatch {
    pattern: String,
    prefix: bool,
}

impl NameMatch {
    /// Pattern is lower-cased; a trailing `*` makes it a prefix match
    pub fn new(pattern: impl AsRef<str>) -> Self {
        let lowered = pattern.as_ref().to_lowercase();
        match lowered.strip_suffix(WILDCARD) {
            Some(prefix) => Self {
                pattern: prefix.to_string(),
                prefix: true,
            },
            None => Self {
                pattern: lowered,
                prefix: false,
            },
        }
    }

    /// Event names are lower-cased on construction, so plain comparison
    /// against the lower-cased pattern is case-insensitive.
    pub fn matches(&self, name: &str) -> bool {
        if self.prefix {
            name.starts_with(&self.pattern)
        } else {
            name == self.pattern
        }
    }

    pub fn is_prefix(&self) -> bool {
        self.prefix
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.prefix && self.pattern.is_empty() {
            return Err("event name must not be empty".into());
        }
        if self.pattern.contains(WILDCARD) {
            return Err(format!(
                "'{}' may only use '*' as the last character",
                self.pattern
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Sampling
// =============================================================================

/// Session-level sampling gate
#[derive(Debug)]
pub struct SamplingMatch {
    flight_name: String,
    rate: f64,
    inputs: Vec<SamplingInput>,
    decision: OnceLock<bool>,
}

impl SamplingMatch {
    /// Inputs are put in canonical order and deduplicated
    pub fn new(flight_name: impl Into<String>, rate: f64, mut inputs: Vec<SamplingInput>) -> Self {
        inputs.sort_unstable();
        inputs.dedup();
        Self {
            flight_name: flight_name.into(),
            rate,
            inputs,
            decision: OnceLock::new(),
        }
    }

    pub fn flight_name(&self) -> &str {
        &self.flight_name
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn inputs(&self) -> &[SamplingInput] {
        &self.inputs
    }

    /// Fully-qualified sampling name: `<rule>.<flight>`
    pub fn sampling_id(&self, rule_name: &str) -> String {
        format!("{rule_name}.{}", self.flight_name)
    }

    /// Compute and cache the decision for a session
    ///
    /// The first computation wins; a manifest instance serves one session.
    pub fn compute(&self, rule_name: &str, identity: &SessionIdentity) -> bool {
        *self.decision.get_or_init(|| {
            let sampling_id = self.sampling_id(rule_name);
            calculate_is_sample_active(
                self.rate,
                &self.inputs,
                KeySource {
                    identity,
                    rule_name,
                    sampling_id: &sampling_id,
                },
            )
        })
    }

    /// Cached decision, inactive if never computed
    pub fn is_active(&self) -> bool {
        self.decision.get().copied().unwrap_or(false)
    }

    pub fn is_computed(&self) -> bool {
        self.decision.get().is_some()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.flight_name.trim().is_empty() {
            return Err("flightName must not be empty".into());
        }
        if !(0.0..=1.0).contains(&self.rate) {
            return Err(format!("rate {} outside [0, 1]", self.rate));
        }
        Ok(())
    }
}

// =============================================================================
// Tree
// =============================================================================

/// JSON shape of a predicate
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MatchDocument {
    Name {
        event: String,
    },
    Sampling {
        #[serde(rename = "flightName")]
        flight_name: String,
        rate: f64,
        #[serde(default)]
        inputs: Vec<SamplingInput>,
    },
    All {
        all: Vec<MatchDocument>,
    },
    Any {
        any: Vec<MatchDocument>,
    },
    Not {
        not: Box<MatchDocument>,
    },
}

/// Predicate tree node
#[derive(Debug, Deserialize)]
#[serde(from = "MatchDocument")]
pub enum EventMatch {
    Name(NameMatch),
    Sampling(SamplingMatch),
    All(Vec<EventMatch>),
    Any(Vec<EventMatch>),
    Not(Box<EventMatch>),
}

impl From<MatchDocument> for EventMatch {
    fn from(doc: MatchDocument) -> Self {
        match doc {
            MatchDocument::Name { event } => Self::Name(NameMatch::new(event)),
            MatchDocument::Sampling {
                flight_name,
                rate,
                inputs,
            } => Self::Sampling(SamplingMatch::new(flight_name, rate, inputs)),
            MatchDocument::All { all } => Self::All(all.into_iter().map(Self::from).collect()),
            MatchDocument::Any { any } => Self::Any(any.into_iter().map(Self::from).collect()),
            MatchDocument::Not { not } => Self::Not(Box::new(Self::from(*not))),
        }
    }
}

impl EventMatch {
    pub fn name(pattern: impl AsRef<str>) -> Self {
        Self::Name(NameMatch::new(pattern))
    }

    pub fn sampling(flight_name: impl Into<String>, rate: f64, inputs: Vec<SamplingInput>) -> Self {
        Self::Sampling(SamplingMatch::new(flight_name, rate, inputs))
    }

    /// Evaluate against an event
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            Self::Name(m) => m.matches(event.name()),
            Self::Sampling(m) => m.is_active(),
            Self::All(children) => children.iter().all(|c| c.matches(event)),
            Self::Any(children) => children.iter().any(|c| c.matches(event)),
            Self::Not(child) => !child.matches(event),
        }
    }

    /// Direct children of this node
    pub fn children(&self) -> &[EventMatch] {
        match self {
            Self::All(children) | Self::Any(children) => children,
            Self::Not(child) => std::slice::from_ref(child.as_ref()),
            Self::Name(_) | Self::Sampling(_) => &[],
        }
    }

    /// Validate this node and every descendant
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Name(m) => m.validate()?,
            Self::Sampling(m) => m.validate()?,
            Self::All(children) | Self::Any(children) if children.is_empty() => {
                return Err("combinator must have at least one child".into());
            }
            _ => {}
        }
        self.children().iter().try_for_each(EventMatch::validate)
    }

    /// Visit every sampling node in the tree
    pub fn for_each_sampling(&self, f: &mut dyn FnMut(&SamplingMatch)) {
        if let Self::Sampling(m) = self {
            f(m);
        }
        for child in self.children() {
            child.for_each_sampling(f);
        }
    }
}
