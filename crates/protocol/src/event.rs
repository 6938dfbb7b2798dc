//! Telemetry event
//!
//! An `Event` is a named bag of properties plus bookkeeping (severity,
//! correlation, post time). Event names are lower-cased on construction so
//! that rule matching is stable.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::reserved::{self, is_reserved};
use crate::{ProtocolError, PropertyValue, Result};

#[cfg(test)]
#[path = "event_test.rs"]
mod tests;

/// Properties keyed by name, ordered for stable serialization
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    Low,
    #[default]
    Normal,
    High,
}

impl Severity {
    /// Numeric level written into `Reserved.Severity`
    #[inline]
    pub const fn level(self) -> i64 {
        match self {
            Self::Low => -10,
            Self::Normal => 0,
            Self::High => 10,
        }
    }

    /// Lowercase name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    /// Parse from a lowercase name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Correlation between events (operation, fault, asset, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Correlation {
    pub id: Uuid,
    pub kind: String,
}

impl Correlation {
    /// Create a correlation with a fresh random id
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
        }
    }
}

/// A telemetry event
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    name: String,
    properties: PropertyMap,
    severity: Severity,
    correlation: Option<Correlation>,
    post_timestamp: DateTime<Utc>,
    opt_out_friendly: bool,
    opt_out_friendly_properties: BTreeSet<String>,
}

impl Event {
    /// Create an event posted now
    ///
    /// The name is lower-cased.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().to_lowercase(),
            properties: PropertyMap::new(),
            severity: Severity::Normal,
            correlation: None,
            post_timestamp: Utc::now(),
            opt_out_friendly: false,
            opt_out_friendly_properties: BTreeSet::new(),
        }
    }

    /// Create an event, rejecting an empty name
    pub fn try_new(name: impl AsRef<str>) -> Result<Self> {
        if name.as_ref().trim().is_empty() {
            return Err(ProtocolError::EmptyEventName);
        }
        Ok(Self::new(name))
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the event (lower-cased)
    pub fn set_name(&mut self, name: impl AsRef<str>) {
        self.name = name.as_ref().to_lowercase();
    }

    #[inline]
    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Mutable access to the property map
    ///
    /// Used by pipeline actions that rewrite properties in place. Callers
    /// building events should use [`Event::set_property`].
    #[inline]
    pub fn properties_mut(&mut self) -> &mut PropertyMap {
        &mut self.properties
    }

    #[inline]
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Set a caller property
    ///
    /// # Errors
    ///
    /// Fails if the name is empty or uses the reserved prefix.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(ProtocolError::EmptyName);
        }
        if is_reserved(&name) {
            return Err(ProtocolError::reserved_name(name));
        }
        self.properties.insert(name, value.into());
        Ok(())
    }

    /// Builder form of [`Event::set_property`]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Result<Self> {
        self.set_property(name, value)?;
        Ok(self)
    }

    /// Write a pipeline-owned property
    ///
    /// Only the pipeline's actions and router call this. Names without the
    /// reserved prefix are refused and logged; returns whether the write
    /// happened.
    #[doc(hidden)]
    pub fn set_reserved(&mut self, name: &str, value: impl Into<PropertyValue>) -> bool {
        if !is_reserved(name) {
            warn!(property = %name, event = %self.name, "refused reserved write outside the namespace");
            return false;
        }
        self.properties.insert(name.to_string(), value.into());
        true
    }

    pub fn remove_property(&mut self, name: &str) -> Option<PropertyValue> {
        self.properties.remove(name)
    }

    #[inline]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn set_severity(&mut self, severity: Severity) {
        self.severity = severity;
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    #[inline]
    pub fn correlation(&self) -> Option<&Correlation> {
        self.correlation.as_ref()
    }

    pub fn set_correlation(&mut self, correlation: Correlation) {
        self.correlation = Some(correlation);
    }

    #[inline]
    pub fn post_timestamp(&self) -> DateTime<Utc> {
        self.post_timestamp
    }

    pub fn set_post_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.post_timestamp = timestamp;
    }

    pub fn with_post_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.post_timestamp = timestamp;
        self
    }

    /// Whether the whole event may be sent for opted-out users
    #[inline]
    pub fn is_opt_out_friendly(&self) -> bool {
        self.opt_out_friendly
    }

    pub fn set_opt_out_friendly(&mut self, friendly: bool) {
        self.opt_out_friendly = friendly;
    }

    /// Allow a single property to be sent for opted-out users
    pub fn mark_property_opt_out_friendly(&mut self, name: impl Into<String>) {
        self.opt_out_friendly_properties.insert(name.into());
    }

    pub fn is_property_opt_out_friendly(&self, name: &str) -> bool {
        self.opt_out_friendly_properties.contains(name)
    }

    /// Whether any property is individually opt-out friendly
    pub fn has_opt_out_friendly_properties(&self) -> bool {
        !self.opt_out_friendly_properties.is_empty()
    }

    /// Stamp severity and correlation into the reserved namespace
    pub fn stamp_bookkeeping(&mut self) {
        self.set_reserved(reserved::SEVERITY, self.severity.level());
        self.set_reserved(reserved::SCHEMA_VERSION, crate::SCHEMA_VERSION);
        if let Some(correlation) = self.correlation.clone() {
            self.set_reserved(reserved::CORRELATION_ID, correlation.id.to_string());
            self.set_reserved(reserved::CORRELATION_TYPE, correlation.kind);
        }
    }
}
