//! Built-in action settings
//!
//! Tuning for the actions every session runs regardless of manifest:
//! throttling exemptions, PII hashing and property restrictions.

use serde::Deserialize;

/// Throttling settings
///
/// Threshold and window come from the active manifest; only exemptions are
/// configured locally.
///
/// ```toml
/// [throttle]
/// passthrough_events = ["app/crash", "app/exit"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Event names never throttled
    /// Default: none
    pub passthrough_events: Vec<String>,
}

/// PII hashing settings
///
/// ```toml
/// [pii]
/// hash_key = "per-product secret"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PiiConfig {
    /// HMAC key for PII hashes
    /// Default: built-in key
    pub hash_key: Option<String>,
}

/// Property restriction limits
///
/// ```toml
/// [restrictions]
/// max_name_length = 150
/// max_value_length = 1024
/// max_complex_length = 61440
/// max_list_length = 1024
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RestrictionsConfig {
    /// Longest property name kept
    /// Default: 150
    pub max_name_length: usize,

    /// Longest string value before truncation
    /// Default: 1024
    pub max_value_length: usize,

    /// Longest serialized complex value
    /// Default: 61440
    pub max_complex_length: usize,

    /// Most list elements serialized per complex value
    /// Default: 1024
    pub max_list_length: usize,
}

impl Default for RestrictionsConfig {
    fn default() -> Self {
        Self {
            max_name_length: 150,
            max_value_length: 1024,
            max_complex_length: 61_440,
            max_list_length: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restriction_defaults() {
        let config: RestrictionsConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_name_length, 150);
        assert_eq!(config.max_value_length, 1024);
        assert_eq!(config.max_complex_length, 61_440);
        assert_eq!(config.max_list_length, 1024);
    }

    #[test]
    fn test_passthrough_events() {
        let config: ThrottleConfig =
            toml::from_str(r#"passthrough_events = ["app/crash"]"#).unwrap();
        assert_eq!(config.passthrough_events, vec!["app/crash"]);
    }

    #[test]
    fn test_pii_key_optional() {
        let config: PiiConfig = toml::from_str("").unwrap();
        assert!(config.hash_key.is_none());

        let config: PiiConfig = toml::from_str(r#"hash_key = "k""#).unwrap();
        assert_eq!(config.hash_key.as_deref(), Some("k"));
    }
}
