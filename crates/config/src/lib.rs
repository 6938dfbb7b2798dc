//! Tally Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! An empty file is a valid config - only specify what you need to change.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use tally_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[session]\nqueue_size = 500").unwrap();
//! assert_eq!(config.session.queue_size, 500);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! level = "debug"
//!
//! [session]
//! user_id = "u-1234"
//! drain_timeout = "2s"
//!
//! [throttle]
//! passthrough_events = ["app/crash"]
//!
//! [manifest]
//! path = "manifest.json"
//! reload_interval = "10m"
//! ```

mod actions;
mod error;
mod logging;
mod manifest;
mod session;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use actions::{PiiConfig, RestrictionsConfig, ThrottleConfig};
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogLevel};
pub use manifest::ManifestConfig;
pub use session::SessionConfig;

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Session identity, consent and ingress
    pub session: SessionConfig,

    /// Throttling exemptions
    pub throttle: ThrottleConfig,

    /// PII hashing
    pub pii: PiiConfig,

    /// Property restriction limits
    pub restrictions: RestrictionsConfig,

    /// Manifest source
    pub manifest: ManifestConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML, or fails
    /// validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.log.level, LogLevel::Info);
        assert_eq!(config.session.queue_size, 10_000);
        assert!(config.throttle.passthrough_events.is_empty());
        assert!(config.manifest.path.is_none());
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[log]
level = "debug"

[session]
machine_id = "m-1"
user_id = "u-1"
opted_in = false
collect_pii = true
queue_size = 64
drain_timeout = "2s"

[throttle]
passthrough_events = ["app/crash"]

[pii]
hash_key = "secret"

[restrictions]
max_name_length = 64
max_value_length = 256

[manifest]
path = "manifest.json"
reload_interval = "10m"
"#;
        let config = Config::from_str(toml).unwrap();

        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.session.machine_id, "m-1");
        assert!(!config.session.opted_in);
        assert!(config.session.collect_pii);
        assert_eq!(config.session.queue_size, 64);
        assert_eq!(config.session.drain_timeout, Duration::from_secs(2));
        assert_eq!(config.throttle.passthrough_events, vec!["app/crash"]);
        assert_eq!(config.pii.hash_key.as_deref(), Some("secret"));
        assert_eq!(config.restrictions.max_name_length, 64);
        assert_eq!(config.restrictions.max_complex_length, 61_440);
        assert_eq!(
            config.manifest.path.as_deref(),
            Some(Path::new("manifest.json"))
        );
        assert_eq!(config.manifest.reload_interval, Duration::from_secs(600));
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_str("invalid { toml");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_from_file_missing() {
        let result = Config::from_file("/nonexistent/tally.toml");
        assert!(matches!(result, Err(ConfigError::IoError { .. })));
    }
}
