//! Configuration validation
//!
//! Rejects values the pipeline cannot run with:
//! - Zero-sized queues, limits too short to truncate into
//! - Zero reload interval
//! - Empty PII key or passthrough names

use crate::Config;
use crate::error::{ConfigError, Result};

/// Shortest limit that still leaves room for the `...` truncation suffix
const MIN_TRUNCATED_LENGTH: usize = 4;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_session(config)?;
    validate_actions(config)?;
    validate_manifest(config)?;
    Ok(())
}

fn validate_session(config: &Config) -> Result<()> {
    if config.session.queue_size == 0 {
        return Err(ConfigError::invalid_value(
            "session",
            "queue_size",
            "must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_actions(config: &Config) -> Result<()> {
    if config
        .throttle
        .passthrough_events
        .iter()
        .any(|name| name.trim().is_empty())
    {
        return Err(ConfigError::invalid_value(
            "throttle",
            "passthrough_events",
            "event names must not be empty",
        ));
    }

    if config.pii.hash_key.as_deref().is_some_and(str::is_empty) {
        return Err(ConfigError::invalid_value(
            "pii",
            "hash_key",
            "must not be empty when set",
        ));
    }

    let limits = &config.restrictions;
    for (field, value, min) in [
        ("max_name_length", limits.max_name_length, MIN_TRUNCATED_LENGTH),
        ("max_value_length", limits.max_value_length, MIN_TRUNCATED_LENGTH),
        ("max_complex_length", limits.max_complex_length, MIN_TRUNCATED_LENGTH),
        ("max_list_length", limits.max_list_length, 1),
    ] {
        if value < min {
            return Err(ConfigError::invalid_value(
                "restrictions",
                field,
                format!("must be at least {min}"),
            ));
        }
    }
    Ok(())
}

fn validate_manifest(config: &Config) -> Result<()> {
    if config.manifest.reload_interval.is_zero() {
        return Err(ConfigError::invalid_value(
            "manifest",
            "reload_interval",
            "must be greater than 0",
        ));
    }
    Ok(())
}
