//! Manifest loading configuration

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Manifest source settings
///
/// Without a path the built-in manifest stays active for the whole session.
///
/// ```toml
/// [manifest]
/// path = "/etc/tally/manifest.json"
/// reload_interval = "5m"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// JSON manifest file
    /// Default: none
    pub path: Option<PathBuf>,

    /// How often the file is re-read
    /// Default: 5m
    #[serde(with = "humantime_serde")]
    pub reload_interval: Duration,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            path: None,
            reload_interval: Duration::from_secs(5 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ManifestConfig::default();
        assert!(config.path.is_none());
        assert_eq!(config.reload_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_humantime_intervals() {
        for (s, expected) in [
            ("30s", Duration::from_secs(30)),
            ("1m", Duration::from_secs(60)),
            ("1h", Duration::from_secs(3600)),
        ] {
            let toml = format!("reload_interval = \"{}\"", s);
            let config: ManifestConfig = toml::from_str(&toml).unwrap();
            assert_eq!(config.reload_interval, expected);
        }
    }
}
