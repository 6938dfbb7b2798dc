//! Session configuration
//!
//! Identity, consent and ingress settings for a telemetry session.

use serde::Deserialize;
use std::time::Duration;

/// Session configuration
///
/// # Example
///
/// ```toml
/// [session]
/// machine_id = "build-agent-7"
/// user_id = "u-1234"
/// opted_in = true
/// collect_pii = false
/// queue_size = 10000
/// drain_timeout = "5s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Stable machine identifier used for sampling
    /// Default: empty
    pub machine_id: String,

    /// User identifier used for sampling
    /// Default: empty
    pub user_id: String,

    /// Whether the user consented to full telemetry
    /// Default: true
    pub opted_in: bool,

    /// Whether raw PII may travel next to its hash
    /// Default: false
    pub collect_pii: bool,

    /// Capacity of the ingress queue; posts beyond it are dropped
    /// Default: 10000
    pub queue_size: usize,

    /// Time allowed for channels to flush on shutdown
    /// Default: 5s
    #[serde(with = "humantime_serde")]
    pub drain_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            machine_id: String::new(),
            user_id: String::new(),
            opted_in: true,
            collect_pii: false,
            queue_size: 10_000,
            drain_timeout: Duration::from_secs(5),
        }
    }
}
