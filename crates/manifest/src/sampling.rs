//! Deterministic sampling
//!
//! A sampling decision hashes a key built from session identity values,
//! so the same session always lands on the same side of a flight.
//!
//! # Algorithm
//!
//! 1. `rate <= 0` is never active, `rate >= 1` always active
//! 2. Join the selected inputs in canonical order
//!    (machine, user, rule, sampling id, session) with `.`, skipping empty
//!    values. An empty key is never active.
//! 3. SHA-256 the key and read the first 8 bytes as a little-endian `u64`
//! 4. Active iff that value is `<= rate * u64::MAX`

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tally_transform::SessionIdentity;

#[cfg(test)]
#[path = "sampling_test.rs"]
mod tests;

/// Separator between key components
pub const KEY_SEPARATOR: &str = ".";

/// Identity value feeding a sampling key
///
/// Variant order is the canonical key order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SamplingInput {
    MachineId,
    UserId,
    RuleId,
    SamplingId,
    SessionId,
}

impl SamplingInput {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MachineId => "machineId",
            Self::UserId => "userId",
            Self::RuleId => "ruleId",
            Self::SamplingId => "samplingId",
            Self::SessionId => "sessionId",
        }
    }
}

/// Values a sampling key can draw from
#[derive(Debug, Clone, Copy)]
pub struct KeySource<'a> {
    pub identity: &'a SessionIdentity,
    pub rule_name: &'a str,
    pub sampling_id: &'a str,
}

impl KeySource<'_> {
    fn value(&self, input: SamplingInput) -> &str {
        match input {
            SamplingInput::MachineId => &self.identity.machine_id,
            SamplingInput::UserId => &self.identity.user_id,
            SamplingInput::RuleId => self.rule_name,
            SamplingInput::SamplingId => self.sampling_id,
            SamplingInput::SessionId => &self.identity.session_id,
        }
    }
}

/// Build the sampling key for a set of inputs
///
/// `inputs` must be sorted and free of duplicates.
pub fn sampling_key(inputs: &[SamplingInput], source: KeySource<'_>) -> String {
    inputs
        .iter()
        .map(|&input| source.value(input))
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

/// First 8 bytes of SHA-256(key), little-endian
pub fn key_hash(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Whether a key falls inside a sampling rate
///
/// An empty key is never active, whatever the rate.
pub fn is_sample_active(rate: f64, key: &str) -> bool {
    if key.is_empty() || rate.is_nan() || rate <= 0.0 {
        return false;
    }
    if rate >= 1.0 {
        return true;
    }

    // Float-to-int casts saturate
    let threshold = (rate * u64::MAX as f64) as u64;
    key_hash(key) <= threshold
}

/// Sampling decision for a rule in a session
pub fn calculate_is_sample_active(rate: f64, inputs: &[SamplingInput], source: KeySource<'_>) -> bool {
    is_sample_active(rate, &sampling_key(inputs, source))
}
