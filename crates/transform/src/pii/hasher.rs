//! PII hasher
//!
//! HMAC-SHA256 based deterministic hashing of PII values.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix of every hashed PII value
pub const HASH_PREFIX: &str = "pii_";

/// Key used when none is configured
pub const DEFAULT_HASH_KEY: &str = "tally-pii-default-key";

/// One-way hasher for PII values
#[derive(Clone)]
pub struct PiiHasher {
    mac: HmacSha256,
}

impl PiiHasher {
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self {
            mac: HmacSha256::new_from_slice(key.as_ref()).expect("HMAC can take key of any size"),
        }
    }

    /// Hash a value into `pii_<base62(hmac[:12])>`
    pub fn hash(&self, value: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(value.as_bytes());
        let hash_bytes = mac.finalize().into_bytes();

        let mut num_bytes = [0u8; 16];
        num_bytes[..12].copy_from_slice(&hash_bytes[..12]);
        let num = u128::from_le_bytes(num_bytes);

        format!("{HASH_PREFIX}{}", base62::encode(num))
    }
}

impl Default for PiiHasher {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_KEY)
    }
}

impl std::fmt::Debug for PiiHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PiiHasher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}
