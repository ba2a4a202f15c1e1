//! Session configuration.

use serde::Deserialize;

/// How sessions are keyed and how long they live.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Sliding expiry in seconds. Refreshed on every read and write.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,

    /// Prefix prepended to the session id to form the store key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_ttl_seconds() -> u64 {
    24 * 3600
}

fn default_key_prefix() -> String {
    "waybill:session:".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
            key_prefix: default_key_prefix(),
        }
    }
}
