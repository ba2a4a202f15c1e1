//! Store configuration.

use serde::Deserialize;

/// Which backend the store runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackendKind {
    /// In-process map. Data does not survive a restart.
    #[default]
    Memory,
    /// NATS JetStream key-value bucket, with retries.
    Nats,
}

/// Configuration for building a [`TtlStore`](crate::TtlStore).
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackendKind,

    /// NATS server URL. Only used by the `nats` backend.
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// NATS KV bucket name.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Interval between expiry sweeps, in seconds.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,

    /// Optional server-side retention ceiling for the NATS bucket, in
    /// seconds. Unset keeps persistent keys until they are deleted.
    #[serde(default)]
    pub nats_max_age_seconds: Option<u64>,

    /// Total attempts per networked operation, including the first.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Delay between networked attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_bucket() -> String {
    "waybill".to_string()
}

fn default_sweep_interval_seconds() -> u64 {
    60
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackendKind::default(),
            nats_url: default_nats_url(),
            bucket: default_bucket(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
            nats_max_age_seconds: None,
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}
