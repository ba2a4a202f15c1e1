//! The store facade used by the rest of the system.

use crate::backend::KeyValueBackend;
use crate::config::{StoreBackendKind, StoreConfig};
use crate::error::StoreError;
use crate::memory::MemoryBackend;
use crate::nats::{NatsKvBackend, NatsKvConfig};
use crate::retry::{RetryPolicy, Retrying};
use rootcause::prelude::Report;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// A TTL key-value store that never raises after startup.
///
/// Only [`initialize`](Self::initialize) returns an error. Every other
/// operation logs backend failures and reports them as an absent value or
/// `false`, so callers cannot tell a failed read from a missing key.
///
/// Cloning is cheap; clones share the same backend.
#[derive(Clone)]
pub struct TtlStore {
    backend: Arc<dyn KeyValueBackend>,
}

impl fmt::Debug for TtlStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlStore")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl TtlStore {
    /// Wraps an arbitrary backend.
    pub fn new(backend: impl KeyValueBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Creates a store on a fresh in-process backend.
    #[must_use]
    pub fn memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Builds the backend named by `config`. The networked backend gets the
    /// configured retry policy; the in-process one never fails transiently.
    #[must_use]
    pub fn from_config(config: &StoreConfig) -> Self {
        match config.backend {
            StoreBackendKind::Memory => Self::new(MemoryBackend::with_sweep_interval(
                Duration::from_secs(config.sweep_interval_seconds.max(1)),
            )),
            StoreBackendKind::Nats => {
                let nats = NatsKvBackend::new(NatsKvConfig {
                    url: config.nats_url.clone(),
                    bucket: Some(config.bucket.clone()),
                    max_age: config.nats_max_age_seconds.map(Duration::from_secs),
                    sweep_interval: Some(Duration::from_secs(config.sweep_interval_seconds)),
                });
                let policy = RetryPolicy::new(
                    config.retry_attempts,
                    Duration::from_millis(config.retry_delay_ms),
                );
                Self::new(Retrying::new(nats, policy))
            }
        }
    }

    /// Name of the underlying backend.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Brings the backend up.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the backend cannot be
    /// initialized (after its own retries, if any).
    pub async fn initialize(&self) -> Result<(), Report<StoreError>> {
        self.backend
            .initialize()
            .await
            .map_err(|e| StoreError::Unavailable {
                backend: self.backend.name().to_string(),
                reason: e.to_string(),
            })?;
        info!(backend = self.backend.name(), "store ready");
        Ok(())
    }

    /// Shuts the backend down, stopping any background sweep.
    pub async fn close(&self) {
        self.backend.close().await;
    }

    /// Returns the value for `key`, or `None` if absent, expired, or the
    /// backend failed.
    pub async fn get(&self, key: &str) -> Option<String> {
        match self.backend.get(key).await {
            Ok(value) => value,
            Err(e) => {
                error!(key, error = %e, "store get failed");
                None
            }
        }
    }

    /// Stores `value` under `key`. `expire_seconds = None` makes the key
    /// persistent. Returns whether the write succeeded.
    pub async fn set(&self, key: &str, value: &str, expire_seconds: Option<u64>) -> bool {
        let ttl = expire_seconds.map(Duration::from_secs);
        match self.backend.set(key, value, ttl).await {
            Ok(()) => true,
            Err(e) => {
                error!(key, error = %e, "store set failed");
                false
            }
        }
    }

    /// Removes `key`. Returns whether a live value was removed.
    pub async fn delete(&self, key: &str) -> bool {
        match self.backend.delete(key).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(key, error = %e, "store delete failed");
                false
            }
        }
    }

    /// Reports whether the backend is up.
    pub async fn ping(&self) -> bool {
        self.backend.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Backend on which every operation fails.
    struct BrokenBackend;

    fn broken(operation: &str) -> StoreError {
        StoreError::Transient {
            operation: operation.to_string(),
            reason: "connection refused".to_string(),
        }
    }

    #[async_trait]
    impl KeyValueBackend for BrokenBackend {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn initialize(&self) -> Result<(), StoreError> {
            Err(broken("initialize"))
        }

        async fn close(&self) {}

        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(broken("get"))
        }

        async fn set(
            &self,
            _key: &str,
            _value: &str,
            _ttl: Option<Duration>,
        ) -> Result<(), StoreError> {
            Err(broken("set"))
        }

        async fn delete(&self, _key: &str) -> Result<bool, StoreError> {
            Err(broken("delete"))
        }

        async fn ping(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn failed_initialize_is_reported_as_unavailable() {
        let store = TtlStore::new(BrokenBackend);

        let err = store.initialize().await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("broken store unavailable"));
        assert!(message.contains("connection refused"));
    }

    #[tokio::test]
    async fn operational_failures_do_not_raise() {
        let store = TtlStore::new(BrokenBackend);

        assert_eq!(store.get("k").await, None);
        assert!(!store.set("k", "v", Some(10)).await);
        assert!(!store.delete("k").await);
        assert!(!store.ping().await);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_through_the_facade() {
        let store = TtlStore::memory();
        store.initialize().await.unwrap();

        assert!(store.set("k", "v", Some(10)).await);
        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(store.get("k").await.as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get("k").await, None);
        store.close().await;
    }

    #[tokio::test]
    async fn out_of_range_expiry_fails_without_panicking() {
        let store = TtlStore::memory();
        store.initialize().await.unwrap();

        assert!(!store.set("k", "v", Some(u64::MAX)).await);
        assert_eq!(store.get("k").await, None);
        assert!(store.set("k", "v", Some(60)).await);
        store.close().await;
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = TtlStore::memory();
        store.initialize().await.unwrap();
        store.set("k", "v", None).await;

        assert!(store.delete("k").await);
        assert!(!store.delete("k").await);
        assert_eq!(store.get("k").await, None);
        store.close().await;
    }

    #[tokio::test]
    async fn clones_share_the_backend() {
        let store = TtlStore::memory();
        store.initialize().await.unwrap();
        let other = store.clone();

        other.set("k", "v", None).await;

        assert_eq!(store.get("k").await.as_deref(), Some("v"));
        store.close().await;
    }

    #[test]
    fn from_config_selects_backend() {
        let memory = TtlStore::from_config(&StoreConfig::default());
        let nats = TtlStore::from_config(&StoreConfig {
            backend: StoreBackendKind::Nats,
            ..StoreConfig::default()
        });

        assert_eq!(memory.backend_name(), "memory");
        assert_eq!(nats.backend_name(), "nats");
    }
}
