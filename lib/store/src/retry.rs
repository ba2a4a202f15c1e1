//! Bounded retries for key-value backends.
//!
//! [`Retrying`] wraps any [`KeyValueBackend`] and retries operations that
//! fail with a transient error, waiting a fixed delay between attempts.
//! Non-transient errors and the last transient error are returned as-is.

use crate::backend::KeyValueBackend;
use crate::error::StoreError;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. At least 1.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Creates a retry policy. `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// A backend decorated with a [`RetryPolicy`].
pub struct Retrying<B> {
    inner: B,
    policy: RetryPolicy,
}

impl<B: KeyValueBackend> Retrying<B> {
    /// Wraps `inner` with the given policy.
    pub fn new(inner: B, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Returns the wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    async fn attempt<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                    warn!(
                        backend = self.inner.name(),
                        operation,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "store operation failed, retrying"
                    );
                    tokio::time::sleep(self.policy.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        error!(
                            backend = self.inner.name(),
                            operation,
                            attempts = attempt,
                            error = %e,
                            "store operation failed after all attempts"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl<B: KeyValueBackend> KeyValueBackend for Retrying<B> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        self.attempt("initialize", || self.inner.initialize()).await
    }

    async fn close(&self) {
        self.inner.close().await;
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.attempt("get", || self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.attempt("set", || self.inner.set(key, value, ttl)).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.attempt("delete", || self.inner.delete(key)).await
    }

    async fn ping(&self) -> bool {
        self.inner.ping().await
    }
}
