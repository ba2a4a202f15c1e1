//! Key-value backend abstraction.

use crate::error::StoreError;
use async_trait::async_trait;
use std::time::Duration;

/// A key to string-value store with optional per-key expiry.
///
/// Implementations report every failure as a [`StoreError`]; deciding
/// which failures the caller gets to see is the job of [`TtlStore`].
///
/// [`TtlStore`]: crate::TtlStore
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    /// Short name used in logs and errors (`memory`, `nats`, ...).
    fn name(&self) -> &'static str;

    /// Brings the backend up. Called once at startup.
    async fn initialize(&self) -> Result<(), StoreError>;

    /// Releases connections and stops background work.
    async fn close(&self);

    /// Returns the value for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`.
    ///
    /// `ttl = None` makes the key persistent, clearing any earlier expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Removes `key`. Returns whether a live value was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Reports live connectivity. Never fails.
    async fn ping(&self) -> bool;
}
