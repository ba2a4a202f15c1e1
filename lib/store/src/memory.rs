//! In-process key-value backend.
//!
//! Expiry is enforced twice: reads treat an entry whose deadline has passed
//! as absent (and drop it), and a background sweep removes every expired
//! entry once per `sweep_interval`. Both use `deadline <= now` as the
//! expiry test, so a key is never visible at or past its deadline.
//!
//! All operations, the sweep included, hold the same mutex for their full
//! duration.

use crate::backend::KeyValueBackend;
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default interval between expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    initialized: bool,
    entries: HashMap<String, Entry>,
}

impl MemoryState {
    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }
}

struct Sweeper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Key-value backend held in process memory.
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
    sweeper: Mutex<Option<Sweeper>>,
    sweep_interval: Duration,
}

impl MemoryBackend {
    /// Creates a backend that sweeps expired keys every 60 seconds.
    #[must_use]
    pub fn new() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }

    /// Creates a backend with a custom sweep interval.
    #[must_use]
    pub fn with_sweep_interval(sweep_interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            sweeper: Mutex::new(None),
            sweep_interval,
        }
    }

    /// Number of entries physically held, including expired ones the sweep
    /// has not reached yet.
    pub async fn stored_entries(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Removes every expired entry now. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        self.state.lock().await.sweep(Instant::now())
    }

    fn spawn_sweeper(&self) -> Sweeper {
        let cancel = CancellationToken::new();
        let state = Arc::clone(&self.state);
        let token = cancel.clone();
        let period = self.sweep_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = interval.tick() => {
                        let removed = state.lock().await.sweep(Instant::now());
                        if removed > 0 {
                            debug!(removed, "swept expired keys");
                        }
                    }
                }
            }
        });

        Sweeper { cancel, handle }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        let mut sweeper = self.sweeper.lock().await;
        let mut state = self.state.lock().await;
        if state.initialized {
            debug!("memory store already initialized");
            return Ok(());
        }

        state.initialized = true;
        state.entries.clear();
        *sweeper = Some(self.spawn_sweeper());

        info!(sweep_interval_secs = self.sweep_interval.as_secs(), "memory store initialized");
        Ok(())
    }

    async fn close(&self) {
        if let Some(sweeper) = self.sweeper.lock().await.take() {
            sweeper.cancel.cancel();
            // The task only ever exits by cancellation, so a join error here
            // means it panicked; nothing left to clean up either way.
            let _ = sweeper.handle.await;
        }

        let mut state = self.state.lock().await;
        state.entries.clear();
        state.initialized = false;
        info!("memory store closed");
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut state = self.state.lock().await;
        if !state.initialized {
            return Err(StoreError::NotInitialized {
                backend: self.name().to_string(),
            });
        }

        let now = Instant::now();
        if state.entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            state.entries.remove(key);
            return Ok(None);
        }

        Ok(state.entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.initialized {
            return Err(StoreError::NotInitialized {
                backend: self.name().to_string(),
            });
        }

        let expires_at = match ttl {
            Some(ttl) => Some(Instant::now().checked_add(ttl).ok_or_else(|| {
                StoreError::Backend {
                    operation: "set".to_string(),
                    reason: format!("ttl of {}s is out of range", ttl.as_secs()),
                }
            })?),
            None => None,
        };
        state.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if !state.initialized {
            return Err(StoreError::NotInitialized {
                backend: self.name().to_string(),
            });
        }

        let now = Instant::now();
        Ok(state
            .entries
            .remove(key)
            .is_some_and(|entry| !entry.is_expired(now)))
    }

    async fn ping(&self) -> bool {
        self.state.lock().await.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ready_backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.initialize().await.unwrap();
        backend
    }

    #[tokio::test]
    async fn operations_before_initialize_fail() {
        let backend = MemoryBackend::new();

        assert!(!backend.ping().await);
        assert!(matches!(
            backend.get("k").await,
            Err(StoreError::NotInitialized { .. })
        ));
        assert!(backend.set("k", "v", None).await.is_err());
        assert!(backend.delete("k").await.is_err());
    }

    #[tokio::test]
    async fn set_then_get() {
        let backend = ready_backend().await;
        backend.set("greeting", "hello", None).await.unwrap();

        assert_eq!(backend.get("greeting").await.unwrap().as_deref(), Some("hello"));
        assert_eq!(backend.get("missing").await.unwrap(), None);
        backend.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn value_visible_until_deadline_and_absent_from_it() {
        let backend = ready_backend().await;
        backend
            .set("k", "v", Some(Duration::from_secs(10)))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_millis(9_999)).await;
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(backend.get("k").await.unwrap(), None);
        backend.close().await;
    }

    #[tokio::test]
    async fn unrepresentable_ttl_is_rejected() {
        let backend = ready_backend().await;
        backend.set("k", "old", None).await.unwrap();

        let err = backend
            .set("k", "new", Some(Duration::from_secs(u64::MAX)))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Backend { .. }));
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("old"));
        backend.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn expired_read_drops_entry_without_sweep() {
        let backend = MemoryBackend::with_sweep_interval(Duration::from_secs(3600));
        backend.initialize().await.unwrap();
        backend.set("k", "v", Some(Duration::from_secs(1))).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(backend.stored_entries().await, 1);
        assert_eq!(backend.get("k").await.unwrap(), None);
        assert_eq!(backend.stored_entries().await, 0);
        backend.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn set_without_ttl_clears_previous_expiry() {
        let backend = ready_backend().await;
        backend.set("k", "v1", Some(Duration::from_secs(5))).await.unwrap();
        backend.set("k", "v2", None).await.unwrap();

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("v2"));
        backend.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn background_sweep_removes_expired_keys() {
        let backend = MemoryBackend::with_sweep_interval(Duration::from_secs(60));
        backend.initialize().await.unwrap();
        backend.set("short", "v", Some(Duration::from_secs(30))).await.unwrap();
        backend.set("forever", "v", None).await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        for _ in 0..10 {
            if backend.stored_entries().await == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(backend.stored_entries().await, 1);
        assert_eq!(backend.get("forever").await.unwrap().as_deref(), Some("v"));
        backend.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn manual_sweep_counts_removed_keys() {
        let backend = ready_backend().await;
        backend.set("a", "1", Some(Duration::from_secs(1))).await.unwrap();
        backend.set("b", "2", Some(Duration::from_secs(1))).await.unwrap();
        backend.set("c", "3", Some(Duration::from_secs(100))).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(backend.sweep_expired().await, 2);
        backend.close().await;
    }

    #[tokio::test]
    async fn delete_reports_whether_something_was_removed() {
        let backend = ready_backend().await;
        backend.set("k", "v", None).await.unwrap();

        assert!(backend.delete("k").await.unwrap());
        assert!(!backend.delete("k").await.unwrap());
        backend.close().await;
    }

    #[tokio::test]
    async fn close_stops_sweeper_and_clears_state() {
        let backend = ready_backend().await;
        backend.set("k", "v", None).await.unwrap();

        backend.close().await;

        assert!(!backend.ping().await);
        assert_eq!(backend.stored_entries().await, 0);
        assert!(backend.sweeper.lock().await.is_none());
    }

    #[tokio::test]
    async fn initialize_twice_keeps_data() {
        let backend = ready_backend().await;
        backend.set("k", "v", None).await.unwrap();
        backend.initialize().await.unwrap();

        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("v"));
        backend.close().await;
    }
}
