//! NATS JetStream key-value backend.
//!
//! Values are written into a single KV bucket wrapped in a small JSON
//! envelope carrying the per-key deadline. Reads check the deadline and
//! purge stale keys, and a background task sweeps the whole bucket once per
//! `sweep_interval`. The bucket keeps entries forever unless a `max_age`
//! ceiling is configured.
//!
//! NATS KV keys may not contain `:`, so key segments separated by `:` are
//! rewritten to `.` separated tokens before they reach the server.

use crate::backend::KeyValueBackend;
use crate::error::StoreError;
use async_nats::jetstream::kv;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default bucket name.
const DEFAULT_BUCKET: &str = "waybill";

/// Default interval between bucket sweeps.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the NATS key-value backend.
#[derive(Debug, Clone)]
pub struct NatsKvConfig {
    /// NATS server URL.
    pub url: String,
    /// Bucket name (defaults to `waybill`).
    pub bucket: Option<String>,
    /// Server-side retention ceiling for the bucket. Unset keeps entries
    /// until they are deleted or swept.
    pub max_age: Option<Duration>,
    /// Interval between expiry sweeps (defaults to 60 seconds).
    pub sweep_interval: Option<Duration>,
}

impl NatsKvConfig {
    /// Creates a new config with the given NATS URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bucket: None,
            max_age: None,
            sweep_interval: None,
        }
    }

    fn bucket(&self) -> &str {
        self.bucket.as_deref().unwrap_or(DEFAULT_BUCKET)
    }

    /// Zero tells the server to keep entries indefinitely.
    fn max_age(&self) -> Duration {
        self.max_age.unwrap_or(Duration::ZERO)
    }

    fn sweep_interval(&self) -> Duration {
        self.sweep_interval
            .unwrap_or(DEFAULT_SWEEP_INTERVAL)
            .max(Duration::from_secs(1))
    }
}

/// The stored form of a value.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl Envelope {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Whether a raw bucket value is an envelope past its deadline. Values that
/// do not decode are left for reads to report.
fn is_stale(bytes: &[u8], now: DateTime<Utc>) -> bool {
    serde_json::from_slice::<Envelope>(bytes).is_ok_and(|envelope| envelope.is_expired(now))
}

struct Sweeper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Connection {
    client: async_nats::Client,
    kv: kv::Store,
    sweeper: Sweeper,
}

/// Key-value backend on a NATS JetStream KV bucket.
pub struct NatsKvBackend {
    config: NatsKvConfig,
    connection: RwLock<Option<Connection>>,
}

impl NatsKvBackend {
    /// Creates an unconnected backend. Call `initialize` to connect.
    #[must_use]
    pub fn new(config: NatsKvConfig) -> Self {
        Self {
            config,
            connection: RwLock::new(None),
        }
    }

    fn not_initialized(&self) -> StoreError {
        StoreError::NotInitialized {
            backend: self.name().to_string(),
        }
    }

    async fn store(&self) -> Result<kv::Store, StoreError> {
        self.connection
            .read()
            .await
            .as_ref()
            .map(|connection| connection.kv.clone())
            .ok_or_else(|| self.not_initialized())
    }

    fn spawn_sweeper(&self, store: kv::Store) -> Sweeper {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let period = self.config.sweep_interval();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = interval.tick() => match sweep_bucket(&store).await {
                        Ok(0) => {}
                        Ok(removed) => debug!(removed, "swept expired keys"),
                        Err(e) => warn!(error = %e, "bucket sweep failed"),
                    },
                }
            }
        });

        Sweeper { cancel, handle }
    }
}

async fn purge(store: &kv::Store, nats_key: &str) -> Result<(), StoreError> {
    store
        .purge(nats_key)
        .await
        .map_err(|e| StoreError::Transient {
            operation: "delete".to_string(),
            reason: e.to_string(),
        })
}

async fn load(store: &kv::Store, nats_key: &str) -> Result<Option<Envelope>, StoreError> {
    let Some(bytes) = store.get(nats_key).await.map_err(|e| StoreError::Transient {
        operation: "get".to_string(),
        reason: e.to_string(),
    })?
    else {
        return Ok(None);
    };

    let envelope: Envelope = serde_json::from_slice(&bytes).map_err(|e| StoreError::Backend {
        operation: "get".to_string(),
        reason: format!("corrupt entry for {nats_key}: {e}"),
    })?;

    if envelope.is_expired(Utc::now()) {
        debug!(key = nats_key, "dropping expired key on read");
        purge(store, nats_key).await?;
        return Ok(None);
    }

    Ok(Some(envelope))
}

/// Purges every expired envelope in the bucket. Returns how many went.
///
/// Each purge is conditional on the revision that was inspected, so a key
/// rewritten between the read and the purge survives.
async fn sweep_bucket(store: &kv::Store) -> Result<usize, StoreError> {
    let sweep_error = |reason: String| StoreError::Transient {
        operation: "sweep".to_string(),
        reason,
    };

    let keys: Vec<String> = store
        .keys()
        .await
        .map_err(|e| sweep_error(e.to_string()))?
        .try_collect()
        .await
        .map_err(|e| sweep_error(e.to_string()))?;

    let now = Utc::now();
    let mut removed = 0;
    for key in keys {
        let Some(entry) = store
            .entry(key.as_str())
            .await
            .map_err(|e| sweep_error(e.to_string()))?
        else {
            continue;
        };
        if entry.operation != kv::Operation::Put || !is_stale(&entry.value, now) {
            continue;
        }

        match store
            .purge_expect_revision(key.as_str(), Some(entry.revision))
            .await
        {
            Ok(()) => removed += 1,
            Err(e) => debug!(key = %key, error = %e, "key changed during sweep, kept"),
        }
    }
    Ok(removed)
}

/// Maps a store key onto the NATS KV key alphabet.
fn encode_key(key: &str, operation: &str) -> Result<String, StoreError> {
    let encoded: String = key
        .chars()
        .map(|c| if c == ':' { '.' } else { c })
        .collect();

    let valid = !encoded.is_empty()
        && !encoded.starts_with('.')
        && !encoded.ends_with('.')
        && encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/' | '=' | '.'));

    if valid {
        Ok(encoded)
    } else {
        Err(StoreError::Backend {
            operation: operation.to_string(),
            reason: format!("key '{key}' cannot be stored in a NATS bucket"),
        })
    }
}

#[async_trait]
impl KeyValueBackend for NatsKvBackend {
    fn name(&self) -> &'static str {
        "nats"
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        let client = async_nats::connect(&self.config.url)
            .await
            .map_err(|e| StoreError::Transient {
                operation: "initialize".to_string(),
                reason: format!("failed to connect to {}: {e}", self.config.url),
            })?;

        let jetstream = async_nats::jetstream::new(client.clone());
        let kv = jetstream
            .create_key_value(kv::Config {
                bucket: self.config.bucket().to_string(),
                history: 1,
                max_age: self.config.max_age(),
                ..Default::default()
            })
            .await
            .map_err(|e| StoreError::Transient {
                operation: "initialize".to_string(),
                reason: format!("failed to open bucket {}: {e}", self.config.bucket()),
            })?;

        let sweeper = self.spawn_sweeper(kv.clone());
        let previous = self.connection.write().await.replace(Connection {
            client,
            kv,
            sweeper,
        });
        if let Some(previous) = previous {
            previous.sweeper.cancel.cancel();
        }

        info!(
            url = %self.config.url,
            bucket = self.config.bucket(),
            sweep_interval_secs = self.config.sweep_interval().as_secs(),
            "nats store initialized"
        );
        Ok(())
    }

    async fn close(&self) {
        let Some(connection) = self.connection.write().await.take() else {
            return;
        };
        connection.sweeper.cancel.cancel();
        // The task only exits by cancellation; a join error means it panicked.
        let _ = connection.sweeper.handle.await;
        info!("nats store closed");
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let nats_key = encode_key(key, "get")?;
        let store = self.store().await?;
        Ok(load(&store, &nats_key)
            .await?
            .map(|envelope| envelope.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let nats_key = encode_key(key, "set")?;
        let store = self.store().await?;

        let expires_at = match ttl {
            Some(ttl) => Some(
                chrono::Duration::from_std(ttl)
                    .ok()
                    .and_then(|ttl| Utc::now().checked_add_signed(ttl))
                    .ok_or_else(|| StoreError::Backend {
                        operation: "set".to_string(),
                        reason: format!("ttl {ttl:?} is out of range"),
                    })?,
            ),
            None => None,
        };

        let payload = serde_json::to_vec(&Envelope {
            value: value.to_string(),
            expires_at,
        })
        .map_err(|e| StoreError::Backend {
            operation: "set".to_string(),
            reason: e.to_string(),
        })?;

        store
            .put(nats_key.as_str(), payload.into())
            .await
            .map_err(|e| StoreError::Transient {
                operation: "set".to_string(),
                reason: e.to_string(),
            })?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let nats_key = encode_key(key, "delete")?;
        let store = self.store().await?;

        let existed = load(&store, &nats_key).await?.is_some();
        if existed {
            purge(&store, &nats_key).await?;
        }
        Ok(existed)
    }

    async fn ping(&self) -> bool {
        self.connection.read().await.as_ref().is_some_and(|connection| {
            matches!(
                connection.client.connection_state(),
                async_nats::connection::State::Connected
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = NatsKvConfig::new("nats://localhost:4222");

        assert_eq!(config.bucket(), DEFAULT_BUCKET);
        assert_eq!(config.max_age(), Duration::ZERO);
        assert_eq!(config.sweep_interval(), DEFAULT_SWEEP_INTERVAL);
    }

    #[test]
    fn config_custom() {
        let config = NatsKvConfig {
            url: "nats://localhost:4222".to_string(),
            bucket: Some("sessions".to_string()),
            max_age: Some(Duration::from_secs(60)),
            sweep_interval: Some(Duration::from_millis(10)),
        };

        assert_eq!(config.bucket(), "sessions");
        assert_eq!(config.max_age(), Duration::from_secs(60));
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }

    #[test]
    fn colon_separated_keys_are_rewritten() {
        let key = encode_key("waybill:session:sess_01HZY", "get").unwrap();
        assert_eq!(key, "waybill.session.sess_01HZY");
    }

    #[test]
    fn keys_outside_alphabet_are_rejected() {
        assert!(encode_key("has space", "set").is_err());
        assert!(encode_key("", "set").is_err());
        assert!(encode_key(":leading", "set").is_err());
    }

    #[test]
    fn envelope_expiry() {
        let now = Utc::now();
        let expired = Envelope {
            value: "v".to_string(),
            expires_at: Some(now),
        };
        let persistent = Envelope {
            value: "v".to_string(),
            expires_at: None,
        };

        assert!(expired.is_expired(now));
        assert!(!persistent.is_expired(now));
    }

    #[test]
    fn sweep_targets_only_expired_envelopes() {
        let now = Utc::now();
        let expired = serde_json::to_vec(&Envelope {
            value: "v".to_string(),
            expires_at: Some(now - chrono::Duration::seconds(1)),
        })
        .unwrap();
        let live = serde_json::to_vec(&Envelope {
            value: "v".to_string(),
            expires_at: Some(now + chrono::Duration::seconds(60)),
        })
        .unwrap();

        assert!(is_stale(&expired, now));
        assert!(!is_stale(&live, now));
        assert!(!is_stale(br#"{"value":"v"}"#, now));
        assert!(!is_stale(b"not json", now));
    }

    #[test]
    fn persistent_envelope_omits_deadline() {
        let json = serde_json::to_string(&Envelope {
            value: "v".to_string(),
            expires_at: None,
        })
        .unwrap();
        assert_eq!(json, r#"{"value":"v"}"#);
    }

    #[tokio::test]
    async fn operations_before_initialize_fail() {
        let backend = NatsKvBackend::new(NatsKvConfig::new("nats://localhost:4222"));

        assert!(!backend.ping().await);
        assert!(matches!(
            backend.get("k").await,
            Err(StoreError::NotInitialized { .. })
        ));
        // Nothing to stop yet.
        backend.close().await;
    }
}
