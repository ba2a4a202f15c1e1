//! Conversation session persistence.
//!
//! A session is stored as one JSON document under `{key_prefix}{id}` with a
//! sliding expiry: every successful read re-writes the same bytes with a
//! fresh TTL, and every write uses the configured TTL.
//!
//! `update_session` and `add_message` are read-modify-write cycles with no
//! per-session locking. Two concurrent writers to the same session race and
//! the later write wins; callers are expected to run at most one turn per
//! session at a time.

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::message::Message;
use crate::state::OrchestrationState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument, warn};
use waybill_core::SessionId;
use waybill_store::TtlStore;

/// Fields a patch may not touch.
const PROTECTED_FIELDS: [&str; 4] = ["id", "created_at", "updated_at", "messages"];

/// A persisted conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Assigned at creation, never changes.
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Append-only message log.
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub state: OrchestrationState,
    /// Fields set through [`SessionPatch::set`] that have no typed home.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionRecord {
    fn new(user_id: Option<String>) -> Self {
        Self {
            id: SessionId::new(),
            created_at: Utc::now(),
            updated_at: None,
            user_id,
            messages: Vec::new(),
            state: OrchestrationState::default(),
            extra: Map::new(),
        }
    }
}

/// A partial update for [`SessionManager::update_session`].
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    state: Option<OrchestrationState>,
    fields: Map<String, Value>,
}

impl SessionPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the orchestration state.
    #[must_use]
    pub fn state(mut self, state: OrchestrationState) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets or clears the owning user.
    #[must_use]
    pub fn user_id(self, user_id: Option<String>) -> Self {
        let value = user_id.map_or(Value::Null, Value::String);
        self.set("user_id", value)
    }

    /// Sets an arbitrary top-level field.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Returns true if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.fields.is_empty()
    }

    /// Merges this patch into `record`, producing the updated record.
    fn apply(
        self,
        record: &SessionRecord,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord, SessionError> {
        let session_id = record.id.to_string();
        let serialization = |e: serde_json::Error| SessionError::Serialization {
            session_id: session_id.clone(),
            reason: e.to_string(),
        };

        let Value::Object(mut merged) = serde_json::to_value(record).map_err(serialization)? else {
            return Err(SessionError::Serialization {
                session_id: session_id.clone(),
                reason: "record is not an object".to_string(),
            });
        };

        for (key, value) in self.fields {
            if PROTECTED_FIELDS.contains(&key.as_str()) {
                warn!(error = %SessionError::ProtectedField { field: key }, "ignoring patch field");
                continue;
            }
            merged.insert(key, value);
        }

        if let Some(state) = self.state {
            merged.insert("state".to_string(), serde_json::to_value(state).map_err(serialization)?);
        }
        merged.insert("updated_at".to_string(), serde_json::to_value(now).map_err(serialization)?);

        // Decoding normalizes the state's transcript.
        serde_json::from_value(Value::Object(merged)).map_err(serialization)
    }
}

/// Creates, loads and mutates sessions stored in a [`TtlStore`].
#[derive(Debug, Clone)]
pub struct SessionManager {
    store: TtlStore,
    config: SessionConfig,
}

impl SessionManager {
    /// Creates a manager over an initialized store.
    #[must_use]
    pub fn new(store: TtlStore, config: SessionConfig) -> Self {
        Self { store, config }
    }

    fn key(&self, id: &SessionId) -> String {
        format!("{}{id}", self.config.key_prefix)
    }

    async fn persist(&self, record: &SessionRecord) -> bool {
        let json = match serde_json::to_string(record) {
            Ok(json) => json,
            Err(e) => {
                let err = SessionError::Serialization {
                    session_id: record.id.to_string(),
                    reason: e.to_string(),
                };
                error!(error = %err, "dropping session write");
                return false;
            }
        };
        self.store
            .set(&self.key(&record.id), &json, Some(self.config.ttl_seconds))
            .await
    }

    /// Creates an empty session and returns its id, or `None` if the
    /// record could not be written.
    #[instrument(skip(self))]
    pub async fn create_session(&self, user_id: Option<String>) -> Option<SessionId> {
        let record = SessionRecord::new(user_id);
        if !self.persist(&record).await {
            return None;
        }
        info!(session_id = %record.id, "created session");
        Some(record.id)
    }

    /// Loads a session and refreshes its expiry.
    ///
    /// A missing, expired, or undecodable record is reported as `None`.
    pub async fn get_session(&self, id: &SessionId) -> Option<SessionRecord> {
        let key = self.key(id);
        let Some(raw) = self.store.get(&key).await else {
            debug!(session_id = %id, "session not found");
            return None;
        };

        let record: SessionRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                let err = SessionError::Corrupt {
                    session_id: id.to_string(),
                    reason: e.to_string(),
                };
                error!(error = %err, "treating session as absent");
                return None;
            }
        };

        if !self.store.set(&key, &raw, Some(self.config.ttl_seconds)).await {
            warn!(session_id = %id, "failed to refresh session expiry");
        }
        Some(record)
    }

    /// Merges `patch` into an existing session.
    ///
    /// Returns false if the session does not exist or the merged record
    /// cannot be stored; the stored record is then left as it was.
    #[instrument(skip(self, patch), fields(session_id = %id))]
    pub async fn update_session(&self, id: &SessionId, patch: SessionPatch) -> bool {
        let Some(record) = self.get_session(id).await else {
            return false;
        };

        match patch.apply(&record, Utc::now()) {
            Ok(updated) => self.persist(&updated).await,
            Err(e) => {
                error!(error = %e, "dropping session update");
                false
            }
        }
    }

    /// Appends `message` to the session log, optionally replacing the
    /// orchestration state in the same write.
    ///
    /// The message is re-stamped on append, never earlier than the previous
    /// message.
    pub async fn add_message(
        &self,
        id: &SessionId,
        message: Message,
        state: Option<OrchestrationState>,
    ) -> bool {
        self.append_message(id, message, state).await.is_some()
    }

    /// Like [`add_message`](Self::add_message), but returns the timestamp
    /// the message was stored with, or `None` if nothing was written.
    #[instrument(
        skip(self, message, state),
        fields(session_id = %id, role = message.role.as_str())
    )]
    pub async fn append_message(
        &self,
        id: &SessionId,
        mut message: Message,
        state: Option<OrchestrationState>,
    ) -> Option<DateTime<Utc>> {
        let mut record = self.get_session(id).await?;

        let now = Utc::now();
        let stamped = record
            .messages
            .last()
            .map_or(now, |last| last.timestamp.max(now));
        message.timestamp = stamped;
        record.messages.push(message);
        if let Some(state) = state {
            record.state = state;
        }
        record.updated_at = Some(now);

        self.persist(&record).await.then_some(stamped)
    }

    /// Deletes a session. Returns whether there was one to delete.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn delete_session(&self, id: &SessionId) -> bool {
        let deleted = self.store.delete(&self.key(id)).await;
        if deleted {
            info!("deleted session");
        }
        deleted
    }
}
