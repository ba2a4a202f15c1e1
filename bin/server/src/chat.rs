//! The chat turn pipeline.
//!
//! One turn reads the session, runs the engine, then appends the user
//! message and the reply. The reply write carries the new orchestration
//! state. A turn that fails in the engine or runs out of time writes
//! nothing.
//!
//! A direct question skips the tools: the model sees the recent message log
//! and the question, and the orchestration state is left as it was.

use crate::error::ChatError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::{info, instrument, warn};
use waybill_ai::{ChatMessage, Engine};
use waybill_conversation::{
    Message, MessageRole, OrchestrationState, SessionManager, SessionRecord,
};
use waybill_core::SessionId;

/// Largest history window a direct question may ask for, in turns.
pub const MAX_HISTORY_TURNS: usize = 20;

/// The result of one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
}

/// How much of the session a direct question sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionOptions {
    pub include_history: bool,
    /// Turns of history to include, capped at [`MAX_HISTORY_TURNS`].
    pub max_history_turns: usize,
}

impl Default for QuestionOptions {
    fn default() -> Self {
        Self {
            include_history: true,
            max_history_turns: 10,
        }
    }
}

/// Runs chat turns against stored sessions.
#[derive(Clone)]
pub struct ChatService {
    sessions: SessionManager,
    engine: Engine,
    turn_timeout: Option<Duration>,
}

impl ChatService {
    /// Creates a service. `turn_timeout` bounds the engine run.
    pub fn new(sessions: SessionManager, engine: Engine, turn_timeout: Option<Duration>) -> Self {
        Self {
            sessions,
            engine,
            turn_timeout,
        }
    }

    /// The underlying session manager.
    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Handles one user message.
    ///
    /// A missing, malformed, or expired `session_id` starts a new session
    /// owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Storage`] if a new session cannot be stored,
    /// [`ChatError::ToolDispatch`] if the engine selects an unknown tool, and
    /// [`ChatError::DeadlineExceeded`] if the turn runs past its deadline.
    #[instrument(skip_all)]
    pub async fn chat(
        &self,
        content: &str,
        session_id: Option<&str>,
        user_id: Option<String>,
    ) -> Result<ChatReply, ChatError> {
        let session = self.resolve_session(session_id, user_id).await?;

        let outcome = self
            .within_deadline(self.engine.run(content, session.state))
            .await?
            .map_err(|e| ChatError::ToolDispatch {
                reason: e.to_string(),
            })?;

        Ok(self
            .record(session.id, content, outcome.reply, Some(outcome.state))
            .await)
    }

    /// Answers a question directly, without tools, and records the exchange.
    ///
    /// Session resolution follows [`chat`](Self::chat).
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Storage`] if a new session cannot be stored and
    /// [`ChatError::DeadlineExceeded`] if the answer runs past the deadline.
    #[instrument(skip_all)]
    pub async fn ask(
        &self,
        question: &str,
        session_id: Option<&str>,
        user_id: Option<String>,
        options: QuestionOptions,
    ) -> Result<ChatReply, ChatError> {
        let session = self.resolve_session(session_id, user_id).await?;
        let history = if options.include_history {
            history_messages(&session.messages, options.max_history_turns)
        } else {
            Vec::new()
        };

        let answer = self
            .within_deadline(self.engine.answer(question, history))
            .await?;
        Ok(self.record(session.id, question, answer, None).await)
    }

    async fn within_deadline<F: Future>(&self, work: F) -> Result<F::Output, ChatError> {
        match self.turn_timeout {
            Some(deadline) => tokio::time::timeout(deadline, work).await.map_err(|_| {
                ChatError::DeadlineExceeded {
                    seconds: deadline.as_secs(),
                }
            }),
            None => Ok(work.await),
        }
    }

    /// Appends the user message and the reply. Write failures are logged;
    /// the caller still gets the reply.
    async fn record(
        &self,
        id: SessionId,
        content: &str,
        reply_text: String,
        state: Option<OrchestrationState>,
    ) -> ChatReply {
        if !self.sessions.add_message(&id, Message::user(content), None).await {
            warn!(session_id = %id, "failed to record user message");
        }
        let reply = Message::assistant(reply_text.as_str());
        let fallback = reply.timestamp;
        let created_at = match self
            .sessions
            .append_message(&id, reply, state)
            .await
        {
            Some(stored) => stored,
            None => {
                warn!(session_id = %id, "failed to record reply");
                fallback
            }
        };

        ChatReply {
            reply: reply_text,
            session_id: id,
            created_at,
        }
    }

    /// Loads a session, or `None` if the id is malformed or unknown.
    pub async fn session(&self, id: &str) -> Option<SessionRecord> {
        let id = id.parse::<SessionId>().ok()?;
        self.sessions.get_session(&id).await
    }

    /// Deletes a session. Returns whether a record was removed.
    pub async fn delete_session(&self, id: &str) -> bool {
        match id.parse::<SessionId>() {
            Ok(id) => self.sessions.delete_session(&id).await,
            Err(_) => false,
        }
    }

    async fn resolve_session(
        &self,
        session_id: Option<&str>,
        user_id: Option<String>,
    ) -> Result<SessionRecord, ChatError> {
        if let Some(raw) = session_id {
            if let Some(record) = self.session(raw).await {
                return Ok(record);
            }
            info!(session_id = raw, "session not found, starting a new one");
        }

        let id = self
            .sessions
            .create_session(user_id)
            .await
            .ok_or_else(|| ChatError::Storage {
                reason: "could not create session".to_string(),
            })?;
        self.sessions
            .get_session(&id)
            .await
            .ok_or_else(|| ChatError::Storage {
                reason: format!("session {id} vanished after creation"),
            })
    }
}

/// The user and assistant messages among the last `max_turns` turns of the
/// log, oldest first.
fn history_messages(messages: &[Message], max_turns: usize) -> Vec<ChatMessage> {
    let window = max_turns.min(MAX_HISTORY_TURNS) * 2;
    messages[messages.len().saturating_sub(window)..]
        .iter()
        .filter(|m| matches!(m.role, MessageRole::User | MessageRole::Assistant))
        .map(|m| ChatMessage {
            role: m.role,
            content: m.content.clone(),
        })
        .collect()
}
