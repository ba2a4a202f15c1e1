//! HTTP routes.

use crate::chat::{ChatReply, ChatService, QuestionOptions};
use crate::config::{ServerConfig, SettingSource};
use crate::error::ApiError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use waybill_conversation::Message;
use waybill_store::TtlStore;

/// Key written and read back by the health check.
const HEALTH_KEY: &str = "health_check";

/// Shared state for all handlers.
pub struct AppState {
    pub chat: ChatService,
    pub store: TtlStore,
    pub config: ServerConfig,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(chat: ChatService, store: TtlStore, config: ServerConfig) -> Self {
        Self {
            chat,
            store,
            config,
        }
    }
}

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/agents/shipping-fee/chat", post(chat))
        .route("/llm/question", post(ask_question))
        .route(
            "/agents/sessions/{id}",
            get(get_session).delete(delete_session),
        )
        .route("/health", get(health))
        .route("/config/{key}", get(get_setting))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Body of a chat request.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub content: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Body of a direct question.
#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_include_history")]
    pub include_history: bool,
    /// Capped at [`MAX_HISTORY_TURNS`](crate::chat::MAX_HISTORY_TURNS).
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
}

fn default_include_history() -> bool {
    QuestionOptions::default().include_history
}

fn default_max_history_turns() -> usize {
    QuestionOptions::default().max_history_turns
}

/// A session as returned to clients.
#[derive(Debug, Serialize)]
pub struct SessionDetail {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
    pub store_connected: bool,
}

#[derive(Debug, Serialize)]
pub struct SettingResponse {
    pub key: String,
    pub value: Value,
    pub source: SettingSource,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let reply = state
        .chat
        .chat(
            &request.content,
            request.session_id.as_deref(),
            request.user_id,
        )
        .await?;
    Ok(Json(reply))
}

async fn ask_question(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let options = QuestionOptions {
        include_history: request.include_history,
        max_history_turns: request.max_history_turns,
    };
    let reply = state
        .chat
        .ask(
            &request.question,
            request.session_id.as_deref(),
            request.user_id,
            options,
        )
        .await?;
    Ok(Json(reply))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionDetail>, ApiError> {
    let record = state
        .chat
        .session(&id)
        .await
        .ok_or(ApiError::SessionNotFound)?;

    Ok(Json(SessionDetail {
        id: record.id.to_string(),
        created_at: record.created_at,
        updated_at: record.updated_at,
        user_id: record.user_id,
        messages: record.messages,
    }))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.chat.delete_session(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound)
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let store_connected = state.store.set(HEALTH_KEY, "ok", Some(10)).await
        && state.store.get(HEALTH_KEY).await.as_deref() == Some("ok");
    if !store_connected {
        tracing::warn!(backend = state.store.backend_name(), "store health check failed");
    }

    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
        store_connected,
    })
}

async fn get_setting(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<SettingResponse>, ApiError> {
    let setting = state
        .config
        .setting(&key)
        .ok_or_else(|| ApiError::SettingNotFound { key: key.clone() })?;

    Ok(Json(SettingResponse {
        key,
        value: setting.value,
        source: setting.source,
    }))
}
