//! Domain error types for server operations.
//!
//! Handler errors are plain enums; library reports are flattened into them
//! at the service boundary. Internal detail is logged, never sent to the
//! client.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;

/// Errors from one chat turn.
#[derive(Debug)]
pub enum ChatError {
    /// A session could not be created.
    Storage { reason: String },
    /// The engine could not dispatch a tool call.
    ToolDispatch { reason: String },
    /// The turn ran past the configured deadline.
    DeadlineExceeded { seconds: u64 },
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage { reason } => write!(f, "session storage failed: {reason}"),
            Self::ToolDispatch { reason } => write!(f, "tool dispatch failed: {reason}"),
            Self::DeadlineExceeded { seconds } => {
                write!(f, "turn exceeded its {seconds}s deadline")
            }
        }
    }
}

impl std::error::Error for ChatError {}

/// Errors returned by HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// The session does not exist or has expired.
    SessionNotFound,
    /// No setting answers to the requested key.
    SettingNotFound { key: String },
    /// A chat turn failed.
    Chat(ChatError),
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self::Chat(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::SessionNotFound => (StatusCode::NOT_FOUND, "Session not found".to_string()),
            Self::SettingNotFound { key } => {
                (StatusCode::NOT_FOUND, format!("Setting '{key}' not found"))
            }
            Self::Chat(err) => {
                tracing::error!("Chat turn failed: {}", err);
                let status = match err {
                    ChatError::DeadlineExceeded { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    ChatError::Storage { .. } | ChatError::ToolDispatch { .. } => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, "Unable to process the message".to_string())
            }
        };

        (status, Json(json!({ "detail": message }))).into_response()
    }
}
