//! Reasoning backend abstraction.
//!
//! A reasoning backend looks at the conversation and the tool catalog and
//! either selects a tool or replies directly. Choosing not to use a tool is
//! an ordinary outcome, not an error.

use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use waybill_conversation::{MessageRole, ToolDefinition, TranscriptEntry};

/// Which kind of answer the engine wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningProfile {
    /// Pick a tool or reply.
    Decide,
    /// Write the final natural-language reply. No tools are offered.
    Respond,
}

/// A message sent to the reasoning backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Converts a transcript entry. Opaque entries have no message form.
    #[must_use]
    pub fn from_entry(entry: &TranscriptEntry) -> Option<Self> {
        Some(Self {
            role: entry.role()?,
            content: entry.content()?.to_string(),
        })
    }
}

/// A request to a reasoning backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningRequest {
    /// System instruction.
    pub system: String,
    /// Conversation history, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Tools the backend may select. Empty for `Respond`.
    pub tools: Vec<ToolDefinition>,
    pub profile: ReasoningProfile,
}

/// A tool chosen by the backend.
///
/// `payload` is the raw tool-call object as the provider returned it; the
/// engine extracts the arguments from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSelection {
    pub name: String,
    pub payload: JsonValue,
}

/// What the backend decided.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Run a tool.
    ToolCall(ToolSelection),
    /// Reply to the user with this text.
    Reply { text: String },
}

/// Trait for reasoning backends.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Decides on the next step for the given request.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or its answer
    /// cannot be understood.
    async fn decide(&self, request: &ReasoningRequest) -> Result<Decision, LlmError>;

    /// Returns the model name.
    fn model(&self) -> &str;
}
