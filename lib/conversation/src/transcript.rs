//! Reasoning transcript entries.
//!
//! The transcript is the engine's own record of a conversation: user turns,
//! tool results, and replies. It is persisted inside the session state in a
//! tagged form (`{"kind": ..., ...}`).
//!
//! Older records stored reasoning turns as `{"content", "type"}` objects
//! with `type` one of `human`, `ai`, `system` or `tool`. [`normalize_value`]
//! maps those, the tagged form, and anything else onto a [`TranscriptEntry`]
//! without failing, so a record can always be loaded.

use crate::message::MessageRole;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One entry in the reasoning transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptEntry {
    /// Instruction text.
    System { content: String },
    /// A user turn.
    User { content: String },
    /// Assistant output. `tool` names the tool whose result this is; a reply
    /// written by the assistant itself has no tool.
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool: Option<String>,
    },
    /// A stored value that is not recognizable as a turn. Kept verbatim.
    Opaque { value: Value },
}

impl TranscriptEntry {
    /// Creates a user entry.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Creates an assistant reply entry.
    #[must_use]
    pub fn reply(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool: None,
        }
    }

    /// Creates an entry holding a tool's result.
    #[must_use]
    pub fn tool_result(tool: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool: Some(tool.into()),
        }
    }

    /// Text of the entry, if it has any.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::System { content } | Self::User { content } | Self::Assistant { content, .. } => {
                Some(content)
            }
            Self::Opaque { .. } => None,
        }
    }

    /// Role to present this entry under when talking to a reasoning backend.
    #[must_use]
    pub fn role(&self) -> Option<MessageRole> {
        match self {
            Self::System { .. } => Some(MessageRole::System),
            Self::User { .. } => Some(MessageRole::User),
            Self::Assistant { .. } => Some(MessageRole::Assistant),
            Self::Opaque { .. } => None,
        }
    }

    /// Returns true for user turns.
    #[must_use]
    pub fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }

    /// Returns true for replies written by the assistant itself.
    #[must_use]
    pub fn is_reply(&self) -> bool {
        matches!(self, Self::Assistant { tool: None, .. })
    }
}

/// Mirror of the tagged form, used only to recognize it.
#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Tagged {
    System { content: String },
    User { content: String },
    Assistant {
        content: String,
        #[serde(default)]
        tool: Option<String>,
    },
    Opaque { value: Value },
}

impl From<Tagged> for TranscriptEntry {
    fn from(tagged: Tagged) -> Self {
        match tagged {
            Tagged::System { content } => Self::System { content },
            Tagged::User { content } => Self::User { content },
            Tagged::Assistant { content, tool } => Self::Assistant { content, tool },
            Tagged::Opaque { value } => Self::Opaque { value },
        }
    }
}

/// Converts any stored value into a transcript entry.
///
/// Recognizes the tagged form first, then the legacy `{content, type}`
/// form. Everything else becomes [`TranscriptEntry::Opaque`].
#[must_use]
pub fn normalize_value(value: Value) -> TranscriptEntry {
    if value.get("kind").is_some() {
        if let Ok(tagged) = serde_json::from_value::<Tagged>(value.clone()) {
            return tagged.into();
        }
    }

    if let Some(entry) = from_legacy(&value) {
        return entry;
    }

    TranscriptEntry::Opaque { value }
}

fn from_legacy(value: &Value) -> Option<TranscriptEntry> {
    let object = value.as_object()?;
    let content = object.get("content")?.as_str()?.to_string();
    let kind = object.get("type")?.as_str()?;

    match kind {
        "human" => Some(TranscriptEntry::User { content }),
        "ai" => Some(TranscriptEntry::Assistant {
            content,
            tool: None,
        }),
        "system" => Some(TranscriptEntry::System { content }),
        "tool" => {
            let tool = object
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("tool")
                .to_string();
            Some(TranscriptEntry::Assistant {
                content,
                tool: Some(tool),
            })
        }
        _ => None,
    }
}

impl<'de> Deserialize<'de> for TranscriptEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(normalize_value)
    }
}
