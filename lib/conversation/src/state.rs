//! Orchestration state carried between turns.

use crate::transcript::TranscriptEntry;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Where the decide loop stands for a session.
///
/// Stored as `{"tool", "tool_args", "last_tool", "messages"}`. An empty
/// `tool` string means no tool is selected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationState {
    /// Tool chosen by the last decision and not yet executed.
    #[serde(
        rename = "tool",
        default,
        serialize_with = "serialize_pending_tool",
        deserialize_with = "deserialize_pending_tool"
    )]
    pub pending_tool: Option<String>,

    /// Arguments extracted for `pending_tool`.
    #[serde(rename = "tool_args", default, deserialize_with = "deserialize_args")]
    pub pending_args: Map<String, Value>,

    /// Most recently executed tool.
    #[serde(default)]
    pub last_tool: Option<String>,

    /// Reasoning transcript, oldest first.
    #[serde(rename = "messages", default)]
    pub transcript: Vec<TranscriptEntry>,
}

impl OrchestrationState {
    /// Decodes a stored state, normalizing every transcript entry.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not an object or a field has the
    /// wrong shape.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Returns true if no tool is waiting to run.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending_tool.is_none()
    }

    /// Number of user turns in the transcript.
    #[must_use]
    pub fn turn_count(&self) -> usize {
        self.transcript.iter().filter(|e| e.is_user()).count()
    }
}

fn serialize_pending_tool<S: Serializer>(
    tool: &Option<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(tool.as_deref().unwrap_or(""))
}

fn deserialize_pending_tool<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let tool = Option::<String>::deserialize(deserializer)?;
    Ok(tool.filter(|t| !t.is_empty()))
}

fn deserialize_args<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Map<String, Value>, D::Error> {
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zeroed_state_shape() {
        let json = serde_json::to_value(OrchestrationState::default()).unwrap();
        assert_eq!(
            json,
            json!({"tool": "", "tool_args": {}, "last_tool": null, "messages": []})
        );
    }

    #[test]
    fn empty_tool_means_idle() {
        let state = OrchestrationState::from_value(json!({"tool": "", "tool_args": null})).unwrap();
        assert!(state.is_idle());
        assert!(state.pending_args.is_empty());
    }

    #[test]
    fn legacy_state_loads() {
        let state = OrchestrationState::from_value(json!({
            "messages": [
                {"content": "order 123?", "type": "human", "_type": "HumanMessage"},
                {"content": "1 case", "type": "ai", "_type": "AIMessage"}
            ],
            "tool": "",
            "tool_args": {},
            "last_tool": "query_aftersales_by_order"
        }))
        .unwrap();

        assert_eq!(state.transcript.len(), 2);
        assert_eq!(state.turn_count(), 1);
        assert_eq!(state.last_tool.as_deref(), Some("query_aftersales_by_order"));
    }

    #[test]
    fn pending_tool_round_trips() {
        let state = OrchestrationState {
            pending_tool: Some("ask_for_good".to_string()),
            ..OrchestrationState::default()
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["tool"], "ask_for_good");
        assert_eq!(OrchestrationState::from_value(json).unwrap(), state);
    }
}
