//! Tool argument extraction.
//!
//! Providers disagree on where a tool call's arguments live and how they
//! are encoded. Three forms are recognized, in this order:
//!
//! 1. a JSON object under one of the argument keys
//! 2. a string under one of the argument keys that parses as a JSON object
//! 3. an object nested under `tool_input` inside one of the argument keys
//!
//! The first match wins. When nothing matches the arguments are empty.

use serde_json::{Map, Value};

/// Keys that may hold arguments, in priority order.
const ARGUMENT_KEYS: [&str; 5] = ["arguments", "args", "argument", "arg", "tool_input"];

/// Extracts the argument map from a provider's tool-call payload.
#[must_use]
pub fn extract_arguments(payload: &Value) -> Map<String, Value> {
    let candidates = || ARGUMENT_KEYS.iter().filter_map(|key| payload.get(*key));

    if let Some(direct) = candidates()
        .filter_map(Value::as_object)
        .find(|object| !is_wrapper(object))
    {
        return direct.clone();
    }

    if let Some(parsed) = candidates()
        .filter_map(Value::as_str)
        .find_map(|encoded| serde_json::from_str::<Map<String, Value>>(encoded).ok())
    {
        return parsed;
    }

    candidates()
        .filter_map(Value::as_object)
        .find_map(|object| object.get("tool_input").and_then(Value::as_object))
        .cloned()
        .unwrap_or_default()
}

/// An object whose only content is a nested `tool_input` object.
fn is_wrapper(object: &Map<String, Value>) -> bool {
    object.len() == 1 && object.get("tool_input").is_some_and(Value::is_object)
}
