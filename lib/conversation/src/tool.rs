//! Tool registry.
//!
//! Tools are named, synchronous functions from an argument map to text.
//! They read whatever they need but never touch session state; the engine
//! records their output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Definition of a tool, as shown to the reasoning backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema for input parameters.
    pub parameters: JsonValue,
}

impl ToolDefinition {
    /// Creates a new tool definition with an empty object schema.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }
    }

    /// Sets the parameter schema.
    #[must_use]
    pub fn with_parameters(mut self, schema: JsonValue) -> Self {
        self.parameters = schema;
        self
    }
}

/// A callable tool.
///
/// `call` always receives a map, possibly empty. Implementations fill in
/// their own defaults for missing keys.
pub trait Tool: Send + Sync {
    /// Returns the tool definition.
    fn definition(&self) -> ToolDefinition;

    /// Runs the tool.
    fn call(&self, args: &Map<String, JsonValue>) -> String;
}

/// A tool backed by a closure.
pub struct FnTool<F> {
    definition: ToolDefinition,
    f: F,
}

impl<F> FnTool<F>
where
    F: Fn(&Map<String, JsonValue>) -> String + Send + Sync,
{
    /// Creates a tool from a definition and a function.
    pub fn new(definition: ToolDefinition, f: F) -> Self {
        Self { definition, f }
    }
}

impl<F> Tool for FnTool<F>
where
    F: Fn(&Map<String, JsonValue>) -> String + Send + Sync,
{
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    fn call(&self, args: &Map<String, JsonValue>) -> String {
        (self.f)(args)
    }
}

/// Registry of available tools, in registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool. A tool with the same name is replaced in place.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.definition().name;
        let tool: Arc<dyn Tool> = Arc::new(tool);
        match self.index.get(&name) {
            Some(&position) => self.tools[position] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Registers a tool, builder style.
    #[must_use]
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    /// Gets a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&position| &self.tools[position])
    }

    /// Names of all registered tools.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|tool| tool.definition().name).collect()
    }

    /// Definitions of all registered tools.
    #[must_use]
    pub fn catalog(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(name: &str) -> FnTool<impl Fn(&Map<String, JsonValue>) -> String + Send + Sync> {
        let label = name.to_string();
        FnTool::new(ToolDefinition::new(name, "Echo"), move |args| {
            format!("{label}: {}", args.len())
        })
    }

    #[test]
    fn tool_definition_builder() {
        let tool = ToolDefinition::new("query_good_support", "Check a good")
            .with_parameters(serde_json::json!({
                "type": "object",
                "properties": {
                    "good_id": { "type": "string" }
                }
            }));

        assert_eq!(tool.name, "query_good_support");
        assert_eq!(tool.parameters["properties"]["good_id"]["type"], "string");
    }

    #[test]
    fn tool_registry_operations() {
        let registry = ToolRegistry::new().with(echo("tool1")).with(echo("tool2"));

        assert_eq!(registry.len(), 2);
        assert!(registry.get("tool1").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), ["tool1", "tool2"]);
    }

    #[test]
    fn re_registering_keeps_position() {
        let mut registry = ToolRegistry::new().with(echo("a")).with(echo("b"));
        registry.register(FnTool::new(ToolDefinition::new("a", "Replaced"), |_| {
            "new".to_string()
        }));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.catalog()[0].description, "Replaced");
        assert_eq!(registry.get("a").unwrap().call(&Map::new()), "new");
    }

    #[test]
    fn tools_receive_arguments() {
        let registry = ToolRegistry::new().with(echo("count"));
        let mut args = Map::new();
        args.insert("order_id".to_string(), JsonValue::from("123"));

        assert_eq!(registry.get("count").unwrap().call(&args), "count: 1");
    }
}
