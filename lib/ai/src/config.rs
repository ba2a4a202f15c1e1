//! Reasoning backend and engine configuration.

use serde::Deserialize;

/// Configuration for the OpenAI-compatible reasoning backend.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the API, without the `/chat/completions` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token. Requests fail with `InvalidConfig` when unset.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub temperature: f32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout_seconds() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            temperature: 0.0,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Bounds for one orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Maximum decide calls per run.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// User turns of history sent to the decide step. 0 sends everything.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,

    /// Transcript entries sent to the final-reply step.
    #[serde(default = "default_response_window_messages")]
    pub response_window_messages: usize,
}

fn default_max_iterations() -> usize {
    5
}

fn default_history_turns() -> usize {
    5
}

fn default_response_window_messages() -> usize {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            history_turns: default_history_turns(),
            response_window_messages: default_response_window_messages(),
        }
    }
}
