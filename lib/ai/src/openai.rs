//! OpenAI-compatible Chat Completions backend.

use crate::backend::{Decision, ReasoningBackend, ReasoningProfile, ReasoningRequest, ToolSelection};
use crate::config::LlmConfig;
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::StatusCode;
use rootcause::prelude::Report;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::time::Duration;
use tracing::debug;

/// Reasoning backend for any endpoint speaking the Chat Completions API.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OpenAiBackend {
    /// Creates a backend from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: LlmConfig) -> Result<Self, Report<LlmError>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LlmError::InvalidConfig {
                reason: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    fn build_request_body(&self, request: &ReasoningRequest) -> JsonValue {
        let mut messages = vec![json!({"role": "system", "content": request.system})];
        messages.extend(
            request
                .messages
                .iter()
                .map(|m| json!({"role": m.role.as_str(), "content": m.content})),
        );

        let mut body = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": messages,
        });

        if request.profile == ReasoningProfile::Decide && !request.tools.is_empty() {
            let tools: Vec<JsonValue> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = JsonValue::Array(tools);
        }

        body
    }
}

#[async_trait]
impl ReasoningBackend for OpenAiBackend {
    async fn decide(&self, request: &ReasoningRequest) -> Result<Decision, LlmError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| LlmError::InvalidConfig {
                reason: "no API key configured".to_string(),
            })?;

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!(model = %self.config.model, profile = ?request.profile, "chat completion");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&self.build_request_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::RequestFailed {
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(LlmError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }

        let data: ChatResponse = resp.json().await.map_err(|e| LlmError::ResponseParseFailed {
            reason: e.to_string(),
        })?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ResponseParseFailed {
                reason: "no choices in response".to_string(),
            })?;

        if let Some(call) = choice.message.tool_calls.unwrap_or_default().into_iter().next() {
            let payload = json!({
                "name": call.function.name,
                "arguments": call.function.arguments,
            });
            return Ok(Decision::ToolCall(ToolSelection {
                name: call.function.name,
                payload,
            }));
        }

        Ok(Decision::Reply {
            text: choice.message.content.unwrap_or_default(),
        })
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Deserialize)]
struct ChatToolCall {
    function: ChatFunction,
}

#[derive(Deserialize)]
struct ChatFunction {
    name: String,
    /// Normally a JSON-encoded string; some providers send an object.
    #[serde(default)]
    arguments: JsonValue,
}
