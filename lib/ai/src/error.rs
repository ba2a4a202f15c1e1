//! Error types for the AI crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `LlmError`: Reasoning backend failures. The engine absorbs these.
//! - `EngineError`: Faults that end a turn without a reply.

use std::fmt;

/// Errors from reasoning backend operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Request failed.
    RequestFailed { reason: String },
    /// The provider answered with a non-success status.
    BadStatus { status: u16, body: String },
    /// Response parsing failed.
    ResponseParseFailed { reason: String },
    /// Timeout waiting for response.
    Timeout,
    /// Rate limit exceeded.
    RateLimited { retry_after_secs: Option<u64> },
    /// Invalid configuration.
    InvalidConfig { reason: String },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed { reason } => {
                write!(f, "LLM request failed: {reason}")
            }
            Self::BadStatus { status, body } => {
                write!(f, "LLM provider returned {status}: {body}")
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse LLM response: {reason}")
            }
            Self::Timeout => write!(f, "LLM request timed out"),
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid LLM configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for LlmError {}

/// Errors that end an orchestration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The reasoning backend selected a tool that is not registered.
    ToolDispatch { tool: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToolDispatch { tool } => {
                write!(f, "reasoning backend selected unknown tool '{tool}'")
            }
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_error_display() {
        let err = LlmError::RateLimited {
            retry_after_secs: Some(60),
        };
        assert!(err.to_string().contains("60s"));
        assert_eq!(LlmError::Timeout.to_string(), "LLM request timed out");
    }

    #[test]
    fn engine_error_display() {
        let err = EngineError::ToolDispatch {
            tool: "doesNotExist".to_string(),
        };
        assert!(err.to_string().contains("doesNotExist"));
    }
}
