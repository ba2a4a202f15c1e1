//! Reasoning and orchestration for waybill.
//!
//! This crate provides:
//!
//! - **Reasoning backends**: the [`ReasoningBackend`] contract and an
//!   OpenAI-compatible implementation
//! - **Argument extraction**: tolerant decoding of tool-call arguments
//! - **Engine**: the decide/execute loop that runs one conversational turn

pub mod arguments;
pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod openai;
pub mod prompt;

pub use arguments::extract_arguments;
pub use backend::{
    ChatMessage, Decision, ReasoningBackend, ReasoningProfile, ReasoningRequest, ToolSelection,
};
pub use config::{EngineConfig, LlmConfig};
pub use engine::{Engine, TurnOutcome};
pub use error::{EngineError, LlmError};
pub use openai::OpenAiBackend;
