//! Conversation sessions for waybill.
//!
//! This crate provides:
//!
//! - **Session Manager**: TTL-bounded session records over a [`waybill_store::TtlStore`]
//! - **Transcript**: the tagged reasoning transcript and its normalization
//! - **Tool Registry**: tools the engine may call during a turn
//! - **Windows**: history truncation for reasoning calls

pub mod config;
pub mod error;
pub mod message;
pub mod session;
pub mod state;
pub mod tool;
pub mod transcript;
pub mod window;

pub use config::SessionConfig;
pub use error::SessionError;
pub use message::{Message, MessageRole};
pub use session::{SessionManager, SessionPatch, SessionRecord};
pub use state::OrchestrationState;
pub use tool::{FnTool, Tool, ToolDefinition, ToolRegistry};
pub use transcript::{TranscriptEntry, normalize_value};
pub use window::{recent_entries, recent_turns};
