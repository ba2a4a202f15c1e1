//! The orchestration engine.
//!
//! One call to [`Engine::run`] drives a single conversational turn through
//! a small state machine:
//!
//! ```text
//!   Decide ──tool selected──▶ ToolExec(name) ──result recorded──▶ Decide
//!     │
//!     └──reply / cap reached / backend failure──▶ Done(reply)
//! ```
//!
//! Every run appends the user message and exactly one reply to the
//! transcript, with one tool-result entry per tool executed in between.
//! The only way a run ends without a reply is a tool selection naming an
//! unregistered tool, which is returned as [`EngineError::ToolDispatch`].

use crate::arguments::extract_arguments;
use crate::backend::{ChatMessage, Decision, ReasoningBackend, ReasoningProfile, ReasoningRequest};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::prompt::{APOLOGY, RESPONSE_PROMPT, decide_instruction};
use rootcause::prelude::Report;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use waybill_conversation::{
    OrchestrationState, ToolRegistry, TranscriptEntry, recent_entries, recent_turns,
};

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// State to persist for the next turn.
    pub state: OrchestrationState,
    /// The reply appended during this run.
    pub reply: String,
}

#[derive(Debug)]
enum Phase {
    Decide,
    ToolExec(String),
    Done(String),
}

/// Drives turns against a reasoning backend and a tool registry.
#[derive(Clone)]
pub struct Engine {
    backend: Arc<dyn ReasoningBackend>,
    tools: ToolRegistry,
    config: EngineConfig,
}

impl Engine {
    /// Creates an engine.
    pub fn new(
        backend: Arc<dyn ReasoningBackend>,
        tools: ToolRegistry,
        config: EngineConfig,
    ) -> Self {
        Self {
            backend,
            tools,
            config,
        }
    }

    /// The registered tools.
    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Runs one turn for `user_message` starting from `state`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ToolDispatch`] if the backend selects a tool
    /// that is not registered. Backend failures do not error; they produce
    /// an apology reply instead.
    #[instrument(skip_all, fields(model = self.backend.model()))]
    pub async fn run(
        &self,
        user_message: &str,
        mut state: OrchestrationState,
    ) -> Result<TurnOutcome, Report<EngineError>> {
        state.transcript.push(TranscriptEntry::user(user_message));
        state.pending_tool = None;
        state.pending_args.clear();

        let mut decisions = 0;
        let mut phase = Phase::Decide;

        let reply = loop {
            phase = match phase {
                Phase::Decide if decisions >= self.config.max_iterations => {
                    warn!(decisions, "decision cap reached");
                    Phase::Done(self.final_response(&state).await)
                }
                Phase::Decide => {
                    decisions += 1;
                    self.decide(&mut state).await
                }
                Phase::ToolExec(name) => self.execute(&mut state, name)?,
                Phase::Done(reply) => break reply,
            };
        };

        state.transcript.push(TranscriptEntry::reply(reply.as_str()));
        info!(decisions, last_tool = ?state.last_tool, "turn complete");
        Ok(TurnOutcome { state, reply })
    }

    async fn decide(&self, state: &mut OrchestrationState) -> Phase {
        let request = ReasoningRequest {
            system: decide_instruction(
                state.turn_count(),
                state.last_tool.as_deref(),
                &self.tools.names(),
            ),
            messages: to_messages(recent_turns(&state.transcript, self.config.history_turns)),
            tools: self.tools.catalog(),
            profile: ReasoningProfile::Decide,
        };

        match self.backend.decide(&request).await {
            Ok(Decision::ToolCall(selection)) => {
                state.pending_args = extract_arguments(&selection.payload);
                state.pending_tool = Some(selection.name.clone());
                debug!(tool = %selection.name, args = ?state.pending_args, "tool selected");
                Phase::ToolExec(selection.name)
            }
            Ok(Decision::Reply { text }) if !text.trim().is_empty() => Phase::Done(text),
            Ok(Decision::Reply { .. }) => {
                debug!("empty reply, asking for a final response");
                Phase::Done(self.final_response(state).await)
            }
            Err(e) => {
                warn!(error = %e, "reasoning backend failed");
                Phase::Done(APOLOGY.to_string())
            }
        }
    }

    fn execute(
        &self,
        state: &mut OrchestrationState,
        name: String,
    ) -> Result<Phase, Report<EngineError>> {
        let Some(tool) = self.tools.get(&name) else {
            warn!(tool = %name, "unknown tool selected");
            return Err(EngineError::ToolDispatch { tool: name }.into());
        };

        let output = tool.call(&state.pending_args);
        debug!(tool = %name, "tool executed");

        state.transcript.push(TranscriptEntry::tool_result(name.as_str(), output));
        state.last_tool = Some(name);
        state.pending_tool = None;
        state.pending_args.clear();
        Ok(Phase::Decide)
    }

    /// Asks for a natural-language reply over the recent transcript.
    async fn final_response(&self, state: &OrchestrationState) -> String {
        let request = ReasoningRequest {
            system: RESPONSE_PROMPT.to_string(),
            messages: to_messages(recent_entries(
                &state.transcript,
                self.config.response_window_messages,
            )),
            tools: Vec::new(),
            profile: ReasoningProfile::Respond,
        };
        self.respond(&request).await
    }

    /// Answers a free-form question with no tools offered. `history` is the
    /// conversation so far, oldest first. Backend failures produce the
    /// apology reply.
    #[instrument(skip_all, fields(model = self.backend.model(), history = history.len()))]
    pub async fn answer(&self, question: &str, mut history: Vec<ChatMessage>) -> String {
        history.push(ChatMessage::user(question));
        let request = ReasoningRequest {
            system: RESPONSE_PROMPT.to_string(),
            messages: history,
            tools: Vec::new(),
            profile: ReasoningProfile::Respond,
        };
        self.respond(&request).await
    }

    async fn respond(&self, request: &ReasoningRequest) -> String {
        match self.backend.decide(request).await {
            Ok(Decision::Reply { text }) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!("response was not a usable reply");
                APOLOGY.to_string()
            }
            Err(e) => {
                warn!(error = %e, "response failed");
                APOLOGY.to_string()
            }
        }
    }
}

fn to_messages(entries: &[TranscriptEntry]) -> Vec<ChatMessage> {
    entries.iter().filter_map(ChatMessage::from_entry).collect()
}
