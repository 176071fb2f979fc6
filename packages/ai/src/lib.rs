#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! LLM provider abstraction and tool-use agent loop.
//!
//! Talks to `OpenAI` or any `OpenAI`-compatible server (Ollama, vLLM,
//! llama.cpp, LM Studio) selected with the `AI_BASE_URL` environment
//! variable. The agent loop is domain-agnostic: callers supply a system
//! prompt and a [`agent::ToolExecutor`], and the loop feeds tool results
//! back to the model until it produces a reply.

pub mod agent;
pub mod providers;

use thiserror::Error;

/// The only failure text shown to the user. Details stay in the logs.
pub const TURN_FAILED_MESSAGE: &str = "Something went wrong. Please try again.";

/// Failures talking to the model or running its tools.
#[derive(Debug, Error)]
pub enum AiError {
    /// The provider could not be reached.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A request or response body was not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A tool call could not be carried out.
    #[error("Tool execution error: {message}")]
    ToolExecution {
        /// What the tool reported.
        message: String,
    },

    /// The provider answered with an error or an unusable reply.
    #[error("Provider error: {message}")]
    Provider {
        /// What the provider reported.
        message: String,
    },

    /// The model kept calling tools without ever replying.
    #[error("Agent loop exceeded maximum of {max_iterations} iterations")]
    MaxIterations {
        /// Round trips allowed per turn.
        max_iterations: u32,
    },

    /// Missing or invalid provider settings.
    #[error("Configuration error: {message}")]
    Config {
        /// Which setting is wrong.
        message: String,
    },
}

/// What one turn of the agent produced.
///
/// `messages` is returned even when `result` is an error, so a turn that
/// fails halfway still leaves the reporter's statement in the history.
pub struct AgentOutcome {
    /// Prior history plus this turn's user message, tool calls and tool
    /// results.
    pub messages: Vec<providers::Message>,

    /// The final reply, or why the turn stopped.
    pub result: Result<String, AiError>,
}

/// Progress of a chat turn, serialized one per SSE frame.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AgentEvent {
    /// Always first, so the client can send follow-ups.
    ConversationId {
        /// Conversation identifier.
        id: String,
    },
    /// Agent is thinking.
    Thinking {
        /// Brief description of the current step.
        message: String,
    },
    /// Agent is invoking a tool.
    ToolCall {
        /// Tool name.
        tool: String,
        /// Tool parameters (JSON).
        params: serde_json::Value,
    },
    /// Tool execution completed.
    ToolResult {
        /// Tool name.
        tool: String,
        /// Brief summary of the result.
        summary: String,
    },
    /// The report behind this conversation was created or changed.
    #[serde(rename_all = "camelCase")]
    ReportUpdated {
        /// Storage record identifier.
        record_id: String,
        /// Human-facing case number, once assigned.
        case_number: Option<String>,
    },
    /// Agent has produced its reply.
    Answer {
        /// The reply text.
        text: String,
    },
    /// The turn failed.
    Error {
        /// Always [`TURN_FAILED_MESSAGE`].
        message: String,
    },
}
