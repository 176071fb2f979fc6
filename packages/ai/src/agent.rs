//! Agent loop orchestration.
//!
//! Implements the agentic tool-use loop: user message -> LLM decides
//! tools -> execute tools -> feed results back -> repeat until the model
//! replies in plain text.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::providers::{
    ContentBlock, LlmProvider, Message, MessageContent, StopReason, extract_text,
};
use crate::{AgentEvent, AgentOutcome, AiError, TURN_FAILED_MESSAGE};

/// Maximum number of agent loop iterations to prevent infinite loops.
pub const MAX_ITERATIONS: u32 = 10;

/// Maximum size of a tool result JSON string before truncation.
/// Prevents overwhelming the LLM context window.
const MAX_TOOL_RESULT_BYTES: usize = 8000;

/// The set of tools the agent may call.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Tool definitions as `{name, description, parameters}` objects.
    fn definitions(&self) -> Vec<serde_json::Value>;

    /// Executes a single tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`AiError::ToolExecution`] if the tool is unknown or fails.
    /// The error text is fed back to the model.
    async fn execute(
        &self,
        name: &str,
        input: &serde_json::Value,
    ) -> Result<serde_json::Value, AiError>;

    /// Brief human-readable summary of a tool result, streamed to the
    /// client.
    fn summarize(&self, _name: &str, result: &serde_json::Value) -> String {
        result["message"]
            .as_str()
            .map_or_else(|| "Result received".to_string(), ToString::to_string)
    }
}

/// Runs the agent loop for one user turn.
///
/// `history` holds the prior turns of the conversation. Sends
/// [`AgentEvent`]s through `tx` as the agent works; the last event is
/// either [`AgentEvent::Answer`] or [`AgentEvent::Error`]. Closed channels
/// are ignored so a disconnected client does not abort the turn.
pub async fn run_agent(
    provider: &dyn LlmProvider,
    executor: &dyn ToolExecutor,
    system_prompt: &str,
    history: Vec<Message>,
    user_text: &str,
    tx: &mpsc::Sender<AgentEvent>,
) -> AgentOutcome {
    let mut messages = history;
    messages.push(Message::user(user_text));

    let result = agent_loop(provider, executor, system_prompt, &mut messages, tx).await;

    match &result {
        Ok(text) => {
            let _ = tx.send(AgentEvent::Answer { text: text.clone() }).await;
        }
        Err(e) => {
            log::error!("Agent failed: {e}");
            let _ = tx
                .send(AgentEvent::Error {
                    message: TURN_FAILED_MESSAGE.to_string(),
                })
                .await;
        }
    }

    AgentOutcome { messages, result }
}

/// Runs [`run_agent`] without streaming and returns only the reply.
///
/// # Errors
///
/// Returns [`AiError`] if the provider fails or the loop does not finish.
pub async fn answer(
    provider: &dyn LlmProvider,
    executor: &dyn ToolExecutor,
    system_prompt: &str,
    history: Vec<Message>,
    user_text: &str,
) -> (Vec<Message>, Result<String, AiError>) {
    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    let outcome = run_agent(provider, executor, system_prompt, history, user_text, &tx).await;
    (outcome.messages, outcome.result)
}

async fn agent_loop(
    provider: &dyn LlmProvider,
    executor: &dyn ToolExecutor,
    system_prompt: &str,
    messages: &mut Vec<Message>,
    tx: &mpsc::Sender<AgentEvent>,
) -> Result<String, AiError> {
    let tools = executor.definitions();

    for iteration in 0..MAX_ITERATIONS {
        log::debug!("Agent iteration {iteration}");

        let _ = tx
            .send(AgentEvent::Thinking {
                message: if iteration == 0 {
                    "Reading your message...".to_string()
                } else {
                    "Updating the report...".to_string()
                },
            })
            .await;

        let response = provider.chat(system_prompt, messages, &tools).await?;

        let wants_tools = response.stop_reason == StopReason::ToolUse
            && response
                .content
                .iter()
                .any(|b| matches!(b, ContentBlock::ToolUse { .. }));

        if !wants_tools {
            let text = extract_text(&response.content);
            messages.push(Message::assistant(text.clone()));
            return Ok(text);
        }

        messages.push(Message {
            role: "assistant".to_string(),
            content: MessageContent::Blocks(response.content.clone()),
        });

        let mut tool_results = Vec::new();

        for block in &response.content {
            let ContentBlock::ToolUse { id, name, input } = block else {
                continue;
            };

            let _ = tx
                .send(AgentEvent::ToolCall {
                    tool: name.clone(),
                    params: input.clone(),
                })
                .await;

            let (summary, content) = match executor.execute(name, input).await {
                Ok(json) => {
                    if let Some(record_id) = json["recordId"].as_str() {
                        let _ = tx
                            .send(AgentEvent::ReportUpdated {
                                record_id: record_id.to_string(),
                                case_number: json["caseNumber"].as_str().map(ToString::to_string),
                            })
                            .await;
                    }
                    let summary = executor.summarize(name, &json);
                    (summary.clone(), truncate_result(json.to_string(), &summary))
                }
                Err(e) => {
                    log::warn!("Tool {name} failed: {e}");
                    let msg = format!("Tool error: {e}");
                    (msg.clone(), msg)
                }
            };

            let _ = tx
                .send(AgentEvent::ToolResult {
                    tool: name.clone(),
                    summary,
                })
                .await;

            tool_results.push(ContentBlock::ToolResult {
                tool_use_id: id.clone(),
                content,
            });
        }

        messages.push(Message {
            role: "user".to_string(),
            content: MessageContent::Blocks(tool_results),
        });
    }

    Err(AiError::MaxIterations {
        max_iterations: MAX_ITERATIONS,
    })
}

fn truncate_result(raw: String, summary: &str) -> String {
    if raw.len() <= MAX_TOOL_RESULT_BYTES {
        return raw;
    }
    let mut cut = MAX_TOOL_RESULT_BYTES;
    while !raw.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}... (truncated, {summary})", &raw[..cut])
}
