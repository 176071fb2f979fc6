//! One reporter turn, shared by the web chat and the phone assistant.

use std::sync::Arc;

use chrono::Utc;
use detective_ai::AgentEvent;
use detective_ai::agent::run_agent;
use detective_ai::providers::LlmProvider;
use detective_intake::ReportService;
use detective_intake::ReportToolExecutor;
use detective_intake::prompt::system_prompt;
use detective_sessions::SessionStore;
use tokio::sync::mpsc;

use crate::ServerError;

/// Runs agent turns for conversations and keeps their session state.
pub struct Assistant {
    reports: Arc<ReportService>,
    sessions: SessionStore,
    provider: Arc<dyn LlmProvider>,
}

impl Assistant {
    /// Creates an assistant.
    #[must_use]
    pub fn new(reports: Arc<ReportService>, sessions: SessionStore, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            reports,
            sessions,
            provider,
        }
    }

    /// Runs one turn, streaming agent events through `tx`.
    ///
    /// Loads the conversation's history and report, runs the agent with
    /// the report tools, then saves the history, links the report to the
    /// conversation and appends the exchange to the report's log.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Ai`] if the agent failed (already reported
    /// through `tx`), or another variant if session storage failed.
    pub async fn run_turn(
        &self,
        conversation_id: &str,
        user_text: &str,
        tx: &mpsc::Sender<AgentEvent>,
    ) -> Result<String, ServerError> {
        let history = self.sessions.history(conversation_id).await?;
        let record_id = self.sessions.record_for_conversation(conversation_id).await?;
        log::debug!(
            "Conversation {conversation_id}: {} prior message(s), record {record_id:?}",
            history.len()
        );

        let tools = ReportToolExecutor::new(self.reports.clone(), record_id);
        let prompt = system_prompt(self.reports.agency(), Utc::now());

        let outcome = run_agent(
            self.provider.as_ref(),
            &tools,
            &prompt,
            history,
            user_text,
            tx,
        )
        .await;

        self.sessions
            .save_history(conversation_id, &outcome.messages)
            .await?;

        if let Some(record_id) = tools.record_id().await {
            self.sessions.link_record(conversation_id, &record_id).await?;

            let reply = outcome.result.as_deref().unwrap_or_default();
            if let Err(e) = self
                .reports
                .append_log(
                    &record_id,
                    &[("User", user_text), ("Assistant", reply)],
                    Utc::now(),
                )
                .await
            {
                log::error!("Failed to append conversation log to {record_id}: {e}");
            }
        }

        Ok(outcome.result?)
    }

    /// Runs one turn without streaming and returns the reply.
    ///
    /// # Errors
    ///
    /// See [`Self::run_turn`].
    pub async fn reply(&self, conversation_id: &str, user_text: &str) -> Result<String, ServerError> {
        // Nobody listens; sends to the closed channel are ignored.
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        self.run_turn(conversation_id, user_text, &tx).await
    }
}
