//! Turns transcribed phone statements into assistant replies.

use std::sync::Arc;

use async_trait::async_trait;
use detective_sessions::SessionStore;
use detective_transcribe::{TranscribeError, TranscriptionHandler, TranscriptionJob};
use detective_translate::{ENGLISH, Translator, detect_or_undetermined, to_english, translate_or_original};

use crate::{Assistant, ServerError};

/// Spoken when a recording contained no speech.
pub const NOTHING_HEARD_REPLY: &str = "Sorry, I didn't catch that. Could you repeat your statement?";

/// Spoken when the turn for a statement failed.
pub const TURN_FAILED_REPLY: &str =
    "Sorry, something went wrong with your last statement. Please say it again.";

/// Runs one assistant turn per transcribed recording and stores the reply
/// for the call's next after-record webhook.
pub struct PhoneTurnHandler {
    assistant: Arc<Assistant>,
    sessions: SessionStore,
    translator: Arc<dyn Translator>,
}

impl PhoneTurnHandler {
    /// Creates a handler.
    #[must_use]
    pub fn new(assistant: Arc<Assistant>, sessions: SessionStore, translator: Arc<dyn Translator>) -> Self {
        Self {
            assistant,
            sessions,
            translator,
        }
    }

    async fn conversation_for(&self, call_sid: &str) -> Result<String, ServerError> {
        if let Some(id) = self.sessions.conversation_for_call(call_sid).await? {
            return Ok(id);
        }
        let id = uuid::Uuid::new_v4().to_string();
        log::info!("Call {call_sid} starts conversation {id}");
        self.sessions.link_call(call_sid, &id).await?;
        Ok(id)
    }

    async fn process(&self, job: &TranscriptionJob, transcript: &str) -> Result<(), ServerError> {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            log::info!("Empty transcript for call {}", job.call_sid);
            self.sessions
                .set_pending_reply(&job.call_sid, NOTHING_HEARD_REPLY)
                .await?;
            return Ok(());
        }

        let language = detect_or_undetermined(self.translator.as_ref(), transcript).await;
        let english = if language == ENGLISH {
            transcript.to_string()
        } else {
            to_english(self.translator.as_ref(), transcript).await
        };

        let conversation_id = self.conversation_for(&job.call_sid).await?;
        let reply = self.assistant.reply(&conversation_id, &english).await?;

        let spoken = if language == ENGLISH {
            reply
        } else {
            translate_or_original(self.translator.as_ref(), &reply, &language).await
        };

        self.sessions.set_pending_reply(&job.call_sid, &spoken).await?;
        log::info!("Reply ready for call {}", job.call_sid);
        Ok(())
    }
}

#[async_trait]
impl TranscriptionHandler for PhoneTurnHandler {
    async fn handle(&self, job: &TranscriptionJob, transcript: &str) -> Result<(), TranscribeError> {
        let Err(e) = self.process(job, transcript).await else {
            return Ok(());
        };

        // The turn is not retried; let the caller know on the next prompt.
        if let Err(reply_err) = self
            .sessions
            .set_pending_reply(&job.call_sid, TURN_FAILED_REPLY)
            .await
        {
            log::error!("Failed to store apology for call {}: {reply_err}", job.call_sid);
        }
        Err(TranscribeError::Handler { message: e.to_string() })
    }
}
