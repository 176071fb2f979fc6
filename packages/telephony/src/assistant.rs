//! Conversational voice assistant.
//!
//! Each turn records the caller. When a recording ends Twilio posts to the
//! after-record webhook, which speaks whatever reply is ready and records
//! again. The recording status callback fires separately once the audio
//! file exists and is where transcription gets queued.

use crate::twiml::{Record, Response};
use crate::webhook_url;

/// Path of the incoming-call webhook.
pub const VOICE_ASSISTANT_PATH: &str = "/api/twilio/voice-assistant";

/// Path Twilio posts to when a recording ends.
pub const AFTER_RECORD_PATH: &str = "/api/twilio/voice-assistant/after-record";

/// Path of the recording status callback.
pub const RECORDING_CALLBACK_PATH: &str = "/api/twilio/voice-assistant/recording-callback";

/// Voice used for assistant speech.
pub const ASSISTANT_VOICE: &str = "Polly.Joanna";

/// Spoken while the reply to the last statement is not ready yet.
pub const HOLD_MESSAGE: &str = "One moment while we process your statement...";

fn record_turn(base_url: &str) -> Record {
    Record::new(webhook_url(base_url, AFTER_RECORD_PATH))
        .with_status_callback(webhook_url(base_url, RECORDING_CALLBACK_PATH))
}

/// Greets the caller and records the first statement.
#[must_use]
pub fn greeting(brand_name: &str, base_url: &str) -> String {
    Response::new()
        .say_as(
            ASSISTANT_VOICE,
            format!(
                "Hello, thank you for calling {brand_name}. I'm here to take your statement. \
                 Please speak after the beep, then press pound."
            ),
        )
        .record(record_turn(base_url))
        .to_xml()
}

/// Speaks the pending reply, or a hold message, and records again.
#[must_use]
pub fn after_record(pending_reply: Option<&str>, base_url: &str) -> String {
    let speech = pending_reply
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(HOLD_MESSAGE);

    Response::new()
        .say_as(ASSISTANT_VOICE, speech)
        .pause(1)
        .record(record_turn(base_url))
        .to_xml()
}

/// Markup returned when an assistant step fails.
#[must_use]
pub fn error_response() -> String {
    Response::new()
        .say_as(ASSISTANT_VOICE, "Sorry, an error occurred. Goodbye.")
        .hangup()
        .to_xml()
}
