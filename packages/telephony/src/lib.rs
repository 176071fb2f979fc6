#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Phone call flows.
//!
//! Twilio posts webhook form fields and expects `TwiML` markup back.
//! [`twiml`] renders the markup, [`ivr`] implements the keypad menu and
//! [`assistant`] the record/reply loop of the voice assistant. Nothing
//! here performs I/O; the server wires the flows to the transcription
//! queue and the session store.

pub mod assistant;
pub mod ivr;
pub mod twiml;

use serde::Deserialize;
use thiserror::Error;

/// Content type of every webhook response.
pub const TWIML_CONTENT_TYPE: &str = "text/xml";

/// Errors from call flows.
#[derive(Debug, Error)]
pub enum TelephonyError {
    /// A recording arrived without the call it belongs to.
    #[error("Missing CallSid, cannot enqueue transcription")]
    MissingCallSid,
}

/// Form fields of a Twilio voice webhook.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VoiceRequest {
    /// Call identifier.
    pub call_sid: Option<String>,
    /// Call status (`ringing`, `in-progress`, ...).
    pub call_status: Option<String>,
    /// Keys pressed during a `<Gather>`.
    pub digits: Option<String>,
    /// Recording URL, without extension, once a `<Record>` finished.
    pub recording_url: Option<String>,
}

impl VoiceRequest {
    /// The call id, or an empty string when Twilio did not send one.
    #[must_use]
    pub fn call_sid_or_default(&self) -> &str {
        self.call_sid.as_deref().unwrap_or_default()
    }
}

/// Joins a public base URL and an absolute path.
///
/// An empty base leaves the path relative, which Twilio resolves against
/// the webhook URL.
#[must_use]
pub fn webhook_url(base_url: &str, path: &str) -> String {
    format!("{}{path}", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_base_and_path() {
        assert_eq!(
            webhook_url("https://tips.example.org/", "/api/twilio/voice"),
            "https://tips.example.org/api/twilio/voice"
        );
        assert_eq!(webhook_url("", "/api/twilio/voice"), "/api/twilio/voice");
    }
}
