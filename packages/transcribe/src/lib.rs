#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Speech-to-text for call recordings.
//!
//! Telephony webhooks enqueue a [`TranscriptionJob`] and return at once.
//! The [`queue`] worker downloads and transcribes the recording with
//! [`whisper::WhisperClient`] and hands the text to a
//! [`TranscriptionHandler`], retrying the whole job a fixed number of
//! times.

pub mod queue;
pub mod whisper;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from transcription.
#[derive(Debug, Error)]
pub enum TranscribeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An upstream API returned an error status.
    #[error("{service} returned {status}: {message}")]
    Api {
        /// Which upstream failed.
        service: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// Missing credentials.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },

    /// The transcript handler failed.
    #[error("Handler error: {message}")]
    Handler {
        /// Description.
        message: String,
    },

    /// The queue worker has stopped.
    #[error("Transcription queue is closed")]
    QueueClosed,
}

/// A recording to transcribe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionJob {
    /// Recording URL without extension, as sent by the telephony provider.
    pub recording_url: String,
    /// Call the recording belongs to.
    pub call_sid: String,
}

/// Turns a recording into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribes the recording at `recording_url`.
    ///
    /// # Errors
    ///
    /// Returns [`TranscribeError`] if download or transcription fails.
    async fn transcribe(&self, recording_url: &str) -> Result<String, TranscribeError>;
}

/// Consumes finished transcripts.
#[async_trait]
pub trait TranscriptionHandler: Send + Sync {
    /// Processes the transcript of `job`.
    ///
    /// # Errors
    ///
    /// Returns [`TranscribeError::Handler`] to have the job retried.
    async fn handle(&self, job: &TranscriptionJob, transcript: &str) -> Result<(), TranscribeError>;
}
