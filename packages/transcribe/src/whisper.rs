//! `OpenAI` Whisper transcription of Twilio recordings.
//!
//! Recordings are fetched as `{RecordingUrl}.wav` with the Twilio account
//! credentials and posted as multipart form data to
//! `/audio/transcriptions`.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::{TranscribeError, Transcriber};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const WHISPER_MODEL: &str = "whisper-1";

/// Twilio account credentials for recording downloads.
#[derive(Debug, Clone)]
pub struct TwilioCredentials {
    /// Account SID.
    pub account_sid: String,
    /// Auth token.
    pub auth_token: String,
}

/// Whisper API client.
pub struct WhisperClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    twilio: Option<TwilioCredentials>,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl WhisperClient {
    /// Creates a client.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: String,
        twilio: Option<TwilioCredentials>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            twilio,
        }
    }

    /// Builds a client from `OPENAI_API_KEY`, `AI_BASE_URL`,
    /// `TWILIO_ACCOUNT_SID` and `TWILIO_AUTH_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns [`TranscribeError::Config`] if `OPENAI_API_KEY` is not set.
    pub fn from_env(client: reqwest::Client) -> Result<Self, TranscribeError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| TranscribeError::Config {
                message: "OPENAI_API_KEY environment variable not set".to_string(),
            })?;
        let base_url = std::env::var("AI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let twilio = match (
            std::env::var("TWILIO_ACCOUNT_SID"),
            std::env::var("TWILIO_AUTH_TOKEN"),
        ) {
            (Ok(account_sid), Ok(auth_token)) => Some(TwilioCredentials {
                account_sid,
                auth_token,
            }),
            _ => {
                log::warn!("Twilio credentials not set; recordings will be downloaded anonymously");
                None
            }
        };

        Ok(Self::new(client, &base_url, api_key, twilio))
    }

    async fn download(&self, recording_url: &str) -> Result<Vec<u8>, TranscribeError> {
        let url = audio_url(recording_url);
        log::debug!("Downloading recording {url}");

        let mut request = self.client.get(&url);
        if let Some(twilio) = &self.twilio {
            request = request.basic_auth(&twilio.account_sid, Some(&twilio.auth_token));
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TranscribeError::Api {
                service: "Twilio",
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }

        Ok(resp.bytes().await?.to_vec())
    }
}

/// The WAV download URL of a recording.
fn audio_url(recording_url: &str) -> String {
    let url = recording_url.trim();
    if url.ends_with(".wav") {
        url.to_string()
    } else {
        format!("{url}.wav")
    }
}

#[async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(&self, recording_url: &str) -> Result<String, TranscribeError> {
        let audio = self.download(recording_url).await?;

        let form = Form::new()
            .part(
                "file",
                Part::bytes(audio)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")?,
            )
            .text("model", WHISPER_MODEL);

        let resp = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TranscribeError::Api {
                service: "Whisper",
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }

        let body: TranscriptionResponse = resp.json().await?;
        log::info!("Transcribed {} character(s)", body.text.len());
        Ok(body.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_wav_extension_once() {
        assert_eq!(
            audio_url("https://api.twilio.com/2010-04-01/Accounts/AC1/Recordings/RE1"),
            "https://api.twilio.com/2010-04-01/Accounts/AC1/Recordings/RE1.wav"
        );
        assert_eq!(audio_url("https://host/RE1.wav"), "https://host/RE1.wav");
    }

    #[test]
    fn trims_base_url() {
        let client = WhisperClient::new(
            reqwest::Client::new(),
            "http://localhost:8000/v1/",
            "key".to_string(),
            None,
        );
        assert_eq!(client.base_url, "http://localhost:8000/v1");
    }

    #[test]
    fn parses_transcription_body() {
        let body: TranscriptionResponse =
            serde_json::from_str(r#"{"text":"Someone broke into my car."}"#).unwrap();
        assert_eq!(body.text, "Someone broke into my car.");
    }
}
