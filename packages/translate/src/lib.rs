#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Language detection and translation.
//!
//! Report fields are stored in English regardless of the language the
//! reporter used. [`GoogleTranslator`] talks to the Cloud Translation v2
//! REST API; [`NoopTranslator`] is used when no key is configured and
//! passes text through unchanged.

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

/// Language code returned when detection is not possible.
pub const UNDETERMINED: &str = "und";

/// Target language for stored report fields.
pub const ENGLISH: &str = "en";

const GOOGLE_TRANSLATE_URL: &str = "https://translation.googleapis.com/language/translate/v2";

/// Errors from translation operations.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned an error payload or an unexpected shape.
    #[error("Translation API error: {message}")]
    Api {
        /// Description of the failure.
        message: String,
    },
}

/// A translation backend.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translates `text` into the `target` language.
    ///
    /// # Errors
    ///
    /// Returns [`TranslateError`] if the backend fails.
    async fn translate(&self, text: &str, target: &str) -> Result<String, TranslateError>;

    /// Detects the language of `text`, returning an ISO 639-1 code or
    /// [`UNDETERMINED`].
    ///
    /// # Errors
    ///
    /// Returns [`TranslateError`] if the backend fails.
    async fn detect(&self, text: &str) -> Result<String, TranslateError>;
}

/// Passes text through unchanged and reports every text as English.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTranslator;

#[async_trait]
impl Translator for NoopTranslator {
    async fn translate(&self, text: &str, _target: &str) -> Result<String, TranslateError> {
        Ok(text.to_string())
    }

    async fn detect(&self, text: &str) -> Result<String, TranslateError> {
        Ok(if text.trim().is_empty() {
            UNDETERMINED.to_string()
        } else {
            ENGLISH.to_string()
        })
    }
}

/// Google Cloud Translation v2 client authenticated with an API key.
pub struct GoogleTranslator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GoogleTranslator {
    /// Creates a client against the public endpoint.
    #[must_use]
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            base_url: GOOGLE_TRANSLATE_URL.to_string(),
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value, TranslateError> {
        let resp = self
            .client
            .post(format!("{}{path}", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let body: serde_json::Value = resp.json().await?;
        if !status.is_success() {
            return Err(TranslateError::Api {
                message: body["error"]["message"]
                    .as_str()
                    .map_or_else(|| format!("status {status}"), ToString::to_string),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, target: &str) -> Result<String, TranslateError> {
        let body = self
            .post("", json!({ "q": text, "target": target, "format": "text" }))
            .await?;
        parse_translation(&body)
    }

    async fn detect(&self, text: &str) -> Result<String, TranslateError> {
        if text.trim().is_empty() {
            return Ok(UNDETERMINED.to_string());
        }
        let body = self.post("/detect", json!({ "q": text })).await?;
        Ok(parse_detection(&body))
    }
}

fn parse_translation(body: &serde_json::Value) -> Result<String, TranslateError> {
    body["data"]["translations"][0]["translatedText"]
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| TranslateError::Api {
            message: "response has no translatedText".to_string(),
        })
}

fn parse_detection(body: &serde_json::Value) -> String {
    body["data"]["detections"][0][0]["language"]
        .as_str()
        .filter(|lang| !lang.is_empty())
        .unwrap_or(UNDETERMINED)
        .to_string()
}

/// Translates `text` to `target`, returning the original text on failure.
///
/// Blank text and an [`UNDETERMINED`] or empty target skip the call.
pub async fn translate_or_original(translator: &dyn Translator, text: &str, target: &str) -> String {
    if text.trim().is_empty() || target.is_empty() || target == UNDETERMINED {
        return text.to_string();
    }

    match translator.translate(text, target).await {
        Ok(translated) => translated,
        Err(e) => {
            log::warn!("Translation to '{target}' failed, keeping original text: {e}");
            text.to_string()
        }
    }
}

/// Translates `text` to English, returning the original text on failure.
pub async fn to_english(translator: &dyn Translator, text: &str) -> String {
    translate_or_original(translator, text, ENGLISH).await
}

/// Detects the language of `text`, returning [`UNDETERMINED`] on failure.
pub async fn detect_or_undetermined(translator: &dyn Translator, text: &str) -> String {
    translator.detect(text).await.unwrap_or_else(|e| {
        log::warn!("Language detection failed: {e}");
        UNDETERMINED.to_string()
    })
}

/// Builds the Google translator when `GOOGLE_TRANSLATE_API_KEY` is set, or
/// the pass-through translator otherwise.
#[must_use]
pub fn from_env(client: reqwest::Client) -> Box<dyn Translator> {
    match std::env::var("GOOGLE_TRANSLATE_API_KEY") {
        Ok(key) if !key.is_empty() => {
            log::info!("Using Google Cloud Translation");
            Box::new(GoogleTranslator::new(client, key))
        }
        _ => {
            log::info!("GOOGLE_TRANSLATE_API_KEY not set, translation disabled");
            Box::new(NoopTranslator)
        }
    }
}
