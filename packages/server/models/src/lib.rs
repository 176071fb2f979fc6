#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the intake server.
//!
//! These are the JSON contract of the web client. Reports themselves are
//! returned as serialized `CrimeReport`s and are not repeated here.

use detective_geocoder::{LocationCandidate, LocationVerification};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// Failure body shared by every JSON endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Always `false`.
    pub success: bool,
    /// Message safe to show the reporter.
    pub message: String,
}

impl ApiError {
    /// Builds a failure body.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The reporter's message.
    pub message: String,
    /// Conversation to continue; a new one is started when absent.
    pub conversation_id: Option<String>,
}

/// Query parameters of `GET /api/geocode`.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeParams {
    /// Free-form location text.
    pub address: Option<String>,
}

/// How a location resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GeocodeStatus {
    /// Nothing matched.
    NotFound,
    /// Exactly one match.
    Single,
    /// Several matches.
    Ambiguous,
}

/// Response of `GET /api/geocode`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeResponse {
    /// Whether the lookup ran.
    pub success: bool,
    /// Match classification.
    pub status: GeocodeStatus,
    /// Matches in provider order.
    pub candidates: Vec<LocationCandidate>,
}

impl From<LocationVerification> for GeocodeResponse {
    fn from(verification: LocationVerification) -> Self {
        let (status, candidates) = match verification {
            LocationVerification::NotFound => (GeocodeStatus::NotFound, Vec::new()),
            LocationVerification::Single(candidate) => (GeocodeStatus::Single, vec![candidate]),
            LocationVerification::Ambiguous(candidates) => (GeocodeStatus::Ambiguous, candidates),
        };
        Self {
            success: true,
            status,
            candidates,
        }
    }
}

/// Body of `POST /api/translate`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    /// Text to translate.
    pub text: String,
    /// Target language code; English when absent.
    pub target_lang: Option<String>,
}

/// Response of `POST /api/translate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateResponse {
    /// Whether translation succeeded.
    pub success: bool,
    /// Translated text.
    pub translation: String,
}

/// Response of `POST /api/evidence`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Whether the files were stored.
    pub success: bool,
    /// Public URLs of the stored files.
    pub file_urls: Vec<String>,
}
