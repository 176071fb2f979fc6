#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crime report persistence.
//!
//! Reports are stored as flat rows (see [`detective_report::codec`]) in a
//! tabular backend that assigns the record identifier and case number.
//! [`ReportStore`] exposes the three operations the intake pipeline needs:
//! read by id, create, and full-row update by id.

pub mod airtable;
pub mod memory;

use async_trait::async_trait;
use detective_report_models::CrimeReport;
use thiserror::Error;

use crate::airtable::AirtableStore;
use crate::memory::MemoryStore;

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The backend rejected the request.
    #[error("Storage backend error ({status}): {message}")]
    Backend {
        /// HTTP status code.
        status: u16,
        /// Error message from the backend.
        message: String,
    },

    /// The backend response lacked an expected member.
    #[error("Unexpected storage response: {message}")]
    Response {
        /// What was missing.
        message: String,
    },

    /// No record exists with the given identifier.
    #[error("Record not found: {record_id}")]
    NotFound {
        /// The missing identifier.
        record_id: String,
    },
}

/// Identity assigned by the backend to a persisted report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Opaque record identifier.
    pub record_id: String,
    /// Human-facing case number, if the backend has assigned one.
    pub case_number: Option<String>,
}

/// A crime report backend.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Short backend identifier for logging.
    fn name(&self) -> &'static str;

    /// Reads a report by record identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend request fails.
    async fn get(&self, record_id: &str) -> Result<Option<CrimeReport>, StorageError>;

    /// Creates a new row from a fully populated report.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend request fails.
    async fn create(&self, report: &CrimeReport) -> Result<StoredRecord, StorageError>;

    /// Overwrites every writable column of an existing row.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend request fails or the record
    /// does not exist.
    async fn update(&self, record_id: &str, report: &CrimeReport) -> Result<StoredRecord, StorageError>;
}

/// Builds the backend selected by `STORAGE_BACKEND` (`airtable` or
/// `memory`).
///
/// Without an explicit choice, Airtable is used when `AIRTABLE_BASE_ID`
/// and `AIRTABLE_ACCESS_TOKEN` are both set.
///
/// # Errors
///
/// Returns [`StorageError::Response`] if Airtable is requested without
/// credentials or the backend name is unknown.
pub fn from_env(client: reqwest::Client) -> Result<Box<dyn ReportStore>, StorageError> {
    let base_id = std::env::var("AIRTABLE_BASE_ID").ok().filter(|v| !v.is_empty());
    let token = std::env::var("AIRTABLE_ACCESS_TOKEN")
        .ok()
        .filter(|v| !v.is_empty());
    let table = std::env::var("AIRTABLE_TABLE").unwrap_or_else(|_| "reports".to_string());

    let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| {
        if base_id.is_some() && token.is_some() {
            "airtable".to_string()
        } else {
            "memory".to_string()
        }
    });

    match backend.as_str() {
        "airtable" => match (base_id, token) {
            (Some(base_id), Some(token)) => {
                log::info!("Storing reports in Airtable table '{table}'");
                Ok(Box::new(AirtableStore::new(client, &base_id, &table, token)))
            }
            _ => Err(StorageError::Response {
                message: "AIRTABLE_BASE_ID and AIRTABLE_ACCESS_TOKEN are required".to_string(),
            }),
        },
        "memory" => {
            log::warn!("Storing reports in memory; they will be lost on restart");
            Ok(Box::new(MemoryStore::default()))
        }
        other => Err(StorageError::Response {
            message: format!("unknown storage backend '{other}'"),
        }),
    }
}
