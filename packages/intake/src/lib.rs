#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crime report intake.
//!
//! [`service::ReportService`] turns the arguments of an
//! `update_crime_report` tool call into a persisted report: translation,
//! location verification, merge, date normalization and weather lookup.
//! [`tools`] exposes the service to the agent loop in [`detective_ai`].

pub mod agency;
pub mod prompt;
pub mod service;
pub mod tools;

pub use agency::AgencyConfig;
pub use service::{ReportService, UpdateResponse};
pub use tools::ReportToolExecutor;

use thiserror::Error;

/// Errors from the intake pipeline.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// Reading or persisting the report failed.
    #[error("Storage error: {0}")]
    Storage(#[from] detective_storage::StorageError),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
