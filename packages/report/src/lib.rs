#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crime report reconciliation.
//!
//! - [`update`] turns the loosely-typed JSON arguments of an
//!   `update_crime_report` tool call into a typed
//!   [`ReportUpdate`](detective_report_models::ReportUpdate), coercing bad
//!   shapes instead of failing.
//! - [`merge`] reconciles a stored report with a partial update using a
//!   per-field policy. It is pure and never fails.
//! - [`codec`] converts between the structured report and the flat,
//!   text-oriented columns of the tabular storage backend.
//! - [`when`] normalizes free-form incident times.
//! - [`summary`] renders the human-readable report summary.

pub mod codec;
pub mod merge;
pub mod summary;
pub mod update;
pub mod when;
