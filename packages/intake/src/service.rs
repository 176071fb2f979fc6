//! The report update pipeline.
//!
//! One `update_crime_report` call runs, in order: lenient parsing,
//! translation to English, location verification, read-merge, date
//! normalization, weather lookup, and a single persist. Upstream adapter
//! failures degrade to the unmodified value and are logged; only storage
//! failures abort the call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use detective_geocoder::{Geocoder, LocationCandidate, LocationVerification, verify_location};
use detective_report::merge::{changed_fields, merge_log, merge_report};
use detective_report::summary::{draft_incident_description, render_summary};
use detective_report::update::{parse_update, parse_update_str};
use detective_report::when::normalize_when;
use detective_report_models::{
    Coordinates, CrimeReport, ReportField, ReportUpdate, is_not_available,
};
use detective_storage::{ReportStore, StoredRecord};
use detective_translate::{Translator, to_english};
use detective_weather::WeatherLookup;
use serde::Serialize;
use serde_json::Value;

use crate::{AgencyConfig, IntakeError};

/// Message returned when the location matched more than one place.
pub const AMBIGUOUS_LOCATION_MESSAGE: &str =
    "Crime report updated, but multiple location matches found.";

/// Message returned after a successful persist.
pub const SAVED_MESSAGE: &str = "Crime report updated and saved.";

/// JSON payload returned to the model for an `update_crime_report` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    /// Whether the report was persisted.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Storage record identifier.
    pub record_id: String,
    /// Human-facing case number, once assigned.
    pub case_number: Option<String>,
    /// Storage columns whose values changed.
    pub updated_fields: Vec<String>,
    /// Candidate places when the location was ambiguous.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub location_candidates: Vec<LocationCandidate>,
    /// Notes about ignored parts of the update.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Normalizes, merges and persists crime reports.
pub struct ReportService {
    store: Arc<dyn ReportStore>,
    geocoder: Arc<dyn Geocoder>,
    translator: Arc<dyn Translator>,
    weather: Option<Arc<dyn WeatherLookup>>,
    agency: AgencyConfig,
}

impl ReportService {
    /// Creates a service over the given adapters.
    #[must_use]
    pub fn new(
        store: Arc<dyn ReportStore>,
        geocoder: Arc<dyn Geocoder>,
        translator: Arc<dyn Translator>,
        weather: Option<Arc<dyn WeatherLookup>>,
        agency: AgencyConfig,
    ) -> Self {
        Self {
            store,
            geocoder,
            translator,
            weather,
            agency,
        }
    }

    /// The agency configuration.
    #[must_use]
    pub const fn agency(&self) -> &AgencyConfig {
        &self.agency
    }

    /// Reads a report.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::Storage`] if the backend request fails.
    pub async fn get_report(&self, record_id: &str) -> Result<Option<CrimeReport>, IntakeError> {
        Ok(self.store.get(record_id).await?)
    }

    /// Applies the arguments of one `update_crime_report` call.
    ///
    /// `arguments` may be the decoded object or the raw JSON string the
    /// model produced.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::Storage`] if reading or persisting fails.
    pub async fn update_report(
        &self,
        record_id: Option<&str>,
        arguments: &Value,
    ) -> Result<UpdateResponse, IntakeError> {
        let mut update = match arguments {
            Value::String(raw) => parse_update_str(raw),
            other => parse_update(other),
        };

        self.translate_update(&mut update).await;
        let location_candidates = self.verify_update_location(&mut update).await;

        let existing = self.load(record_id).await?;
        let outcome = merge_report(&existing, &update);
        let mut report = outcome.report;

        self.normalize_occurred_at(&mut report, &update, Utc::now());
        self.fill_weather(&mut report).await;

        let updated_fields = changed_fields(&existing, &report);
        let stored = self.persist(&report).await?;

        log::info!(
            "Saved report {} with {} changed field(s)",
            stored.record_id,
            updated_fields.len()
        );

        Ok(UpdateResponse {
            success: true,
            message: if location_candidates.is_empty() {
                SAVED_MESSAGE.to_string()
            } else {
                AMBIGUOUS_LOCATION_MESSAGE.to_string()
            },
            record_id: stored.record_id,
            case_number: stored.case_number,
            updated_fields: field_names(&updated_fields),
            location_candidates,
            warnings: outcome.warnings,
        })
    }

    /// Drafts an incident description from the current report and the
    /// reporter's own words.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::Storage`] if the report cannot be read.
    pub async fn draft_description(
        &self,
        record_id: Option<&str>,
        raw_description: &str,
    ) -> Result<String, IntakeError> {
        let raw = to_english(self.translator.as_ref(), raw_description).await;
        let report = self.load(record_id).await?;
        Ok(draft_incident_description(&report, &raw))
    }

    /// Sets the approved incident description, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::Storage`] if reading or persisting fails.
    pub async fn approve_description(
        &self,
        record_id: Option<&str>,
        final_summary: &str,
    ) -> Result<StoredRecord, IntakeError> {
        let mut report = self.load(record_id).await?;
        let summary = final_summary.trim();
        report.incident_description = if is_not_available(summary) {
            detective_report_models::NOT_AVAILABLE.to_string()
        } else {
            summary.to_string()
        };

        let stored = self.persist(&report).await?;
        log::info!("Approved incident description for report {}", stored.record_id);
        Ok(stored)
    }

    /// Appends one `[HH:MM:SS] Role: text` line per entry to the
    /// conversation log of an existing report. Blank and `undefined`
    /// texts are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::Storage`] if reading or persisting fails.
    pub async fn append_log(
        &self,
        record_id: &str,
        entries: &[(&str, &str)],
        at: DateTime<Utc>,
    ) -> Result<(), IntakeError> {
        let stamp = at.with_timezone(&self.agency.offset()).format("%H:%M:%S");
        let lines: Vec<String> = entries
            .iter()
            .map(|(role, text)| (role, text.trim()))
            .filter(|(_, text)| !text.is_empty() && *text != "undefined")
            .map(|(role, text)| format!("[{stamp}] {role}: {text}"))
            .collect();
        if lines.is_empty() {
            return Ok(());
        }

        let Some(mut report) = self.store.get(record_id).await? else {
            log::warn!("Cannot append to log of missing report {record_id}");
            return Ok(());
        };

        report.conversation_log = merge_log(&report.conversation_log, Some(&lines.join("\n")));
        self.store.update(record_id, &report).await?;
        Ok(())
    }

    /// Renders the Markdown summary of a report.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::Storage`] if the report cannot be read.
    pub async fn summary(&self, record_id: &str) -> Result<Option<String>, IntakeError> {
        let Some(report) = self.store.get(record_id).await? else {
            return Ok(None);
        };
        let now = Utc::now().with_timezone(&self.agency.offset());
        Ok(Some(render_summary(&report, &self.agency.brand_name, now)))
    }

    async fn load(&self, record_id: Option<&str>) -> Result<CrimeReport, IntakeError> {
        let Some(record_id) = record_id else {
            return Ok(CrimeReport::default());
        };

        match self.store.get(record_id).await? {
            Some(report) => Ok(report),
            None => {
                log::warn!("Report {record_id} not found in {}; starting a new one", self.store.name());
                Ok(CrimeReport::default())
            }
        }
    }

    async fn persist(&self, report: &CrimeReport) -> Result<StoredRecord, IntakeError> {
        let stored = match &report.record_id {
            Some(record_id) => self.store.update(record_id, report).await?,
            None => self.store.create(report).await?,
        };
        Ok(stored)
    }

    /// Translates every human-written value of the update to English.
    /// Clear markers are left alone.
    async fn translate_update(&self, update: &mut ReportUpdate) {
        for value in update.free_text_mut() {
            if is_not_available(value) {
                continue;
            }
            *value = to_english(self.translator.as_ref(), value).await;
        }
    }

    /// Verifies the update's location text.
    ///
    /// A single match replaces the text with the formatted address and
    /// sets coordinates. Several matches are returned for disambiguation
    /// and leave the update untouched.
    async fn verify_update_location(&self, update: &mut ReportUpdate) -> Vec<LocationCandidate> {
        let Some(location) = update.location_text.as_deref() else {
            return Vec::new();
        };
        if is_not_available(location) {
            return Vec::new();
        }

        match verify_location(self.geocoder.as_ref(), &self.agency.fallback_area(), location).await {
            Ok(LocationVerification::Single(candidate)) => {
                log::debug!("Location verified as {}", candidate.formatted_address);
                update.coordinates = Some(Coordinates::new(candidate.lat, candidate.lng));
                update.location_text = Some(candidate.formatted_address);
                Vec::new()
            }
            Ok(LocationVerification::Ambiguous(candidates)) => {
                log::info!("Location \"{location}\" matched {} places", candidates.len());
                candidates
            }
            Ok(LocationVerification::NotFound) => {
                log::info!("Location \"{location}\" could not be verified");
                Vec::new()
            }
            Err(e) => {
                log::warn!("Location verification failed: {e}");
                Vec::new()
            }
        }
    }

    /// Re-derives `occurred_at` from the incoming "when" text.
    ///
    /// A known instant is only replaced when the merge adopted the incoming
    /// text as is. Text that was kept or appended to leaves it alone.
    fn normalize_occurred_at(&self, report: &mut CrimeReport, update: &ReportUpdate, now: DateTime<Utc>) {
        let Some(incoming) = update.when_text.as_deref().map(str::trim) else {
            return;
        };

        if is_not_available(incoming) {
            report.occurred_at = None;
            return;
        }

        if report.occurred_at.is_some() && report.when_text != incoming {
            log::debug!("Keeping occurred_at; \"{incoming}\" was merged into existing text");
            return;
        }

        if let Some(at) = normalize_when(incoming, now, self.agency.offset()) {
            report.occurred_at = Some(at);
        } else if report.occurred_at.is_none() {
            log::debug!("Could not normalize \"{incoming}\"");
        }
    }

    /// Looks up the weather for reports that have a place and time but no
    /// weather yet.
    async fn fill_weather(&self, report: &mut CrimeReport) {
        let Some(weather) = &self.weather else {
            return;
        };
        let Some(at) = report.occurred_at else {
            return;
        };
        if report.coordinates.is_unset() || !is_not_available(&report.weather) {
            return;
        }

        let Coordinates { lat, lng } = report.coordinates;
        match weather.conditions_at(lat, lng, at).await {
            Ok(Some(conditions)) => report.weather = conditions,
            Ok(None) => log::debug!("No weather data for {lat},{lng} at {at}"),
            Err(e) => log::warn!("Weather lookup failed: {e}"),
        }
    }
}

fn field_names(fields: &[ReportField]) -> Vec<String> {
    fields.iter().map(ToString::to_string).collect()
}
