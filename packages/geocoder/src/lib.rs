#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Location verification for crime reports.
//!
//! Free-form location text from a reporter is resolved to zero, one, or
//! several candidate addresses. Providers are configured via TOML files in
//! `services/` and selected at startup:
//!
//! 1. **Google Geocoding** (priority 1): requires `GOOGLE_MAPS_API_KEY`.
//!    Falls back to Places Text Search when geocoding finds nothing.
//! 2. **Nominatim / OpenStreetMap** (priority 2): no key required.
//!
//! Reporters rarely name their city, so [`FallbackArea`] appends the
//! agency's jurisdiction to text that mentions none of its keywords.

pub mod google;
pub mod nominatim;
pub mod service_registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::google::GoogleGeocoder;
use crate::nominatim::NominatimGeocoder;
use crate::service_registry::{ProviderConfig, enabled_services, find_service};

/// One geocoded match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationCandidate {
    /// Canonical address returned by the provider.
    pub formatted_address: String,
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lng: f64,
}

/// Outcome of verifying a location.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationVerification {
    /// Nothing matched.
    NotFound,
    /// Exactly one match; safe to adopt.
    Single(LocationCandidate),
    /// Several matches; the reporter must pick one.
    Ambiguous(Vec<LocationCandidate>),
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The requested provider cannot be used.
    #[error("Geocoder not configured: {message}")]
    NotConfigured {
        /// What is missing.
        message: String,
    },
}

/// A geocoding backend.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Short provider identifier for logging.
    fn name(&self) -> &'static str;

    /// Returns every candidate for a free-form address.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request or response parsing fails.
    async fn search(&self, address: &str) -> Result<Vec<LocationCandidate>, GeocodeError>;
}

/// The agency's jurisdiction, appended to locations that do not name it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackArea {
    /// Text appended after a comma, e.g. `"San Antonio, TX"`.
    pub suffix: String,
    /// Lowercase keywords whose presence means the text is already scoped.
    pub keywords: Vec<String>,
}

impl FallbackArea {
    /// Creates a fallback area.
    #[must_use]
    pub fn new(suffix: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            suffix: suffix.into(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Returns the query to geocode for `location`.
    #[must_use]
    pub fn adjust(&self, location: &str) -> String {
        let location = location.trim();
        let lower = location.to_lowercase();
        if self.suffix.is_empty() || self.keywords.iter().any(|k| lower.contains(k.as_str())) {
            location.to_string()
        } else {
            format!("{location}, {}", self.suffix)
        }
    }
}

/// Resolves free-form location text.
///
/// # Errors
///
/// Returns [`GeocodeError`] if the provider fails.
pub async fn verify_location(
    geocoder: &dyn Geocoder,
    area: &FallbackArea,
    location: &str,
) -> Result<LocationVerification, GeocodeError> {
    if location.trim().is_empty() {
        return Ok(LocationVerification::NotFound);
    }

    let query = area.adjust(location);
    log::debug!("Verifying location \"{query}\" with {}", geocoder.name());

    let mut candidates = geocoder.search(&query).await?;
    Ok(match candidates.len() {
        0 => LocationVerification::NotFound,
        1 => LocationVerification::Single(candidates.remove(0)),
        _ => LocationVerification::Ambiguous(candidates),
    })
}

/// Builds the geocoder selected by `GEOCODER_PROVIDER`, or the highest
/// priority enabled service whose requirements are met.
///
/// `GOOGLE_MAPS_API_KEY` supplies the Google key; `NOMINATIM_URL`
/// overrides the Nominatim endpoint.
///
/// # Errors
///
/// Returns [`GeocodeError::NotConfigured`] if the requested provider is
/// unknown or lacks its API key.
pub fn from_env(client: reqwest::Client) -> Result<Box<dyn Geocoder>, GeocodeError> {
    let api_key = std::env::var("GOOGLE_MAPS_API_KEY")
        .ok()
        .filter(|k| !k.is_empty());

    let service = match std::env::var("GEOCODER_PROVIDER") {
        Ok(id) if !id.is_empty() => find_service(&id).ok_or_else(|| GeocodeError::NotConfigured {
            message: format!("unknown provider '{id}'"),
        })?,
        _ => enabled_services()
            .into_iter()
            .find(|s| !s.requires_api_key || api_key.is_some())
            .ok_or_else(|| GeocodeError::NotConfigured {
                message: "no enabled geocoding service".to_string(),
            })?,
    };

    log::info!("Using {} for location verification", service.name);

    match service.provider {
        ProviderConfig::Google {
            geocode_url,
            places_url,
        } => {
            let api_key = api_key.ok_or_else(|| GeocodeError::NotConfigured {
                message: "GOOGLE_MAPS_API_KEY is not set".to_string(),
            })?;
            Ok(Box::new(GoogleGeocoder::new(
                client,
                api_key,
                geocode_url,
                places_url,
            )))
        }
        ProviderConfig::Nominatim {
            base_url,
            country_codes,
            max_results,
        } => {
            let base_url = std::env::var("NOMINATIM_URL").unwrap_or(base_url);
            Ok(Box::new(NominatimGeocoder::new(
                client,
                base_url,
                country_codes,
                max_results,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedGeocoder {
        results: Vec<LocationCandidate>,
        queries: Mutex<Vec<String>>,
    }

    impl FixedGeocoder {
        fn new(count: usize) -> Self {
            Self {
                results: (0..count)
                    .map(|i| LocationCandidate {
                        formatted_address: format!("{i} Main St, San Antonio, TX"),
                        lat: 29.0 + f64::from(u32::try_from(i).unwrap()),
                        lng: -98.0,
                    })
                    .collect(),
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn search(&self, address: &str) -> Result<Vec<LocationCandidate>, GeocodeError> {
            self.queries.lock().unwrap().push(address.to_string());
            Ok(self.results.clone())
        }
    }

    fn area() -> FallbackArea {
        FallbackArea::new("San Antonio, TX", &["san antonio", "bexar"])
    }

    #[test]
    fn appends_fallback_area_when_unscoped() {
        assert_eq!(area().adjust(" 100 Main St "), "100 Main St, San Antonio, TX");
        assert_eq!(area().adjust("Alamo, San Antonio"), "Alamo, San Antonio");
        assert_eq!(area().adjust("Bexar County jail"), "Bexar County jail");
    }

    #[test]
    fn empty_suffix_leaves_text_alone() {
        let area = FallbackArea::new("", &[]);
        assert_eq!(area.adjust("Main St"), "Main St");
    }

    #[tokio::test]
    async fn classifies_match_counts() {
        let none = FixedGeocoder::new(0);
        assert_eq!(
            verify_location(&none, &area(), "Main St").await.unwrap(),
            LocationVerification::NotFound
        );

        let one = FixedGeocoder::new(1);
        let LocationVerification::Single(found) =
            verify_location(&one, &area(), "Main St").await.unwrap()
        else {
            panic!("expected a single match");
        };
        assert_eq!(found.formatted_address, "0 Main St, San Antonio, TX");
        assert_eq!(
            one.queries.lock().unwrap().as_slice(),
            ["Main St, San Antonio, TX".to_string()]
        );

        let many = FixedGeocoder::new(3);
        assert!(matches!(
            verify_location(&many, &area(), "Main St").await.unwrap(),
            LocationVerification::Ambiguous(c) if c.len() == 3
        ));
    }

    #[tokio::test]
    async fn blank_location_skips_lookup() {
        let geocoder = FixedGeocoder::new(1);
        assert_eq!(
            verify_location(&geocoder, &area(), "  ").await.unwrap(),
            LocationVerification::NotFound
        );
        assert!(geocoder.queries.lock().unwrap().is_empty());
    }

    #[test]
    fn candidate_serializes_camel_case() {
        let candidate = LocationCandidate {
            formatted_address: "A".to_string(),
            lat: 1.0,
            lng: 2.0,
        };
        assert_eq!(
            serde_json::to_value(&candidate).unwrap(),
            serde_json::json!({ "formattedAddress": "A", "lat": 1.0, "lng": 2.0 })
        );
    }
}
