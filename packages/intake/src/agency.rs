//! Agency configuration.
//!
//! Defaults are embedded from `agency.toml` at compile time; environment
//! variables override individual keys.

use chrono::FixedOffset;
use detective_geocoder::FallbackArea;
use serde::Deserialize;

const AGENCY_TOML: &str = include_str!("../agency.toml");

/// Branding, jurisdiction and local time settings of the reporting agency.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgencyConfig {
    /// Name shown in summaries and greetings.
    pub brand_name: String,
    /// Appended to locations that do not name the jurisdiction.
    pub fallback_city: String,
    /// County of the jurisdiction.
    pub fallback_county: String,
    /// Lowercase keywords meaning a location is already scoped.
    pub jurisdiction_keywords: Vec<String>,
    /// Local offset from UTC in minutes.
    pub utc_offset_minutes: i32,
}

impl AgencyConfig {
    /// Parses the embedded defaults.
    ///
    /// # Panics
    ///
    /// Panics if the embedded `agency.toml` is malformed (a compile-time
    /// guarantee since the file is embedded).
    #[must_use]
    pub fn embedded() -> Self {
        toml::de::from_str(AGENCY_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse embedded agency.toml: {e}"))
    }

    /// Embedded defaults with `BRAND_NAME`, `FALLBACK_CITY`,
    /// `FALLBACK_COUNTY` and `UTC_OFFSET_MINUTES` applied.
    #[must_use]
    pub fn from_env() -> Self {
        Self::embedded().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(brand_name) = get("BRAND_NAME") {
            self.brand_name = brand_name;
        }
        if let Some(city) = get("FALLBACK_CITY") {
            self.fallback_city = city;
        }
        if let Some(county) = get("FALLBACK_COUNTY") {
            self.fallback_county = county;
        }
        if let Some(offset) = get("UTC_OFFSET_MINUTES") {
            match offset.trim().parse() {
                Ok(minutes) => self.utc_offset_minutes = minutes,
                Err(e) => log::warn!("Ignoring UTC_OFFSET_MINUTES={offset}: {e}"),
            }
        }
        self
    }

    /// The local offset, falling back to UTC when out of range.
    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap_or_else(|| unreachable!()))
    }

    /// The geocoding fallback area.
    #[must_use]
    pub fn fallback_area(&self) -> FallbackArea {
        let keywords: Vec<&str> = self.jurisdiction_keywords.iter().map(String::as_str).collect();
        FallbackArea::new(self.fallback_city.clone(), &keywords)
    }
}

impl Default for AgencyConfig {
    fn default() -> Self {
        Self::embedded()
    }
}
