//! Compile-time registry of geocoding service configurations.
//!
//! Each provider is defined in a TOML file under `services/`. The registry
//! embeds these at compile time and exposes them via [`all_services`] and
//! [`enabled_services`].

use serde::Deserialize;

/// A geocoding service configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingService {
    /// Unique identifier (`"google"` or `"nominatim"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether this service may be selected.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Selection order; lower values are preferred.
    pub priority: u32,
    /// Whether the service is unusable without an API key.
    #[serde(default)]
    pub requires_api_key: bool,
    /// Provider-specific configuration.
    pub provider: ProviderConfig,
}

/// Provider-specific configuration, tagged by `type` in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Google Geocoding API with a Places Text Search fallback.
    Google {
        /// Geocoding endpoint.
        geocode_url: String,
        /// Places Text Search endpoint.
        places_url: String,
    },
    /// Nominatim / `OpenStreetMap` search.
    Nominatim {
        /// Search endpoint.
        base_url: String,
        /// Comma-separated ISO country codes to restrict results to.
        country_codes: String,
        /// Maximum candidates requested per query.
        #[serde(default = "default_max_results")]
        max_results: u32,
    },
}

const fn default_true() -> bool {
    true
}

const fn default_max_results() -> u32 {
    5
}

impl GeocodingService {
    /// Returns the provider's primary endpoint.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match &self.provider {
            ProviderConfig::Google { geocode_url, .. } => geocode_url,
            ProviderConfig::Nominatim { base_url, .. } => base_url,
        }
    }
}

const SERVICE_TOMLS: &[(&str, &str)] = &[
    ("google", include_str!("../services/google.toml")),
    ("nominatim", include_str!("../services/nominatim.toml")),
];

#[cfg(test)]
const EXPECTED_SERVICE_COUNT: usize = 2;

/// Returns all geocoding service configurations (enabled and disabled).
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_services() -> Vec<GeocodingService> {
    SERVICE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse geocoding service '{name}': {e}"))
        })
        .collect()
}

/// Returns only enabled services, sorted by priority (ascending).
#[must_use]
pub fn enabled_services() -> Vec<GeocodingService> {
    let mut services: Vec<GeocodingService> =
        all_services().into_iter().filter(|s| s.enabled).collect();
    services.sort_by_key(|s| s.priority);
    services
}

/// Looks up an enabled service by id.
#[must_use]
pub fn find_service(id: &str) -> Option<GeocodingService> {
    enabled_services().into_iter().find(|s| s.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn loads_all_services() {
        assert_eq!(all_services().len(), EXPECTED_SERVICE_COUNT);
    }

    #[test]
    fn service_ids_are_unique() {
        let mut seen = BTreeSet::new();
        for svc in &all_services() {
            assert!(seen.insert(svc.id.clone()), "Duplicate service ID: {}", svc.id);
            assert!(!svc.name.is_empty());
            assert!(!svc.base_url().is_empty());
        }
    }

    #[test]
    fn google_is_preferred_and_needs_a_key() {
        let services = enabled_services();
        assert_eq!(services[0].id, "google");
        assert!(services[0].requires_api_key);
        assert!(!find_service("nominatim").unwrap().requires_api_key);
        assert!(find_service("census").is_none());
    }
}
