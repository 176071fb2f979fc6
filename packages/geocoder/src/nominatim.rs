//! Nominatim / OpenStreetMap geocoder client.
//!
//! Used when no Google API key is configured. The public instance allows
//! **1 request per second**; one lookup per chat turn stays well below it.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use async_trait::async_trait;

use crate::{GeocodeError, Geocoder, LocationCandidate};

/// Free-form Nominatim search client.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    country_codes: String,
    max_results: u32,
}

impl NominatimGeocoder {
    /// Creates a client for the given search endpoint.
    #[must_use]
    pub const fn new(
        client: reqwest::Client,
        base_url: String,
        country_codes: String,
        max_results: u32,
    ) -> Self {
        Self {
            client,
            base_url,
            country_codes,
            max_results,
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    fn name(&self) -> &'static str {
        "nominatim"
    }

    async fn search(&self, address: &str) -> Result<Vec<LocationCandidate>, GeocodeError> {
        let limit = self.max_results.to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", address),
                ("countrycodes", self.country_codes.as_str()),
                ("format", "jsonv2"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }

        let body: serde_json::Value = resp.error_for_status()?.json().await?;
        parse_response(&body)
    }
}

/// Parses Nominatim JSON response.
fn parse_response(body: &serde_json::Value) -> Result<Vec<LocationCandidate>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    results
        .iter()
        .map(|result| {
            let lat = result["lat"]
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| GeocodeError::Parse {
                    message: "Missing lat in Nominatim response".to_string(),
                })?;

            let lng = result["lon"]
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| GeocodeError::Parse {
                    message: "Missing lon in Nominatim response".to_string(),
                })?;

            Ok(LocationCandidate {
                formatted_address: result["display_name"].as_str().unwrap_or_default().to_string(),
                lat,
                lng,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nominatim_results() {
        let body = serde_json::json!([
            {
                "lat": "29.4259",
                "lon": "-98.4861",
                "display_name": "The Alamo, Alamo Plaza, San Antonio, Texas, USA"
            },
            {
                "lat": "29.4241",
                "lon": "-98.4936",
                "display_name": "San Antonio, Bexar County, Texas, USA"
            }
        ]);
        let results = parse_response(&body).unwrap();
        assert_eq!(results.len(), 2);
        assert!((results[0].lat - 29.4259).abs() < 1e-4);
        assert!((results[0].lng - -98.4861).abs() < 1e-4);
    }

    #[test]
    fn parses_nominatim_empty() {
        let body = serde_json::json!([]);
        assert!(parse_response(&body).unwrap().is_empty());
    }

    #[test]
    fn rejects_missing_coordinates() {
        let body = serde_json::json!([{ "display_name": "Nowhere" }]);
        assert!(parse_response(&body).is_err());
    }
}
