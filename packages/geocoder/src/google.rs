//! Google Geocoding API client.
//!
//! Free-form text is sent to the Geocoding API first. Landmarks and
//! business names often return nothing there, so a query with zero results
//! is retried against the Places Text Search API.
//!
//! See <https://developers.google.com/maps/documentation/geocoding/requests-geocoding>

use async_trait::async_trait;

use crate::{GeocodeError, Geocoder, LocationCandidate};

/// Google Geocoding client with a Places fallback.
pub struct GoogleGeocoder {
    client: reqwest::Client,
    api_key: String,
    geocode_url: String,
    places_url: String,
}

impl GoogleGeocoder {
    /// Creates a client for the given endpoints.
    #[must_use]
    pub const fn new(
        client: reqwest::Client,
        api_key: String,
        geocode_url: String,
        places_url: String,
    ) -> Self {
        Self {
            client,
            api_key,
            geocode_url,
            places_url,
        }
    }

    async fn fetch(&self, url: &str, param: &str, query: &str) -> Result<serde_json::Value, GeocodeError> {
        let resp = self
            .client
            .get(url)
            .query(&[(param, query), ("key", self.api_key.as_str())])
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }

        Ok(resp.error_for_status()?.json().await?)
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn search(&self, address: &str) -> Result<Vec<LocationCandidate>, GeocodeError> {
        let body = self.fetch(&self.geocode_url, "address", address).await?;
        let results = parse_response(&body)?;
        if !results.is_empty() {
            return Ok(results);
        }

        log::debug!("Geocoding returned no results for \"{address}\", trying Places");
        let body = self.fetch(&self.places_url, "query", address).await?;
        parse_response(&body)
    }
}

/// Parses a Geocoding or Places Text Search response.
///
/// Both APIs share the `status` / `results[].formatted_address` /
/// `results[].geometry.location` shape.
fn parse_response(body: &serde_json::Value) -> Result<Vec<LocationCandidate>, GeocodeError> {
    match body["status"].as_str().unwrap_or("OK") {
        "OK" => {}
        "ZERO_RESULTS" => return Ok(Vec::new()),
        "OVER_QUERY_LIMIT" => return Err(GeocodeError::RateLimited),
        status => {
            let detail = body["error_message"].as_str().unwrap_or("no details");
            return Err(GeocodeError::Parse {
                message: format!("Google returned status {status}: {detail}"),
            });
        }
    }

    let results = body["results"].as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Google response has no results array".to_string(),
    })?;

    Ok(results
        .iter()
        .filter_map(|r| {
            let location = &r["geometry"]["location"];
            Some(LocationCandidate {
                formatted_address: r["formatted_address"]
                    .as_str()
                    .or_else(|| r["name"].as_str())?
                    .to_string(),
                lat: location["lat"].as_f64()?,
                lng: location["lng"].as_f64()?,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_geocode_results() {
        let body = serde_json::json!({
            "status": "OK",
            "results": [
                {
                    "formatted_address": "Alamo Plaza, San Antonio, TX 78205, USA",
                    "geometry": { "location": { "lat": 29.4259, "lng": -98.4861 } }
                },
                { "formatted_address": "broken" }
            ]
        });
        let results = parse_response(&body).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].formatted_address,
            "Alamo Plaza, San Antonio, TX 78205, USA"
        );
        assert!((results[0].lat - 29.4259).abs() < 1e-6);
    }

    #[test]
    fn zero_results_is_empty() {
        let body = serde_json::json!({ "status": "ZERO_RESULTS", "results": [] });
        assert!(parse_response(&body).unwrap().is_empty());
    }

    #[test]
    fn denied_request_is_an_error() {
        let body = serde_json::json!({
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid."
        });
        let err = parse_response(&body).unwrap_err();
        assert!(err.to_string().contains("REQUEST_DENIED"));
    }

    #[test]
    fn over_limit_is_rate_limited() {
        let body = serde_json::json!({ "status": "OVER_QUERY_LIMIT" });
        assert!(matches!(parse_response(&body), Err(GeocodeError::RateLimited)));
    }
}
