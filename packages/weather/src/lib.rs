#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Weather conditions at the time and place of an incident.
//!
//! Uses the free Open-Meteo APIs, which need no key. The archive API lags
//! a few days behind, so recent incidents are read from the forecast API,
//! which keeps a window of past hourly data.
//!
//! See <https://open-meteo.com/en/docs/historical-weather-api>

use async_trait::async_trait;
use chrono::{DateTime, Duration, Timelike as _, Utc};
use thiserror::Error;

const ARCHIVE_URL: &str = "https://archive-api.open-meteo.com/v1/archive";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const HOURLY: &str = "temperature_2m,precipitation,weather_code,wind_speed_10m";

/// Incidents newer than this are looked up in the forecast API.
const ARCHIVE_LAG_DAYS: i64 = 5;

/// Errors from weather lookups.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },
}

/// A weather backend.
#[async_trait]
pub trait WeatherLookup: Send + Sync {
    /// Describes the conditions at `(lat, lng)` during the hour of `at`.
    ///
    /// Returns `None` if the provider has no data for that hour.
    ///
    /// # Errors
    ///
    /// Returns [`WeatherError`] if the request or parsing fails.
    async fn conditions_at(
        &self,
        lat: f64,
        lng: f64,
        at: DateTime<Utc>,
    ) -> Result<Option<String>, WeatherError>;
}

/// Open-Meteo client.
pub struct OpenMeteo {
    client: reqwest::Client,
    archive_url: String,
    forecast_url: String,
}

impl OpenMeteo {
    /// Creates a client against the public endpoints.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_urls(client, ARCHIVE_URL.to_string(), FORECAST_URL.to_string())
    }

    /// Creates a client against custom endpoints.
    #[must_use]
    pub const fn with_urls(client: reqwest::Client, archive_url: String, forecast_url: String) -> Self {
        Self {
            client,
            archive_url,
            forecast_url,
        }
    }
}

#[async_trait]
impl WeatherLookup for OpenMeteo {
    async fn conditions_at(
        &self,
        lat: f64,
        lng: f64,
        at: DateTime<Utc>,
    ) -> Result<Option<String>, WeatherError> {
        let url = if Utc::now() - at < Duration::days(ARCHIVE_LAG_DAYS) {
            &self.forecast_url
        } else {
            &self.archive_url
        };
        let date = at.format("%Y-%m-%d").to_string();

        let body: serde_json::Value = self
            .client
            .get(url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lng.to_string()),
                ("start_date", date.clone()),
                ("end_date", date),
                ("hourly", HOURLY.to_string()),
                ("timezone", "UTC".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_hour(&body, at.hour() as usize)
    }
}

/// Reads one hour from an Open-Meteo `hourly` block and describes it.
fn parse_hour(body: &serde_json::Value, hour: usize) -> Result<Option<String>, WeatherError> {
    let hourly = body.get("hourly").ok_or_else(|| WeatherError::Parse {
        message: "response has no hourly block".to_string(),
    })?;

    let value = |name: &str| hourly[name].get(hour).and_then(serde_json::Value::as_f64);

    let Some(code) = value("weather_code") else {
        return Ok(None);
    };

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mut parts = vec![describe_code(code as u32).to_string()];
    if let Some(temp) = value("temperature_2m") {
        parts.push(format!("{temp:.1}°C"));
    }
    if let Some(wind) = value("wind_speed_10m") {
        parts.push(format!("wind {wind:.0} km/h"));
    }
    if let Some(rain) = value("precipitation").filter(|r| *r > 0.0) {
        parts.push(format!("precipitation {rain:.1} mm"));
    }

    Ok(Some(parts.join(", ")))
}

/// Describes a WMO weather interpretation code.
#[must_use]
pub const fn describe_code(code: u32) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 | 53 | 55 => "Drizzle",
        56 | 57 => "Freezing drizzle",
        61 | 63 | 65 => "Rain",
        66 | 67 => "Freezing rain",
        71 | 73 | 75 | 77 => "Snow",
        80..=82 => "Rain showers",
        85 | 86 => "Snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunderstorm with hail",
        _ => "Unknown conditions",
    }
}

/// Builds the Open-Meteo lookup unless `WEATHER_ENABLED` is `false`.
///
/// `WEATHER_BASE_URL` overrides the archive endpoint.
#[must_use]
pub fn from_env(client: reqwest::Client) -> Option<Box<dyn WeatherLookup>> {
    let enabled = std::env::var("WEATHER_ENABLED")
        .map(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "no"))
        .unwrap_or(true);
    if !enabled {
        log::info!("Weather lookup disabled");
        return None;
    }

    let archive_url = std::env::var("WEATHER_BASE_URL").unwrap_or_else(|_| ARCHIVE_URL.to_string());
    Some(Box::new(OpenMeteo::with_urls(
        client,
        archive_url,
        FORECAST_URL.to_string(),
    )))
}
