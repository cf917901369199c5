use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    config::{RetryConfig, UpstreamConfig},
    fetch::{FetchError, Fetcher},
};

use super::{ForecastProvider, GeoMatch, RawAirQuality, RawForecast, ReverseMatch, nominatim};

pub const HOURLY_FIELDS: &str = concat!(
    "temperature_2m,apparent_temperature,relative_humidity_2m,",
    "precipitation_probability,weathercode"
);
pub const DAILY_FIELDS: &str = "weathercode,temperature_2m_max,temperature_2m_min,sunrise,sunset";
pub const AIR_QUALITY_FIELDS: &str = "european_aqi,pm2_5";

/// Open-Meteo for geocoding, forecast and air quality; Nominatim for
/// reverse geocoding.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    upstream: UpstreamConfig,
    retry: RetryConfig,
    http: Fetcher,
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Option<Vec<GeoMatch>>,
}

impl OpenMeteoProvider {
    pub fn new(upstream: UpstreamConfig, retry: RetryConfig) -> Result<Self, FetchError> {
        let http = Fetcher::new(&upstream.user_agent)?;
        Ok(Self {
            upstream,
            retry,
            http,
        })
    }
}

fn coordinates(latitude: f64, longitude: f64) -> [(&'static str, String); 2] {
    [
        ("latitude", latitude.to_string()),
        ("longitude", longitude.to_string()),
    ]
}

#[async_trait]
impl ForecastProvider for OpenMeteoProvider {
    async fn geocode(&self, name: &str) -> Result<Vec<GeoMatch>, FetchError> {
        let query = [
            ("name", name.to_string()),
            ("count", "1".to_string()),
            ("language", "en".to_string()),
            ("format", "json".to_string()),
        ];

        let parsed: GeocodingResponse = self
            .http
            .get_json(&self.upstream.geocoding_url, &query, &self.retry.geocoding)
            .await?;

        // The provider omits `results` entirely when nothing matches.
        Ok(parsed.results.unwrap_or_default())
    }

    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<ReverseMatch>, FetchError> {
        nominatim::reverse_geocode(
            &self.http,
            &self.upstream.reverse_geocoding_url,
            &self.retry.reverse_geocoding,
            latitude,
            longitude,
        )
        .await
    }

    async fn forecast(&self, latitude: f64, longitude: f64) -> Result<RawForecast, FetchError> {
        let [lat, lon] = coordinates(latitude, longitude);
        let query = [
            lat,
            lon,
            ("current_weather", "true".to_string()),
            ("hourly", HOURLY_FIELDS.to_string()),
            ("daily", DAILY_FIELDS.to_string()),
            ("timezone", "auto".to_string()),
        ];

        self.http
            .get_json(&self.upstream.forecast_url, &query, &self.retry.weather)
            .await
    }

    async fn air_quality(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<RawAirQuality, FetchError> {
        let [lat, lon] = coordinates(latitude, longitude);
        // Same timezone mode as the forecast so local timestamps line up.
        let query = [
            lat,
            lon,
            ("hourly", AIR_QUALITY_FIELDS.to_string()),
            ("timezone", "auto".to_string()),
        ];

        self.http
            .get_json(&self.upstream.air_quality_url, &query, &self.retry.air_quality)
            .await
    }
}
