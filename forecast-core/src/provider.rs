use crate::{Config, fetch::FetchError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt::Debug;

pub mod nominatim;
pub mod openmeteo;

pub use openmeteo::OpenMeteoProvider;

/// One candidate from forward geocoding.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeoMatch {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub admin1: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// The nearest named place for a coordinate pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ReverseMatch {
    pub name: String,
    pub country: Option<String>,
    pub admin1: Option<String>,
}

/// Forecast payload as the provider sent it.
///
/// Blocks stay as raw JSON objects until normalization so that drifted key
/// names are still visible to the repair step.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawForecast {
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub current_weather: Option<Map<String, Value>>,
    #[serde(default)]
    pub hourly: Option<Map<String, Value>>,
    #[serde(default)]
    pub daily: Option<Map<String, Value>>,
}

/// Air-quality payload as the provider sent it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawAirQuality {
    #[serde(default)]
    pub hourly: Option<Map<String, Value>>,
}

/// Upstream data sources. Each call carries its own retry budget.
#[async_trait]
pub trait ForecastProvider: Send + Sync + Debug {
    /// Best matches for a free-text place name, best first.
    async fn geocode(&self, name: &str) -> Result<Vec<GeoMatch>, FetchError>;

    /// Nearest named place, `None` when the provider knows nothing useful.
    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<ReverseMatch>, FetchError>;

    /// Current conditions plus hourly and daily series, timezone resolved by
    /// the provider.
    async fn forecast(&self, latitude: f64, longitude: f64) -> Result<RawForecast, FetchError>;

    async fn air_quality(&self, latitude: f64, longitude: f64)
    -> Result<RawAirQuality, FetchError>;
}

/// Construct the provider described by `config`.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn ForecastProvider>> {
    let provider = OpenMeteoProvider::new(config.upstream.clone(), config.retry.clone())?;
    Ok(Box::new(provider))
}
