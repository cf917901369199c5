use std::sync::Arc;

use thiserror::Error;

use crate::{
    Config,
    fetch::FetchError,
    model::{ForecastResponse, LocationQuery, ResolvedPlace},
    normalize::normalize,
    provider::{ForecastProvider, provider_from_config},
    resolve::resolve_place,
    weather::{fetch_air_quality, fetch_weather},
};

/// Failures that reach the endpoint. Everything non-essential is absorbed
/// before this point.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("weather data unavailable: {0}")]
    Weather(#[source] FetchError),
}

impl ForecastError {
    /// Short, stable summary for clients.
    pub fn summary(&self) -> &'static str {
        match self {
            ForecastError::Weather(_) => "Failed to fetch weather data",
        }
    }
}

/// Runs one forecast request end to end: resolve, fetch, normalize.
///
/// Holds no per-request state; clones share the provider.
#[derive(Debug, Clone)]
pub struct ForecastService {
    provider: Arc<dyn ForecastProvider>,
    default_place: ResolvedPlace,
}

impl ForecastService {
    pub fn new(provider: Arc<dyn ForecastProvider>, default_place: ResolvedPlace) -> Self {
        Self {
            provider,
            default_place,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let provider: Arc<dyn ForecastProvider> = provider_from_config(config)?.into();
        Ok(Self::new(provider, config.default_place.clone()))
    }

    pub async fn forecast(&self, query: &LocationQuery) -> Result<ForecastResponse, ForecastError> {
        let provider = self.provider.as_ref();
        let place = resolve_place(provider, query, &self.default_place).await;

        // Independent calls over the same coordinates.
        let (weather, air_quality) = tokio::join!(
            fetch_weather(provider, &place),
            fetch_air_quality(provider, &place)
        );
        let weather = weather.map_err(ForecastError::Weather)?;

        let response = normalize(place, weather, air_quality);
        tracing::info!(
            place = %response.place.name,
            timezone = %response.timezone,
            air_quality = response.air_quality.current.is_some(),
            "forecast assembled"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DEFAULT_TIMEZONE;
    use crate::normalize::is_valid_timezone;
    use crate::provider::{GeoMatch, RawAirQuality, RawForecast, ReverseMatch};
    use async_trait::async_trait;
    use serde_json::{Value, json};

    #[derive(Debug, Clone)]
    struct Stub {
        geocode: Vec<GeoMatch>,
        forecast: Option<Value>,
        air_quality: Option<Value>,
    }

    fn unavailable() -> FetchError {
        FetchError::Exhausted {
            attempts: 3,
            last: "status 503 Service Unavailable".into(),
        }
    }

    #[async_trait]
    impl ForecastProvider for Stub {
        async fn geocode(&self, _: &str) -> Result<Vec<GeoMatch>, FetchError> {
            Ok(self.geocode.clone())
        }

        async fn reverse_geocode(
            &self,
            _: f64,
            _: f64,
        ) -> Result<Option<ReverseMatch>, FetchError> {
            Err(unavailable())
        }

        async fn forecast(&self, _: f64, _: f64) -> Result<RawForecast, FetchError> {
            match &self.forecast {
                Some(v) => Ok(serde_json::from_value(v.clone())?),
                None => Err(unavailable()),
            }
        }

        async fn air_quality(&self, _: f64, _: f64) -> Result<RawAirQuality, FetchError> {
            match &self.air_quality {
                Some(v) => Ok(serde_json::from_value(v.clone())?),
                None => Err(unavailable()),
            }
        }
    }

    fn forecast_body(timezone: &str) -> Value {
        json!({
            "timezone": timezone,
            "current_weather": {
                "temperature": -2.0,
                "windspeed": 14.0,
                "weathercode": 71,
                "time": "2024-01-01T12:00"
            },
            "hourly": {
                "time": ["2024-01-01T11:00", "2024-01-01T12:00", "2024-01-01T13:00"],
                "temperature_2m": [-2.5, -2.0, -1.8],
                "apparent_temperature": [-6.0, -5.5, -5.1],
                "relative_humidity_2m": [90, 88, 87],
                "precipitation_probability": [40, 55, null],
                "weathercode": [3, 71, 71]
            },
            "daily": {
                "time": ["2024-01-01", "2024-01-02"],
                "weathercode": [71, 3],
                "temperature_2m_max": [-1.0, 0.5],
                "temperature_2m_min": [-5.0, -4.0],
                "sunrise": ["2024-01-01T08:43", "2024-01-02T08:43"],
                "sunset": ["2024-01-01T14:55", "2024-01-02T14:56"]
            }
        })
    }

    fn aqi_body() -> Value {
        json!({
            "hourly": {
                "time": ["2024-01-01T11:00", "2024-01-01T12:00", "2024-01-01T13:00"],
                "european_aqi": [18, 21, 24],
                "pm2_5": [3.1, 3.4, 3.9]
            }
        })
    }

    fn stockholm() -> GeoMatch {
        GeoMatch {
            name: "Stockholm".into(),
            latitude: 59.33,
            longitude: 18.07,
            country: Some("Sweden".into()),
            admin1: None,
            timezone: Some("Europe/Stockholm".into()),
        }
    }

    fn default_place() -> ResolvedPlace {
        ResolvedPlace {
            name: "Fallback".into(),
            country: None,
            admin1: None,
            latitude: 0.0,
            longitude: 0.0,
            timezone: None,
        }
    }

    fn service(stub: Stub) -> ForecastService {
        ForecastService::new(Arc::new(stub), default_place())
    }

    fn assert_aligned(resp: &ForecastResponse) {
        if let Some(h) = &resp.hourly {
            let n = h.time.len();
            for len in [
                h.temperature_2m.as_ref().map(Vec::len),
                h.apparent_temperature.as_ref().map(Vec::len),
                h.relative_humidity_2m.as_ref().map(Vec::len),
                h.precipitation_probability.as_ref().map(Vec::len),
                h.weathercode.as_ref().map(Vec::len),
            ]
            .into_iter()
            .flatten()
            {
                assert_eq!(len, n);
            }
        }
        if let Some(d) = &resp.daily {
            let n = d.time.len();
            for len in [
                d.weathercode.as_ref().map(Vec::len),
                d.temperature_2m_max.as_ref().map(Vec::len),
                d.temperature_2m_min.as_ref().map(Vec::len),
                d.sunrise.as_ref().map(Vec::len),
                d.sunset.as_ref().map(Vec::len),
            ]
            .into_iter()
            .flatten()
            {
                assert_eq!(len, n);
            }
        }
    }

    #[tokio::test]
    async fn stockholm_scenario() {
        let svc = service(Stub {
            geocode: vec![stockholm()],
            forecast: Some(forecast_body("Europe/Stockholm")),
            air_quality: Some(aqi_body()),
        });

        let resp = svc
            .forecast(&LocationQuery::City("Stockholm".into()))
            .await
            .expect("forecast");

        assert_eq!(resp.place.name, "Stockholm");
        assert_eq!(resp.timezone, "Europe/Stockholm");
        assert_eq!(resp.place.timezone, resp.timezone);
        let hourly = resp.hourly.as_ref().expect("hourly");
        assert_eq!(
            hourly.time.len(),
            hourly.temperature_2m.as_ref().map(Vec::len).unwrap_or_default()
        );
        assert_eq!(
            resp.air_quality.current.as_ref().and_then(|c| c.pm2_5),
            Some(3.4)
        );
        assert_aligned(&resp);
    }

    #[tokio::test]
    async fn auto_timezone_is_never_forwarded() {
        for geocoded in [Some("Europe/Stockholm"), None] {
            let mut place = stockholm();
            place.timezone = geocoded.map(str::to_string);
            let svc = service(Stub {
                geocode: vec![place],
                forecast: Some(forecast_body("auto")),
                air_quality: Some(aqi_body()),
            });

            let resp = svc
                .forecast(&LocationQuery::City("Stockholm".into()))
                .await
                .expect("forecast");

            assert_ne!(resp.timezone, "auto");
            assert!(is_valid_timezone(&resp.timezone));
            assert_eq!(resp.timezone, geocoded.unwrap_or(DEFAULT_TIMEZONE));
            assert_eq!(resp.place.timezone, resp.timezone);
        }
    }

    #[tokio::test]
    async fn air_quality_failure_still_succeeds() {
        let svc = service(Stub {
            geocode: vec![stockholm()],
            forecast: Some(forecast_body("Europe/Stockholm")),
            air_quality: None,
        });

        let resp = svc
            .forecast(&LocationQuery::City("Stockholm".into()))
            .await
            .expect("forecast");

        assert!(resp.current_weather.is_some());
        assert!(resp.hourly.is_some());
        assert!(resp.daily.is_some());
        assert_eq!(
            serde_json::to_value(&resp.air_quality).expect("json"),
            json!({"time": [], "european_aqi": [], "pm2_5": [], "current": null})
        );
    }

    #[tokio::test]
    async fn weather_failure_is_fatal() {
        let svc = service(Stub {
            geocode: vec![stockholm()],
            forecast: None,
            air_quality: Some(aqi_body()),
        });

        let err = svc
            .forecast(&LocationQuery::City("Stockholm".into()))
            .await
            .unwrap_err();

        assert_eq!(err.summary(), "Failed to fetch weather data");
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn unresolvable_city_uses_default_place() {
        let svc = service(Stub {
            geocode: vec![],
            forecast: Some(forecast_body("Etc/UTC")),
            air_quality: Some(aqi_body()),
        });

        let resp = svc
            .forecast(&LocationQuery::City("Xyzzy".into()))
            .await
            .expect("forecast");

        assert_eq!(resp.place.name, "Fallback");
        assert_eq!(resp.timezone, "Etc/UTC");
    }

    #[tokio::test]
    async fn coordinates_with_failed_reverse_lookup_get_label() {
        let svc = service(Stub {
            geocode: vec![],
            forecast: Some(forecast_body("Europe/Stockholm")),
            air_quality: Some(aqi_body()),
        });

        let resp = svc
            .forecast(&LocationQuery::Coordinates {
                latitude: 59.33,
                longitude: 18.07,
            })
            .await
            .expect("forecast");

        assert_eq!(resp.place.name, "59.33,18.07");
        assert_eq!(resp.place.latitude, 59.33);
    }
}
