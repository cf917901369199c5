//! Weather and air-quality fetches for a resolved place.
//!
//! The weather fetch is mandatory and propagates its error. The air-quality
//! fetch is best-effort: any failure is logged and reported as `None`, which
//! the normalizer turns into an empty block.

use crate::{
    fetch::FetchError,
    model::ResolvedPlace,
    provider::{ForecastProvider, RawAirQuality, RawForecast},
};

pub async fn fetch_weather(
    provider: &dyn ForecastProvider,
    place: &ResolvedPlace,
) -> Result<RawForecast, FetchError> {
    let raw = provider.forecast(place.latitude, place.longitude).await?;
    tracing::debug!(
        place = %place.name,
        timezone = ?raw.timezone,
        has_current = raw.current_weather.is_some(),
        "weather fetched"
    );
    Ok(raw)
}

pub async fn fetch_air_quality(
    provider: &dyn ForecastProvider,
    place: &ResolvedPlace,
) -> Option<RawAirQuality> {
    match provider.air_quality(place.latitude, place.longitude).await {
        Ok(raw) => Some(raw),
        Err(e) => {
            tracing::warn!(place = %place.name, error = %e, "air quality unavailable");
            None
        }
    }
}
