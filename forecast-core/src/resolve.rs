//! Turns a [`LocationQuery`] into a [`ResolvedPlace`].
//!
//! Resolution never fails: unresolvable names land on the configured default
//! place and coordinates without a reverse-geocoded name get a numeric label.

use crate::{
    model::{LocationQuery, ResolvedPlace, coordinate_label, valid_coordinates},
    provider::ForecastProvider,
};

pub async fn resolve_place(
    provider: &dyn ForecastProvider,
    query: &LocationQuery,
    default_place: &ResolvedPlace,
) -> ResolvedPlace {
    match query {
        LocationQuery::Coordinates {
            latitude,
            longitude,
        } => resolve_coordinates(provider, *latitude, *longitude).await,
        LocationQuery::City(city) => {
            let city = city.trim();
            if city.is_empty() {
                tracing::debug!("blank city, using default place");
                return default_place.clone();
            }
            resolve_city(provider, city, default_place).await
        }
    }
}

async fn resolve_coordinates(
    provider: &dyn ForecastProvider,
    latitude: f64,
    longitude: f64,
) -> ResolvedPlace {
    let found = match provider.reverse_geocode(latitude, longitude).await {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(latitude, longitude, error = %e, "reverse geocoding failed");
            None
        }
    };

    let (name, country, admin1) = match found {
        Some(m) => (m.name, m.country, m.admin1),
        None => (coordinate_label(latitude, longitude), None, None),
    };

    ResolvedPlace {
        name,
        country,
        admin1,
        latitude,
        longitude,
        timezone: None,
    }
}

async fn resolve_city(
    provider: &dyn ForecastProvider,
    city: &str,
    default_place: &ResolvedPlace,
) -> ResolvedPlace {
    let first = match provider.geocode(city).await {
        Ok(matches) => matches.into_iter().next(),
        Err(e) => {
            tracing::warn!(city, error = %e, "geocoding failed, using default place");
            return default_place.clone();
        }
    };

    match first {
        Some(m) if valid_coordinates(m.latitude, m.longitude) => ResolvedPlace {
            name: m.name,
            country: m.country,
            admin1: m.admin1,
            latitude: m.latitude,
            longitude: m.longitude,
            timezone: m.timezone,
        },
        Some(m) => {
            tracing::warn!(
                city,
                latitude = m.latitude,
                longitude = m.longitude,
                "geocoder returned out-of-range coordinates, using default place"
            );
            default_place.clone()
        }
        None => {
            tracing::info!(city, "no geocoding match, using default place");
            default_place.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use crate::provider::{GeoMatch, RawAirQuality, RawForecast, ReverseMatch};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct StubGeo {
        matches: Vec<GeoMatch>,
        reverse: Option<ReverseMatch>,
        fail: bool,
        geocode_calls: AtomicUsize,
    }

    fn unavailable() -> FetchError {
        FetchError::Exhausted {
            attempts: 1,
            last: "timed out".into(),
        }
    }

    #[async_trait]
    impl ForecastProvider for StubGeo {
        async fn geocode(&self, _name: &str) -> Result<Vec<GeoMatch>, FetchError> {
            self.geocode_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(unavailable());
            }
            Ok(self.matches.clone())
        }

        async fn reverse_geocode(
            &self,
            _: f64,
            _: f64,
        ) -> Result<Option<ReverseMatch>, FetchError> {
            if self.fail {
                return Err(unavailable());
            }
            Ok(self.reverse.clone())
        }

        async fn forecast(&self, _: f64, _: f64) -> Result<RawForecast, FetchError> {
            Ok(RawForecast::default())
        }

        async fn air_quality(&self, _: f64, _: f64) -> Result<RawAirQuality, FetchError> {
            Ok(RawAirQuality::default())
        }
    }

    fn default_place() -> ResolvedPlace {
        ResolvedPlace {
            name: "Default".into(),
            country: None,
            admin1: None,
            latitude: 1.0,
            longitude: 2.0,
            timezone: Some("UTC".into()),
        }
    }

    fn stockholm() -> GeoMatch {
        GeoMatch {
            name: "Stockholm".into(),
            latitude: 59.33,
            longitude: 18.07,
            country: Some("Sweden".into()),
            admin1: Some("Stockholm".into()),
            timezone: Some("Europe/Stockholm".into()),
        }
    }

    #[tokio::test]
    async fn city_uses_first_match() {
        let stub = StubGeo {
            matches: vec![stockholm(), GeoMatch { name: "Other".into(), ..stockholm() }],
            ..StubGeo::default()
        };

        let place =
            resolve_place(&stub, &LocationQuery::City("Stockholm".into()), &default_place()).await;
        assert_eq!(place.name, "Stockholm");
        assert_eq!(place.timezone.as_deref(), Some("Europe/Stockholm"));
    }

    #[tokio::test]
    async fn unknown_city_falls_back_to_default() {
        let stub = StubGeo::default();
        let place =
            resolve_place(&stub, &LocationQuery::City("Xyzzy".into()), &default_place()).await;
        assert_eq!(place, default_place());
    }

    #[tokio::test]
    async fn geocoding_failure_falls_back_to_default() {
        let stub = StubGeo {
            fail: true,
            ..StubGeo::default()
        };
        let place =
            resolve_place(&stub, &LocationQuery::City("Stockholm".into()), &default_place()).await;
        assert_eq!(place, default_place());
    }

    #[tokio::test]
    async fn blank_city_skips_geocoding() {
        let stub = StubGeo {
            matches: vec![stockholm()],
            ..StubGeo::default()
        };
        let place =
            resolve_place(&stub, &LocationQuery::City("   ".into()), &default_place()).await;
        assert_eq!(place, default_place());
        assert_eq!(stub.geocode_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn coordinates_use_reverse_geocoded_name() {
        let stub = StubGeo {
            reverse: Some(ReverseMatch {
                name: "Stockholm".into(),
                country: Some("Sverige".into()),
                admin1: None,
            }),
            ..StubGeo::default()
        };
        let query = LocationQuery::Coordinates {
            latitude: 59.33,
            longitude: 18.07,
        };

        let place = resolve_place(&stub, &query, &default_place()).await;
        assert_eq!(place.name, "Stockholm");
        assert_eq!(place.latitude, 59.33);
        assert_eq!(place.timezone, None);
        assert_eq!(stub.geocode_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn coordinates_without_name_get_numeric_label() {
        let stub = StubGeo {
            fail: true,
            ..StubGeo::default()
        };
        let query = LocationQuery::Coordinates {
            latitude: 59.33,
            longitude: 18.07,
        };

        let place = resolve_place(&stub, &query, &default_place()).await;
        assert_eq!(place.name, "59.33,18.07");
        assert_eq!(place.country, None);
    }
}
