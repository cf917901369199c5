//! Reverse geocoding through Nominatim (OpenStreetMap).

use serde::Deserialize;

use crate::fetch::{FetchError, Fetcher, RetryPolicy};

use super::ReverseMatch;

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

impl NominatimAddress {
    fn into_match(self) -> Option<ReverseMatch> {
        // Prefer city > town > village > municipality for the primary name.
        let name = self
            .city
            .or(self.town)
            .or(self.village)
            .or(self.municipality)
            .or(self.county)
            .or_else(|| self.state.clone())
            .filter(|n| !n.trim().is_empty())?;

        Some(ReverseMatch {
            name,
            country: self.country,
            admin1: self.state,
        })
    }
}

/// Nearest named place for the coordinates, `None` when Nominatim has no
/// usable address (open sea, for instance).
pub async fn reverse_geocode(
    http: &Fetcher,
    url: &str,
    policy: &RetryPolicy,
    latitude: f64,
    longitude: f64,
) -> Result<Option<ReverseMatch>, FetchError> {
    let query = [
        ("lat", latitude.to_string()),
        ("lon", longitude.to_string()),
        ("format", "json".to_string()),
        ("addressdetails", "1".to_string()),
        ("zoom", "10".to_string()),
    ];

    let body: NominatimResponse = http.get_json(url, &query, policy).await?;
    let found = body.address.and_then(NominatimAddress::into_match);

    tracing::debug!(
        latitude,
        longitude,
        name = ?found.as_ref().map(|m| &m.name),
        "reverse geocoded"
    );
    Ok(found)
}
