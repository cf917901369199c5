use serde::{Deserialize, Serialize};

/// Universal fallback zone used when nothing better is known.
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// What the caller asked for: a free-text place name or explicit coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    City(String),
    Coordinates { latitude: f64, longitude: f64 },
}

impl LocationQuery {
    /// Build a query from raw request parameters.
    ///
    /// Coordinates win when both parse as finite numbers inside the valid
    /// latitude/longitude ranges. Otherwise the city string is used, even when
    /// empty (the resolver maps a blank city onto the default place).
    pub fn from_params(city: Option<&str>, lat: Option<&str>, lon: Option<&str>) -> Self {
        let parse = |v: Option<&str>| v.and_then(|s| s.trim().parse::<f64>().ok());

        match (parse(lat), parse(lon)) {
            (Some(latitude), Some(longitude)) if valid_coordinates(latitude, longitude) => {
                Self::Coordinates { latitude, longitude }
            }
            _ => Self::City(city.unwrap_or_default().trim().to_string()),
        }
    }
}

/// `latitude ∈ [-90, 90]` and `longitude ∈ [-180, 180]`, both finite.
pub fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

/// Label used when a coordinate pair has no human-readable name.
pub fn coordinate_label(latitude: f64, longitude: f64) -> String {
    format!("{latitude:.2},{longitude:.2}")
}

/// A place as produced by the resolver. The timezone is only a hint at this
/// stage; geocoding may omit it and it is finalized during normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPlace {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin1: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl ResolvedPlace {
    /// Attach the final, validated timezone.
    pub fn into_place(self, timezone: String) -> Place {
        Place {
            name: self.name,
            country: self.country,
            admin1: self.admin1,
            latitude: self.latitude,
            longitude: self.longitude,
            timezone,
        }
    }
}

/// Resolved location as it crosses the system boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin1: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    /// °C
    pub temperature: f64,
    pub weathercode: i64,
    /// km/h
    pub windspeed: f64,
    /// ISO-8601, local to the place's timezone.
    pub time: String,
}

/// Hourly series. Every present field has the same length as `time`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlySeries {
    pub time: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_2m: Option<Vec<Option<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apparent_temperature: Option<Vec<Option<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_humidity_2m: Option<Vec<Option<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation_probability: Option<Vec<Option<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weathercode: Option<Vec<Option<i64>>>,
}

/// Daily series. Same alignment rule as [`HourlySeries`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailySeries {
    pub time: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weathercode: Option<Vec<Option<i64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_2m_max: Option<Vec<Option<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_2m_min: Option<Vec<Option<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunrise: Option<Vec<Option<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunset: Option<Vec<Option<String>>>,
}

/// The air-quality sample matching the current-weather timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AirQualityCurrent {
    pub european_aqi: Option<f64>,
    pub pm2_5: Option<f64>,
}

/// Hourly air quality. Never absent from a response: a failed fetch leaves
/// empty arrays and `current: null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AirQuality {
    pub time: Vec<String>,
    pub european_aqi: Vec<Option<f64>>,
    pub pm2_5: Vec<Option<f64>>,
    pub current: Option<AirQualityCurrent>,
}

/// Normalized payload returned to clients.
///
/// Sections that could not be obtained serialize as `null` rather than being
/// omitted, so the schema is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub place: Place,
    pub timezone: String,
    pub current_weather: Option<CurrentWeather>,
    pub hourly: Option<HourlySeries>,
    pub daily: Option<DailySeries>,
    pub air_quality: AirQuality,
}
