//! Reconciles raw upstream payloads into a [`ForecastResponse`].
//!
//! Rules, in the order they are applied:
//! 1. Timezone: the forecast's reported zone unless absent or `"auto"`, then
//!    the geocoded zone, then UTC. Whatever is chosen must parse as an IANA
//!    zone or UTC is used instead.
//! 2. Key repair: known drifted key names are copied onto their canonical
//!    names when the canonical key is missing.
//! 3. Alignment: hourly/daily fields whose length differs from `time` are
//!    dropped; air-quality series are padded or truncated to their `time`.
//!    The air-quality `current` sample is the exact timestamp match of the
//!    current weather, or `null`.
//! 4. Missing sections stay in the payload as `null`.

use chrono_tz::Tz;
use serde_json::{Map, Value};

use crate::{
    model::{
        AirQuality, AirQualityCurrent, CurrentWeather, DEFAULT_TIMEZONE, DailySeries,
        ForecastResponse, HourlySeries, ResolvedPlace,
    },
    provider::{RawAirQuality, RawForecast},
};

/// `(canonical, known malformed alternates)`.
pub type KeyRepairs = &'static [(&'static str, &'static [&'static str])];

pub const CURRENT_WEATHER_REPAIRS: KeyRepairs = &[
    ("weathercode", &["weather_code"]),
    ("windspeed", &["wind_speed", "windspeed_10m"]),
];

pub const HOURLY_REPAIRS: KeyRepairs = &[
    ("weathercode", &["weather_code"]),
    ("relative_humidity_2m", &["relativehumidity_2m"]),
    ("precipitation_probability", &["precipitation_probabilty"]),
];

pub const DAILY_REPAIRS: KeyRepairs = &[
    ("weathercode", &["weather_code"]),
    ("temperature_2m_min", &["temperature_2m_mim", "temperature_2min", "temperature2m_min"]),
    ("temperature_2m_max", &["temperature_2max", "temperature2m_max"]),
];

/// Whether `zone` can be used to render local times.
pub fn is_valid_timezone(zone: &str) -> bool {
    zone.parse::<Tz>().is_ok()
}

/// Pick the zone reported to clients. Never returns `"auto"` or an unknown name.
pub fn normalize_timezone(reported: Option<&str>, geocoded: Option<&str>) -> String {
    let usable = |z: &&str| !z.is_empty() && !z.eq_ignore_ascii_case("auto");

    let chosen = reported
        .map(str::trim)
        .filter(usable)
        .or_else(|| geocoded.map(str::trim).filter(usable))
        .unwrap_or(DEFAULT_TIMEZONE);

    if is_valid_timezone(chosen) {
        chosen.to_string()
    } else {
        tracing::warn!(zone = chosen, "unrecognized timezone, falling back to UTC");
        DEFAULT_TIMEZONE.to_string()
    }
}

/// Copy drifted keys onto their canonical names. Canonical keys that are
/// already present are never overwritten.
pub fn repair_keys(block: &mut Map<String, Value>, repairs: KeyRepairs) {
    for (canonical, alternates) in repairs {
        if block.contains_key(*canonical) {
            continue;
        }
        if let Some((alt, value)) = alternates
            .iter()
            .find_map(|alt| block.get(*alt).map(|v| (*alt, v.clone())))
        {
            tracing::debug!(from = alt, to = canonical, "repaired upstream key");
            block.insert((*canonical).to_string(), value);
        }
    }
}

fn number_series(value: &Value) -> Option<Vec<Option<f64>>> {
    value
        .as_array()?
        .iter()
        .map(|v| match v {
            Value::Null => Some(None),
            other => other.as_f64().map(Some),
        })
        .collect()
}

fn code_series(value: &Value) -> Option<Vec<Option<i64>>> {
    value
        .as_array()?
        .iter()
        .map(|v| match v {
            Value::Null => Some(None),
            other => other
                .as_i64()
                .or_else(|| other.as_f64().map(|f| f as i64))
                .map(Some),
        })
        .collect()
}

fn text_series(value: &Value) -> Option<Vec<Option<String>>> {
    value
        .as_array()?
        .iter()
        .map(|v| match v {
            Value::Null => Some(None),
            Value::String(s) => Some(Some(s.clone())),
            _ => None,
        })
        .collect()
}

fn time_axis(block: &Map<String, Value>) -> Option<Vec<String>> {
    block
        .get("time")?
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

/// Reads fields of one block, keeping only those aligned with its time axis.
struct Aligned<'a> {
    block: &'a Map<String, Value>,
    len: usize,
    section: &'static str,
}

impl Aligned<'_> {
    fn field<T>(&self, key: &str, parse: fn(&Value) -> Option<Vec<T>>) -> Option<Vec<T>> {
        let raw = self.block.get(key)?;
        let Some(series) = parse(raw) else {
            tracing::warn!(section = self.section, field = key, "dropping malformed series");
            return None;
        };
        if series.len() != self.len {
            tracing::warn!(
                section = self.section,
                field = key,
                len = series.len(),
                expected = self.len,
                "dropping misaligned series"
            );
            return None;
        }
        Some(series)
    }
}

pub fn build_hourly(mut block: Map<String, Value>) -> Option<HourlySeries> {
    repair_keys(&mut block, HOURLY_REPAIRS);
    let time = time_axis(&block)?;
    let f = Aligned {
        block: &block,
        len: time.len(),
        section: "hourly",
    };

    Some(HourlySeries {
        temperature_2m: f.field("temperature_2m", number_series),
        apparent_temperature: f.field("apparent_temperature", number_series),
        relative_humidity_2m: f.field("relative_humidity_2m", number_series),
        precipitation_probability: f.field("precipitation_probability", number_series),
        weathercode: f.field("weathercode", code_series),
        time,
    })
}

pub fn build_daily(mut block: Map<String, Value>) -> Option<DailySeries> {
    repair_keys(&mut block, DAILY_REPAIRS);
    let time = time_axis(&block)?;
    let f = Aligned {
        block: &block,
        len: time.len(),
        section: "daily",
    };

    Some(DailySeries {
        weathercode: f.field("weathercode", code_series),
        temperature_2m_max: f.field("temperature_2m_max", number_series),
        temperature_2m_min: f.field("temperature_2m_min", number_series),
        sunrise: f.field("sunrise", text_series),
        sunset: f.field("sunset", text_series),
        time,
    })
}

pub fn build_current(mut block: Map<String, Value>) -> Option<CurrentWeather> {
    repair_keys(&mut block, CURRENT_WEATHER_REPAIRS);
    match serde_json::from_value(Value::Object(block)) {
        Ok(current) => Some(current),
        Err(e) => {
            tracing::warn!(error = %e, "discarding malformed current_weather");
            None
        }
    }
}

fn fit_to(mut series: Vec<Option<f64>>, len: usize, field: &str) -> Vec<Option<f64>> {
    if series.len() != len {
        tracing::warn!(field, len = series.len(), expected = len, "realigning air-quality series");
        series.resize(len, None);
    }
    series
}

/// Air-quality block aligned to the current-weather timestamp.
///
/// Only an exact timestamp match populates `current`.
pub fn build_air_quality(raw: Option<RawAirQuality>, current_time: Option<&str>) -> AirQuality {
    let Some(block) = raw.and_then(|r| r.hourly) else {
        return AirQuality::default();
    };
    let Some(time) = time_axis(&block) else {
        tracing::warn!("air-quality payload without a time axis");
        return AirQuality::default();
    };

    let len = time.len();
    let series = |key: &str| {
        let values = block.get(key).and_then(number_series).unwrap_or_default();
        fit_to(values, len, key)
    };
    let european_aqi = series("european_aqi");
    let pm2_5 = series("pm2_5");

    let current = current_time
        .and_then(|t| time.iter().position(|sample| sample == t))
        .map(|i| AirQualityCurrent {
            european_aqi: european_aqi[i],
            pm2_5: pm2_5[i],
        });

    AirQuality {
        time,
        european_aqi,
        pm2_5,
        current,
    }
}

/// Combine the resolved place, the forecast and the (optional) air-quality
/// result into the client payload.
pub fn normalize(
    place: ResolvedPlace,
    weather: RawForecast,
    air_quality: Option<RawAirQuality>,
) -> ForecastResponse {
    let timezone = normalize_timezone(weather.timezone.as_deref(), place.timezone.as_deref());

    let current_weather = weather.current_weather.and_then(build_current);
    let hourly = weather.hourly.and_then(build_hourly);
    let daily = weather.daily.and_then(build_daily);
    let air_quality = build_air_quality(
        air_quality,
        current_weather.as_ref().map(|c| c.time.as_str()),
    );

    ForecastResponse {
        place: place.into_place(timezone.clone()),
        timezone,
        current_weather,
        hourly,
        daily,
        air_quality,
    }
}
