use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use crate::{
    fetch::RetryPolicy,
    model::{ResolvedPlace, valid_coordinates},
    normalize::is_valid_timezone,
};

/// Base URLs of the upstream providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub geocoding_url: String,
    pub reverse_geocoding_url: String,
    pub forecast_url: String,
    pub air_quality_url: String,
    /// Sent with every outbound request; Nominatim rejects anonymous clients.
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            geocoding_url: "https://geocoding-api.open-meteo.com/v1/search".into(),
            reverse_geocoding_url: "https://nominatim.openstreetmap.org/reverse".into(),
            forecast_url: "https://api.open-meteo.com/v1/forecast".into(),
            air_quality_url: "https://air-quality-api.open-meteo.com/v1/air-quality".into(),
            user_agent: concat!("forecast-proxy/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl UpstreamConfig {
    /// Point every upstream at one host, keeping the usual paths. Handy for
    /// local mocks.
    pub fn single_host(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            geocoding_url: format!("{base}/v1/search"),
            reverse_geocoding_url: format!("{base}/reverse"),
            forecast_url: format!("{base}/v1/forecast"),
            air_quality_url: format!("{base}/v1/air-quality"),
            ..Self::default()
        }
    }
}

/// Retry budgets per upstream. Air quality is best-effort and gets fewer
/// retries than the weather call; reverse geocoding only yields a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub geocoding: RetryPolicy,
    pub reverse_geocoding: RetryPolicy,
    pub weather: RetryPolicy,
    pub air_quality: RetryPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            geocoding: RetryPolicy::new(6_000, 2, 300),
            reverse_geocoding: RetryPolicy::new(4_000, 0, 0),
            weather: RetryPolicy::new(8_000, 2, 400),
            air_quality: RetryPolicy::new(6_000, 1, 300),
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Any table may be omitted or partial; missing retry knobs fall back to
/// [`RetryPolicy::default`]. A `[default_place]` table replaces the built-in
/// place wholesale, so it must carry `name`, `latitude` and `longitude`.
///
/// Example TOML:
/// ```toml
/// bind = "0.0.0.0:8787"
///
/// [retry.weather]
/// timeout_ms = 5000
/// max_retries = 3
/// backoff_base_ms = 250
///
/// [default_place]
/// name = "Berlin"
/// latitude = 52.52
/// longitude = 13.41
/// timezone = "Europe/Berlin"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind: SocketAddr,
    pub upstream: UpstreamConfig,
    pub retry: RetryConfig,
    /// Where unresolvable queries are anchored.
    pub default_place: ResolvedPlace,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8787)),
            upstream: UpstreamConfig::default(),
            retry: RetryConfig::default(),
            default_place: default_place(),
        }
    }
}

fn default_place() -> ResolvedPlace {
    ResolvedPlace {
        name: "Stockholm".into(),
        country: Some("Sweden".into()),
        admin1: Some("Stockholm".into()),
        latitude: 59.3293,
        longitude: 18.0686,
        timezone: Some("Europe/Stockholm".into()),
    }
}

impl Config {
    /// Load config from the platform location, or return the defaults if it
    /// doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    /// Load config from an explicit path; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        cfg.validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "forecast-proxy", "forecast-proxy")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        let place = &self.default_place;

        if place.name.trim().is_empty() {
            bail!("default_place.name must not be empty");
        }

        if !valid_coordinates(place.latitude, place.longitude) {
            bail!(
                "default_place coordinates out of range: {}, {}",
                place.latitude,
                place.longitude
            );
        }

        if let Some(tz) = place.timezone.as_deref().filter(|tz| !is_valid_timezone(tz)) {
            bail!("default_place.timezone '{tz}' is not a known IANA zone");
        }

        for (name, policy) in [
            ("geocoding", &self.retry.geocoding),
            ("reverse_geocoding", &self.retry.reverse_geocoding),
            ("weather", &self.retry.weather),
            ("air_quality", &self.retry.air_quality),
        ] {
            if policy.timeout_ms == 0 {
                bail!("retry.{name}.timeout_ms must be greater than zero");
            }
        }

        Ok(())
    }
}
