//! Core library for the forecast proxy.
//!
//! This crate defines:
//! - Configuration (upstream URLs, retry budgets, default place)
//! - A resilient fetcher with timeouts and exponential backoff
//! - Abstraction over the upstream providers
//! - Place resolution, weather and air-quality fetching
//! - Normalization into a stable, client-ready payload
//!
//! It is used by `forecast-proxy`, but can also be reused by other binaries or services.

pub mod config;
pub mod fetch;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod resolve;
pub mod service;
pub mod weather;

pub use config::{Config, RetryConfig, UpstreamConfig};
pub use fetch::{FetchError, Fetcher, RetryPolicy};
pub use model::{
    AirQuality, AirQualityCurrent, CurrentWeather, DailySeries, ForecastResponse, HourlySeries,
    LocationQuery, Place, ResolvedPlace,
};
pub use provider::{ForecastProvider, OpenMeteoProvider};
pub use service::{ForecastError, ForecastService};
