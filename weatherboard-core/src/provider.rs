use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;

use crate::{
    Config,
    error::WeatherError,
    model::{CurrentReport, ForecastReport, SearchCandidate},
    provider::weatherapi::WeatherApiProvider,
};

pub mod weatherapi;

pub const MIN_FORECAST_DAYS: u8 = 1;
pub const MAX_FORECAST_DAYS: u8 = 14;

/// Remote source of weather data. The core treats it as opaque.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Current conditions for a free-text query (`"London"`, `"6.93,79.85"`, ...).
    async fn current(&self, query: &str) -> Result<CurrentReport, WeatherError>;

    /// Current conditions plus `days` days of forecast.
    async fn forecast(&self, query: &str, days: u8) -> Result<ForecastReport, WeatherError>;

    /// Candidate locations for autocomplete; may be empty.
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, WeatherError>;
}

/// Reject empty or blank queries before any network call.
pub fn validate_query<'a>(query: &'a str, what: &str) -> Result<&'a str, WeatherError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(WeatherError::input(format!("{what} is required")));
    }
    Ok(trimmed)
}

pub fn validate_forecast_days(days: u8) -> Result<u8, WeatherError> {
    if !(MIN_FORECAST_DAYS..=MAX_FORECAST_DAYS).contains(&days) {
        return Err(WeatherError::input(format!(
            "Days must be between {MIN_FORECAST_DAYS} and {MAX_FORECAST_DAYS}"
        )));
    }
    Ok(days)
}

/// Construct the weatherapi.com provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let api_key = config.resolved_api_key()?;
    let provider = WeatherApiProvider::builder(api_key)
        .base_url(&config.base_url)
        .timeout(config.timeout())
        .build()?;

    Ok(Arc::new(provider))
}

/// Stands in for the network when no API key is configured. Commands that only
/// touch the saved state never call it; anything that does gets an input error.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineProvider;

impl OfflineProvider {
    fn unavailable() -> WeatherError {
        WeatherError::input("No weatherapi.com API key configured. Run `weatherboard configure`.")
    }
}

#[async_trait]
impl WeatherProvider for OfflineProvider {
    async fn current(&self, _query: &str) -> Result<CurrentReport, WeatherError> {
        Err(Self::unavailable())
    }

    async fn forecast(&self, _query: &str, _days: u8) -> Result<ForecastReport, WeatherError> {
        Err(Self::unavailable())
    }

    async fn search(&self, _query: &str) -> Result<Vec<SearchCandidate>, WeatherError> {
        Err(Self::unavailable())
    }
}
