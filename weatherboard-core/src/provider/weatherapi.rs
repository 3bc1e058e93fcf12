use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, instrument};

use crate::{
    config::DEFAULT_BASE_URL,
    error::WeatherError,
    model::{
        Condition, CurrentConditions, CurrentReport, DaySummary, Forecast, ForecastDay,
        ForecastReport, HourReading, LocationInfo, SearchCandidate, Temperature, Wind,
    },
    provider::{validate_forecast_days, validate_query},
};

use super::WeatherProvider;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the weatherapi.com REST API.
#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

#[derive(Debug, Clone)]
pub struct WeatherApiProviderBuilder {
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl WeatherApiProviderBuilder {
    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<WeatherApiProvider, WeatherError> {
        let http = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| WeatherError::Network(e.to_string()))?;

        Ok(WeatherApiProvider { api_key: self.api_key, base_url: self.base_url, http })
    }
}

impl WeatherApiProvider {
    pub fn builder(api_key: String) -> WeatherApiProviderBuilder {
        WeatherApiProviderBuilder {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &str,
        extra: &[(&str, String)],
    ) -> Result<T, WeatherError> {
        let url = format!("{}/{endpoint}", self.base_url);

        let mut params: Vec<(&str, &str)> =
            vec![("key", self.api_key.as_str()), ("q", query)];
        params.extend(extra.iter().map(|(k, v)| (*k, v.as_str())));

        let res = self.http.get(&url).query(&params).send().await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            debug!(%status, body = %truncate_body(&body), "weatherapi request failed");
            return Err(status_error(status, query));
        }

        serde_json::from_str(&body).map_err(|e| WeatherError::Malformed(e.to_string()))
    }
}

/// Map a non-success status to the error taxonomy.
///
/// weatherapi.com answers 400 (code 1006) when no location matches the query.
fn status_error(status: StatusCode, query: &str) -> WeatherError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
            WeatherError::NotFound { query: query.to_string() }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            WeatherError::Unauthorized { status: status.as_u16() }
        }
        StatusCode::TOO_MANY_REQUESTS => WeatherError::RateLimited,
        _ => WeatherError::Server { status: status.as_u16() },
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    #[instrument(skip(self))]
    async fn current(&self, query: &str) -> Result<CurrentReport, WeatherError> {
        let query = validate_query(query, "City name")?;

        let parsed: WaCurrentResponse =
            self.get_json("current.json", query, &[("aqi", "no".to_string())]).await?;

        Ok(CurrentReport { location: parsed.location.into(), current: parsed.current.into() })
    }

    #[instrument(skip(self))]
    async fn forecast(&self, query: &str, days: u8) -> Result<ForecastReport, WeatherError> {
        let query = validate_query(query, "City name")?;
        let days = validate_forecast_days(days)?;

        let parsed: WaForecastResponse = self
            .get_json(
                "forecast.json",
                query,
                &[("days", days.to_string()), ("aqi", "no".into()), ("alerts", "no".into())],
            )
            .await?;

        Ok(ForecastReport {
            location: parsed.location.into(),
            current: parsed.current.into(),
            forecast: Forecast {
                days: parsed.forecast.forecastday.into_iter().map(Into::into).collect(),
            },
        })
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, WeatherError> {
        let query = validate_query(query, "Search query")?;

        let parsed: Vec<WaSearchHit> = self.get_json("search.json", query, &[]).await?;

        Ok(parsed.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
    #[serde(default)]
    region: String,
    country: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    tz_id: String,
    #[serde(default)]
    localtime: String,
    #[serde(default)]
    localtime_epoch: i64,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
    #[serde(default)]
    icon: String,
    #[serde(default)]
    code: u32,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    #[serde(default)]
    last_updated: String,
    #[serde(default)]
    last_updated_epoch: i64,
    temp_c: f64,
    temp_f: f64,
    feelslike_c: f64,
    feelslike_f: f64,
    #[serde(default)]
    is_day: u8,
    condition: WaCondition,
    #[serde(default)]
    wind_kph: f64,
    #[serde(default)]
    wind_mph: f64,
    #[serde(default)]
    wind_degree: u16,
    #[serde(default)]
    wind_dir: String,
    #[serde(default)]
    gust_kph: f64,
    #[serde(default)]
    pressure_mb: f64,
    #[serde(default)]
    pressure_in: f64,
    #[serde(default)]
    precip_mm: f64,
    #[serde(default)]
    humidity: f64,
    #[serde(default)]
    cloud: f64,
    #[serde(default)]
    vis_km: f64,
    #[serde(default)]
    uv: f64,
}

#[derive(Debug, Deserialize)]
struct WaCurrentResponse {
    location: WaLocation,
    current: WaCurrent,
}

#[derive(Debug, Deserialize)]
struct WaDay {
    maxtemp_c: f64,
    maxtemp_f: f64,
    mintemp_c: f64,
    mintemp_f: f64,
    avgtemp_c: f64,
    avgtemp_f: f64,
    condition: WaCondition,
    #[serde(default)]
    daily_chance_of_rain: f64,
    #[serde(default)]
    daily_chance_of_snow: f64,
    #[serde(default)]
    avghumidity: f64,
    #[serde(default)]
    maxwind_kph: f64,
    #[serde(default)]
    totalprecip_mm: f64,
    #[serde(default)]
    uv: f64,
}

#[derive(Debug, Deserialize)]
struct WaHour {
    time: String,
    time_epoch: i64,
    temp_c: f64,
    temp_f: f64,
    feelslike_c: f64,
    feelslike_f: f64,
    #[serde(default)]
    is_day: u8,
    condition: WaCondition,
    #[serde(default)]
    wind_kph: f64,
    #[serde(default)]
    wind_mph: f64,
    #[serde(default)]
    wind_degree: u16,
    #[serde(default)]
    wind_dir: String,
    #[serde(default)]
    gust_kph: f64,
    #[serde(default)]
    pressure_mb: f64,
    #[serde(default)]
    precip_mm: f64,
    #[serde(default)]
    humidity: f64,
    #[serde(default)]
    cloud: f64,
    #[serde(default)]
    vis_km: f64,
    #[serde(default)]
    uv: f64,
    #[serde(default)]
    chance_of_rain: f64,
    #[serde(default)]
    chance_of_snow: f64,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    date: String,
    date_epoch: i64,
    day: WaDay,
    #[serde(default)]
    hour: Vec<WaHour>,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WaForecastResponse {
    location: WaLocation,
    current: WaCurrent,
    forecast: WaForecast,
}

#[derive(Debug, Deserialize)]
struct WaSearchHit {
    id: u64,
    name: String,
    #[serde(default)]
    region: String,
    country: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    url: String,
}

impl From<WaLocation> for LocationInfo {
    fn from(l: WaLocation) -> Self {
        LocationInfo {
            name: l.name,
            region: l.region,
            country: l.country,
            lat: l.lat,
            lon: l.lon,
            tz_id: l.tz_id,
            localtime: l.localtime,
            localtime_epoch: l.localtime_epoch,
        }
    }
}

impl From<WaCondition> for Condition {
    fn from(c: WaCondition) -> Self {
        Condition { text: c.text, icon: c.icon, code: c.code }
    }
}

impl From<WaCurrent> for CurrentConditions {
    fn from(c: WaCurrent) -> Self {
        CurrentConditions {
            temperature: Temperature::new(c.temp_c, c.temp_f),
            feels_like: Temperature::new(c.feelslike_c, c.feelslike_f),
            condition: c.condition.into(),
            is_day: c.is_day != 0,
            humidity_pct: percent(c.humidity),
            wind: Wind {
                kph: c.wind_kph,
                mph: c.wind_mph,
                degree: c.wind_degree,
                direction: c.wind_dir,
                gust_kph: c.gust_kph,
            },
            pressure_mb: c.pressure_mb,
            pressure_in: c.pressure_in,
            precip_mm: c.precip_mm,
            visibility_km: c.vis_km,
            uv: c.uv,
            cloud_pct: percent(c.cloud),
            last_updated: c.last_updated,
            last_updated_epoch: c.last_updated_epoch,
        }
    }
}

impl From<WaHour> for HourReading {
    fn from(h: WaHour) -> Self {
        HourReading {
            time: h.time,
            time_epoch: h.time_epoch,
            temperature: Temperature::new(h.temp_c, h.temp_f),
            feels_like: Temperature::new(h.feelslike_c, h.feelslike_f),
            condition: h.condition.into(),
            is_day: h.is_day != 0,
            humidity_pct: percent(h.humidity),
            wind: Wind {
                kph: h.wind_kph,
                mph: h.wind_mph,
                degree: h.wind_degree,
                direction: h.wind_dir,
                gust_kph: h.gust_kph,
            },
            pressure_mb: h.pressure_mb,
            precip_mm: h.precip_mm,
            visibility_km: h.vis_km,
            uv: h.uv,
            cloud_pct: percent(h.cloud),
            chance_of_rain: percent(h.chance_of_rain),
            chance_of_snow: percent(h.chance_of_snow),
        }
    }
}

impl From<WaForecastDay> for ForecastDay {
    fn from(d: WaForecastDay) -> Self {
        let day = d.day;
        ForecastDay {
            date: d.date,
            date_epoch: d.date_epoch,
            day: DaySummary {
                max: Temperature::new(day.maxtemp_c, day.maxtemp_f),
                min: Temperature::new(day.mintemp_c, day.mintemp_f),
                avg: Temperature::new(day.avgtemp_c, day.avgtemp_f),
                condition: day.condition.into(),
                chance_of_rain: percent(day.daily_chance_of_rain),
                chance_of_snow: percent(day.daily_chance_of_snow),
                avg_humidity_pct: percent(day.avghumidity),
                max_wind_kph: day.maxwind_kph,
                total_precip_mm: day.totalprecip_mm,
                uv: day.uv,
            },
            hours: d.hour.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<WaSearchHit> for SearchCandidate {
    fn from(s: WaSearchHit) -> Self {
        SearchCandidate {
            id: s.id,
            name: s.name,
            region: s.region,
            country: s.country,
            lat: s.lat,
            lon: s.lon,
            url: s.url,
        }
    }
}

/// Percentages arrive as integers or floats depending on the field.
fn percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
