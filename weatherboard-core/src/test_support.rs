//! Fixtures and a scripted provider shared by the unit tests.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use crate::{
    error::WeatherError,
    model::{
        Condition, CurrentConditions, CurrentReport, DaySummary, Forecast, ForecastDay,
        ForecastReport, HourReading, LocationInfo, PinnedLocation, SearchCandidate, Temperature,
        Wind,
    },
    provider::WeatherProvider,
};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).single().expect("valid fixture time")
}

pub fn conditions(temp_c: f64) -> CurrentConditions {
    CurrentConditions {
        temperature: Temperature::new(temp_c, temp_c * 9.0 / 5.0 + 32.0),
        feels_like: Temperature::new(temp_c + 1.0, (temp_c + 1.0) * 9.0 / 5.0 + 32.0),
        condition: Condition { text: "Partly cloudy".into(), icon: "116.png".into(), code: 1003 },
        is_day: true,
        humidity_pct: 74,
        wind: Wind {
            kph: 13.0,
            mph: 8.1,
            degree: 250,
            direction: "WSW".into(),
            gust_kph: 18.4,
        },
        pressure_mb: 1011.0,
        pressure_in: 29.85,
        precip_mm: 0.0,
        visibility_km: 10.0,
        uv: 7.0,
        cloud_pct: 50,
        last_updated: "2024-01-01 17:15".into(),
        last_updated_epoch: 1_704_109_500,
    }
}

pub fn hour(time: &str, epoch: i64, temp_c: f64) -> HourReading {
    let c = conditions(temp_c);
    HourReading {
        time: time.into(),
        time_epoch: epoch,
        temperature: c.temperature,
        feels_like: c.feels_like,
        condition: c.condition,
        is_day: c.is_day,
        humidity_pct: c.humidity_pct,
        wind: c.wind,
        pressure_mb: c.pressure_mb,
        precip_mm: c.precip_mm,
        visibility_km: c.visibility_km,
        uv: c.uv,
        cloud_pct: c.cloud_pct,
        chance_of_rain: 20,
        chance_of_snow: 0,
    }
}

/// Two days of 24 hourly readings starting at 2024-01-01 00:00 local time.
pub fn forecast() -> Forecast {
    let base_epoch = 1_704_067_200;
    let days = (0..2)
        .map(|d| {
            let date = format!("2024-01-0{}", d + 1);
            let hours = (0..24)
                .map(|h| {
                    let epoch = base_epoch + (d * 24 + h) * 3600;
                    hour(&format!("{date} {h:02}:00"), epoch, 24.0 + h as f64 / 4.0)
                })
                .collect();
            let cond = conditions(28.0);
            ForecastDay {
                date,
                date_epoch: base_epoch + d * 86_400,
                day: DaySummary {
                    max: Temperature::new(31.0, 87.8),
                    min: Temperature::new(24.0, 75.2),
                    avg: Temperature::new(27.5, 81.5),
                    condition: cond.condition,
                    chance_of_rain: 80,
                    chance_of_snow: 0,
                    avg_humidity_pct: 78,
                    max_wind_kph: 21.6,
                    total_precip_mm: 4.2,
                    uv: 8.0,
                },
                hours,
            }
        })
        .collect();

    Forecast { days }
}

pub fn location_info(name: &str, lat: f64, lon: f64) -> LocationInfo {
    LocationInfo {
        name: name.into(),
        region: "Western".into(),
        country: "Sri Lanka".into(),
        lat,
        lon,
        tz_id: "Asia/Colombo".into(),
        localtime: "2024-01-01 17:30".into(),
        localtime_epoch: 1_704_110_400,
    }
}

pub fn report(name: &str, lat: f64, lon: f64, temp_c: f64) -> CurrentReport {
    CurrentReport { location: location_info(name, lat, lon), current: conditions(temp_c) }
}

pub fn pinned(name: &str, lat: f64, lon: f64) -> PinnedLocation {
    let mut location = PinnedLocation::from_report(report(name, lat, lon, 20.0), t0());
    location.current = None;
    location
}

#[derive(Debug, Clone)]
enum Scripted {
    Ok(CurrentReport),
    Err(WeatherError),
}

/// Provider answering from a table keyed by query, recording every call.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    current: Mutex<HashMap<String, Scripted>>,
    delays: Mutex<HashMap<String, Duration>>,
    forecast: Mutex<Option<Forecast>>,
    candidates: Mutex<Vec<SearchCandidate>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn ok(&self, query: &str, report: CurrentReport) {
        self.current.lock().insert(query.to_string(), Scripted::Ok(report));
    }

    pub fn fail(&self, query: &str, err: WeatherError) {
        self.current.lock().insert(query.to_string(), Scripted::Err(err));
    }

    pub fn delay(&self, query: &str, by: Duration) {
        self.delays.lock().insert(query.to_string(), by);
    }

    pub fn set_forecast(&self, forecast: Forecast) {
        *self.forecast.lock() = Some(forecast);
    }

    pub fn set_candidates(&self, candidates: Vec<SearchCandidate>) {
        *self.candidates.lock() = candidates;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn answer(&self, query: &str) -> Result<CurrentReport, WeatherError> {
        self.calls.lock().push(query.to_string());
        match self.current.lock().get(query) {
            Some(Scripted::Ok(report)) => Ok(report.clone()),
            Some(Scripted::Err(err)) => Err(err.clone()),
            None => Err(WeatherError::NotFound { query: query.to_string() }),
        }
    }
}

#[async_trait]
impl WeatherProvider for ScriptedProvider {
    async fn current(&self, query: &str) -> Result<CurrentReport, WeatherError> {
        let delay = self.delays.lock().get(query).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.answer(query)
    }

    async fn forecast(&self, query: &str, _days: u8) -> Result<ForecastReport, WeatherError> {
        let CurrentReport { location, current } = self.answer(query)?;
        let forecast = self.forecast.lock().clone().unwrap_or_default();
        Ok(ForecastReport { location, current, forecast })
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>, WeatherError> {
        self.calls.lock().push(query.to_string());
        Ok(self.candidates.lock().clone())
    }
}
