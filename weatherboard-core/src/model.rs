use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable key of a pinned location.
///
/// Derived from coordinates only, so two searches resolving to the same point
/// collapse to one entry no matter how the place was spelled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(String);

impl LocationId {
    pub fn from_coordinates(lat: f64, lon: f64) -> Self {
        Self(format!("{lat}-{lon}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LocationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for LocationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A temperature as reported by the provider in both scales.
///
/// The Fahrenheit value is never derived locally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub c: f64,
    pub f: f64,
}

impl Temperature {
    pub fn new(c: f64, f: f64) -> Self {
        Self { c, f }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub text: String,
    pub icon: String,
    pub code: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub kph: f64,
    pub mph: f64,
    pub degree: u16,
    pub direction: String,
    pub gust_kph: f64,
}

/// Snapshot of conditions at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: Temperature,
    pub feels_like: Temperature,
    pub condition: Condition,
    pub is_day: bool,
    pub humidity_pct: u8,
    pub wind: Wind,
    pub pressure_mb: f64,
    pub pressure_in: f64,
    pub precip_mm: f64,
    pub visibility_km: f64,
    pub uv: f64,
    pub cloud_pct: u8,
    /// Provider-local timestamp string, e.g. `2024-01-15 12:45`.
    pub last_updated: String,
    pub last_updated_epoch: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourReading {
    /// Location-local time, e.g. `2024-01-15 13:00`.
    pub time: String,
    pub time_epoch: i64,
    pub temperature: Temperature,
    pub feels_like: Temperature,
    pub condition: Condition,
    pub is_day: bool,
    pub humidity_pct: u8,
    pub wind: Wind,
    pub pressure_mb: f64,
    pub precip_mm: f64,
    pub visibility_km: f64,
    pub uv: f64,
    pub cloud_pct: u8,
    pub chance_of_rain: u8,
    pub chance_of_snow: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    pub max: Temperature,
    pub min: Temperature,
    pub avg: Temperature,
    pub condition: Condition,
    pub chance_of_rain: u8,
    pub chance_of_snow: u8,
    pub avg_humidity_pct: u8,
    pub max_wind_kph: f64,
    pub total_precip_mm: f64,
    pub uv: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    /// Location-local date, `YYYY-MM-DD`.
    pub date: String,
    pub date_epoch: i64,
    pub day: DaySummary,
    pub hours: Vec<HourReading>,
}

/// Chronological day entries; index 0 is "today" in the location's timezone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub days: Vec<ForecastDay>,
}

impl Forecast {
    pub fn today(&self) -> Option<&ForecastDay> {
        self.days.first()
    }

    pub fn hours(&self) -> impl Iterator<Item = &HourReading> {
        self.days.iter().flat_map(|d| d.hours.iter())
    }
}

/// Location block as returned alongside every reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub name: String,
    pub region: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub tz_id: String,
    pub localtime: String,
    pub localtime_epoch: i64,
}

impl LocationInfo {
    pub fn id(&self) -> LocationId {
        LocationId::from_coordinates(self.lat, self.lon)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentReport {
    pub location: LocationInfo,
    pub current: CurrentConditions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastReport {
    pub location: LocationInfo,
    pub current: CurrentConditions,
    pub forecast: Forecast,
}

/// One autocomplete hit from the provider's location search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub id: u64,
    pub name: String,
    pub region: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub url: String,
}

impl SearchCandidate {
    pub fn label(&self) -> String {
        join_place(&self.name, &self.region, &self.country)
    }
}

/// A location the user keeps on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinnedLocation {
    pub id: LocationId,
    pub name: String,
    pub region: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    pub timezone: String,
    pub localtime: String,
    pub localtime_epoch: i64,
    pub current: Option<CurrentConditions>,
    pub forecast: Option<Forecast>,
    pub last_updated: DateTime<Utc>,
}

impl PinnedLocation {
    pub fn from_report(report: CurrentReport, now: DateTime<Utc>) -> Self {
        let CurrentReport { location, current } = report;

        Self {
            id: location.id(),
            name: location.name,
            region: location.region,
            country: location.country,
            lat: location.lat,
            lon: location.lon,
            timezone: location.tz_id,
            localtime: location.localtime,
            localtime_epoch: location.localtime_epoch,
            current: Some(current),
            forecast: None,
            last_updated: now,
        }
    }

    /// Query used to re-fetch this location: `"name, country"`.
    pub fn query(&self) -> String {
        format!("{}, {}", self.name, self.country)
    }

    /// `"Name, Region, Country"`, skipping a region equal to the name.
    pub fn label(&self) -> String {
        join_place(&self.name, &self.region, &self.country)
    }
}

fn join_place(name: &str, region: &str, country: &str) -> String {
    if region.is_empty() || region == name {
        format!("{name}, {country}")
    } else {
        format!("{name}, {region}, {country}")
    }
}
