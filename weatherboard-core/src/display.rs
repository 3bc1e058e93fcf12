//! Formatting helpers shared by anything that renders the dashboard.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};

use crate::{
    model::{Forecast, HourReading, Temperature},
    settings::TemperatureUnit,
};

/// Provider timestamp layout for local times, e.g. `2024-01-15 13:00`.
const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

impl TemperatureUnit {
    /// Provider-supplied value in this unit. Never converts.
    pub fn pick(&self, t: Temperature) -> f64 {
        match self {
            TemperatureUnit::Celsius => t.c,
            TemperatureUnit::Fahrenheit => t.f,
        }
    }
}

/// Round to the nearest integer with ties going up, so `-5.5` becomes `-5`.
pub fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

/// `"26°"`
pub fn temperature_display(t: Temperature, unit: TemperatureUnit) -> String {
    format!("{}°", round_half_up(unit.pick(t)))
}

/// `"26°C"`
pub fn temperature_with_unit(t: Temperature, unit: TemperatureUnit) -> String {
    format!("{}°{}", round_half_up(unit.pick(t)), unit.symbol())
}

pub fn convert_celsius(c: f64, unit: TemperatureUnit) -> f64 {
    match unit {
        TemperatureUnit::Celsius => c,
        TemperatureUnit::Fahrenheit => c * 9.0 / 5.0 + 32.0,
    }
}

/// Coarse age of an update: `Just now`, `5m ago`, `3h ago`, `2d ago`.
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = now.signed_duration_since(then).num_minutes();

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if minutes < 24 * 60 {
        format!("{}h ago", minutes / 60)
    } else {
        format!("{}d ago", minutes / (24 * 60))
    }
}

fn parse_local(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, LOCAL_TIME_FORMAT).ok()
}

/// Up to `count` hourly readings starting at the location's current hour.
///
/// Starts from the first reading when `localtime` is empty or unparseable.
pub fn upcoming_hours<'a>(
    forecast: &'a Forecast,
    localtime: &str,
    count: usize,
) -> Vec<&'a HourReading> {
    let start = parse_local(localtime)
        .and_then(|now| now.with_minute(0))
        .and_then(|hour| {
            forecast.hours().position(|h| parse_local(&h.time).is_some_and(|t| t >= hour))
        })
        .unwrap_or(0);

    forecast.hours().skip(start).take(count).collect()
}
