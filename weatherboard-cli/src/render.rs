//! Plain-text formatting of dashboard state.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use weatherboard_core::{
    BatchReport, Forecast, Notification, NotificationKind, PinnedLocation, SearchCandidate,
    Settings, TemperatureUnit,
    display::{relative_time, temperature_display, temperature_with_unit, upcoming_hours},
};

const HOURS_SHOWN: usize = 24;

/// One row of `weatherboard list`.
pub fn location_line(
    location: &PinnedLocation,
    unit: TemperatureUnit,
    now: DateTime<Utc>,
) -> String {
    let reading = match &location.current {
        Some(current) => format!(
            "{:>5}  {}",
            temperature_with_unit(current.temperature, unit),
            current.condition.text
        ),
        None => "no data yet".to_string(),
    };

    format!(
        "{:<22} {:<36} {}  (updated {})",
        location.id.as_str(),
        location.label(),
        reading,
        relative_time(location.last_updated, now)
    )
}

pub fn current_details(location: &PinnedLocation, unit: TemperatureUnit) -> String {
    let mut out = format!("{}  (local time {})", location.label(), location.localtime);

    let Some(current) = &location.current else {
        out.push_str("\n  No current conditions yet");
        return out;
    };

    let wind = match unit {
        TemperatureUnit::Celsius => format!("{:.0} km/h", current.wind.kph),
        TemperatureUnit::Fahrenheit => format!("{:.0} mph", current.wind.mph),
    };

    // Writing to a String cannot fail.
    let _ = write!(
        out,
        "\n  {}, {}\n  Feels like {}  Humidity {}%  Wind {} {}  UV {:.0}",
        temperature_with_unit(current.temperature, unit),
        current.condition.text,
        temperature_display(current.feels_like, unit),
        current.humidity_pct,
        wind,
        current.wind.direction,
        current.uv,
    );
    out
}

/// Next hours from the location's current local time.
pub fn hourly(forecast: &Forecast, localtime: &str, unit: TemperatureUnit) -> String {
    upcoming_hours(forecast, localtime, HOURS_SHOWN)
        .into_iter()
        .map(|h| {
            let time = h.time.split_once(' ').map_or(h.time.as_str(), |(_, t)| t);
            format!(
                "  {time}  {:>4}  rain {:>3}%  {}",
                temperature_display(h.temperature, unit),
                h.chance_of_rain,
                h.condition.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn daily(forecast: &Forecast, unit: TemperatureUnit) -> String {
    forecast
        .days
        .iter()
        .map(|d| {
            format!(
                "  {}  {:>4} / {:<4}  rain {:>3}%  {}",
                d.date,
                temperature_display(d.day.max, unit),
                temperature_display(d.day.min, unit),
                d.day.chance_of_rain,
                d.day.condition.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn candidate_line(candidate: &SearchCandidate) -> String {
    format!("{}  ({:.2}, {:.2})", candidate.label(), candidate.lat, candidate.lon)
}

pub fn batch_summary(batch: &BatchReport) -> String {
    let mut out =
        format!("Refreshed {} of {} location(s)", batch.succeeded.len(), batch.attempted());
    for (id, err) in &batch.failed {
        let _ = write!(out, "\n  {id}: {err}");
    }
    out
}

pub fn settings(settings: &Settings) -> String {
    format!(
        "refresh interval: {}\ntemperature unit: {}\nforecast view:    {}",
        settings.refresh_interval, settings.temperature_unit, settings.forecast_view
    )
}

pub fn notification(notification: &Notification) -> String {
    let tag = match notification.kind {
        NotificationKind::Success => "ok",
        NotificationKind::Failure => "error",
        NotificationKind::NotFound => "not found",
    };
    match &notification.location {
        Some(id) => format!("[{tag}] {id}: {}", notification.message),
        None => format!("[{tag}] {}", notification.message),
    }
}
