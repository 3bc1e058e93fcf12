use std::{fmt, str::FromStr, time::Duration};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// How often pinned locations are refreshed in the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum RefreshInterval {
    #[serde(rename = "30min")]
    ThirtyMinutes,
    #[default]
    #[serde(rename = "1hour")]
    OneHour,
    #[serde(rename = "1day")]
    OneDay,
}

impl RefreshInterval {
    pub const fn all() -> &'static [RefreshInterval] {
        &[RefreshInterval::ThirtyMinutes, RefreshInterval::OneHour, RefreshInterval::OneDay]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshInterval::ThirtyMinutes => "30min",
            RefreshInterval::OneHour => "1hour",
            RefreshInterval::OneDay => "1day",
        }
    }

    pub const fn as_millis(&self) -> u64 {
        match self {
            RefreshInterval::ThirtyMinutes => 30 * 60 * 1000,
            RefreshInterval::OneHour => 60 * 60 * 1000,
            RefreshInterval::OneDay => 24 * 60 * 60 * 1000,
        }
    }

    pub const fn period(&self) -> Duration {
        Duration::from_millis(self.as_millis())
    }

    /// Lenient parse: anything unrecognised maps to the default.
    pub fn from_str_lossy(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

/// Unit temperatures are displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "celsius")]
    Celsius,
    #[serde(rename = "fahrenheit")]
    Fahrenheit,
}

impl TemperatureUnit {
    pub const fn all() -> &'static [TemperatureUnit] {
        &[TemperatureUnit::Celsius, TemperatureUnit::Fahrenheit]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "celsius",
            TemperatureUnit::Fahrenheit => "fahrenheit",
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            TemperatureUnit::Celsius => 'C',
            TemperatureUnit::Fahrenheit => 'F',
        }
    }

    pub fn from_str_lossy(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

/// Granularity of the forecast view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum ForecastView {
    #[default]
    #[serde(rename = "hourly")]
    Hourly,
    #[serde(rename = "daily")]
    Daily,
}

impl ForecastView {
    pub const fn all() -> &'static [ForecastView] {
        &[ForecastView::Hourly, ForecastView::Daily]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastView::Hourly => "hourly",
            ForecastView::Daily => "daily",
        }
    }

    pub fn from_str_lossy(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

/// Error for strict parsing of a setting value typed by the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {setting} '{value}'. Supported values: {supported}.")]
pub struct ParseSettingError {
    setting: &'static str,
    value: String,
    supported: String,
}

macro_rules! setting_str_impls {
    ($ty:ty, $name:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseSettingError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let lower = value.trim().to_lowercase();
                <$ty>::all().iter().copied().find(|v| v.as_str() == lower).ok_or_else(|| {
                    ParseSettingError {
                        setting: $name,
                        value: value.to_string(),
                        supported: <$ty>::all()
                            .iter()
                            .map(|v| v.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    }
                })
            }
        }

        impl From<String> for $ty {
            fn from(value: String) -> Self {
                <$ty>::from_str_lossy(&value)
            }
        }
    };
}

setting_str_impls!(RefreshInterval, "refresh interval");
setting_str_impls!(TemperatureUnit, "temperature unit");
setting_str_impls!(ForecastView, "forecast view");

/// User preferences. Exactly one value per setting at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub refresh_interval: RefreshInterval,
    pub temperature_unit: TemperatureUnit,
    pub forecast_view: ForecastView,
}

/// Partial update; `None` fields are left as they are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub refresh_interval: Option<RefreshInterval>,
    pub temperature_unit: Option<TemperatureUnit>,
    pub forecast_view: Option<ForecastView>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.refresh_interval.is_none()
            && self.temperature_unit.is_none()
            && self.forecast_view.is_none()
    }
}

#[derive(Debug, Default)]
pub struct SettingsStore {
    inner: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self { inner: RwLock::new(settings) }
    }

    pub fn get(&self) -> Settings {
        *self.inner.read()
    }

    pub fn refresh_interval(&self) -> RefreshInterval {
        self.inner.read().refresh_interval
    }

    pub fn set_refresh_interval(&self, interval: RefreshInterval) {
        self.inner.write().refresh_interval = interval;
    }

    pub fn set_temperature_unit(&self, unit: TemperatureUnit) {
        self.inner.write().temperature_unit = unit;
    }

    pub fn set_forecast_view(&self, view: ForecastView) {
        self.inner.write().forecast_view = view;
    }

    pub fn update(&self, patch: SettingsPatch) -> Settings {
        let mut settings = self.inner.write();
        if let Some(interval) = patch.refresh_interval {
            settings.refresh_interval = interval;
        }
        if let Some(unit) = patch.temperature_unit {
            settings.temperature_unit = unit;
        }
        if let Some(view) = patch.forecast_view {
            settings.forecast_view = view;
        }
        *settings
    }

    pub fn replace(&self, settings: Settings) {
        *self.inner.write() = settings;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_millis() {
        assert_eq!(RefreshInterval::ThirtyMinutes.as_millis(), 1_800_000);
        assert_eq!(RefreshInterval::OneHour.as_millis(), 3_600_000);
        assert_eq!(RefreshInterval::OneDay.as_millis(), 86_400_000);
        assert_eq!(RefreshInterval::OneDay.period(), Duration::from_secs(86_400));
    }

    #[test]
    fn unknown_values_fall_back_to_defaults() {
        let s: Settings = serde_json::from_str(
            r#"{"refresh_interval":"5min","temperature_unit":"kelvin","forecast_view":"weekly"}"#,
        )
        .expect("legacy settings must deserialize");

        assert_eq!(s, Settings::default());
        assert_eq!(s.refresh_interval.period(), RefreshInterval::OneHour.period());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let s: Settings = serde_json::from_str(r#"{"temperature_unit":"fahrenheit"}"#)
            .expect("partial settings must deserialize");

        assert_eq!(s.temperature_unit, TemperatureUnit::Fahrenheit);
        assert_eq!(s.refresh_interval, RefreshInterval::OneHour);
        assert_eq!(s.forecast_view, ForecastView::Hourly);
    }

    #[test]
    fn serializes_wire_names() {
        let s = Settings {
            refresh_interval: RefreshInterval::ThirtyMinutes,
            temperature_unit: TemperatureUnit::Fahrenheit,
            forecast_view: ForecastView::Daily,
        };
        let json = serde_json::to_string(&s).expect("serialize");
        assert_eq!(
            json,
            r#"{"refresh_interval":"30min","temperature_unit":"fahrenheit","forecast_view":"daily"}"#
        );
    }

    #[test]
    fn strict_parse_lists_supported_values() {
        assert_eq!("1DAY".parse::<RefreshInterval>(), Ok(RefreshInterval::OneDay));

        let err = "hourly-ish".parse::<ForecastView>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Unknown forecast view"));
        assert!(msg.contains("hourly, daily"));
    }

    #[test]
    fn setters_touch_only_their_field() {
        let store = SettingsStore::default();

        store.set_temperature_unit(TemperatureUnit::Fahrenheit);
        assert_eq!(store.get().refresh_interval, RefreshInterval::OneHour);
        assert_eq!(store.get().forecast_view, ForecastView::Hourly);

        store.set_refresh_interval(RefreshInterval::OneDay);
        store.set_forecast_view(ForecastView::Daily);
        assert_eq!(store.get().temperature_unit, TemperatureUnit::Fahrenheit);

        let after = store.update(SettingsPatch {
            refresh_interval: Some(RefreshInterval::ThirtyMinutes),
            ..Default::default()
        });
        assert_eq!(after.refresh_interval, RefreshInterval::ThirtyMinutes);
        assert_eq!(after.forecast_view, ForecastView::Daily);
        assert_eq!(after.temperature_unit, TemperatureUnit::Fahrenheit);
    }
}
