//! Core library for the `weatherboard` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The weatherapi.com client behind the [`WeatherProvider`] trait
//! - The pinned-location registry and the merger that updates it
//! - Background refresh scheduling and the search/pin flow
//! - Snapshot persistence and display helpers
//!
//! It is used by `weatherboard-cli`, but [`Dashboard`] can drive any other front end.

pub mod clock;
pub mod config;
pub mod dashboard;
pub mod display;
pub mod error;
pub mod merge;
pub mod model;
pub mod notify;
pub mod persist;
pub mod provider;
pub mod registry;
pub mod scheduler;
pub mod search;
pub mod settings;
pub mod store;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use dashboard::{Dashboard, DashboardOptions};
pub use error::{ErrorKind, WeatherError};
pub use model::{
    CurrentConditions, Forecast, LocationId, PinnedLocation, SearchCandidate, Temperature,
};
pub use notify::{Notification, NotificationKind};
pub use persist::SnapshotFile;
pub use provider::{OfflineProvider, WeatherProvider, provider_from_config};
pub use scheduler::BatchReport;
pub use search::SearchOutcome;
pub use settings::{ForecastView, RefreshInterval, Settings, TemperatureUnit};
pub use store::Snapshot;
