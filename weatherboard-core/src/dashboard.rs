//! One handle over the whole core, for whatever renders the dashboard.

use std::{sync::Arc, time::Duration};

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    Config,
    clock::{Clock, SystemClock},
    error::WeatherError,
    merge::WeatherMerger,
    model::{ForecastReport, LocationId, PinnedLocation, SearchCandidate},
    notify::{Notification, Notifier},
    provider::{WeatherProvider, validate_forecast_days},
    scheduler::{BatchReport, RefreshScheduler},
    search::{SearchFlow, SearchOutcome},
    settings::{ForecastView, RefreshInterval, Settings, SettingsPatch, TemperatureUnit},
    store::{AppState, Snapshot},
};

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub forecast_days: u8,
    pub check_every: Duration,
    pub default_location: String,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for DashboardOptions {
    fn from(config: &Config) -> Self {
        Self {
            forecast_days: config.forecast_days,
            check_every: config.check_interval(),
            default_location: config.default_location.clone(),
        }
    }
}

#[derive(Debug)]
pub struct Dashboard {
    state: Arc<AppState>,
    provider: Arc<dyn WeatherProvider>,
    notifier: Notifier,
    merger: WeatherMerger,
    scheduler: Arc<RefreshScheduler>,
    search: SearchFlow,
    forecast_days: u8,
}

impl Dashboard {
    pub fn new(
        snapshot: Snapshot,
        provider: Arc<dyn WeatherProvider>,
        options: DashboardOptions,
    ) -> Self {
        Self::with_clock(snapshot, provider, options, Arc::new(SystemClock))
    }

    pub fn with_clock(
        snapshot: Snapshot,
        provider: Arc<dyn WeatherProvider>,
        options: DashboardOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = Arc::new(AppState::from_snapshot(snapshot));
        let notifier = Notifier::new();
        let merger = WeatherMerger::new(Arc::clone(state.registry()), Arc::clone(&clock));
        let scheduler = Arc::new(RefreshScheduler::new(
            Arc::clone(&state),
            Arc::clone(&provider),
            notifier.clone(),
            Arc::clone(&clock),
            options.check_every,
        ));
        let search = SearchFlow::new(
            Arc::clone(&state),
            Arc::clone(&provider),
            notifier.clone(),
            clock,
            options.default_location,
        );

        Self {
            state,
            provider,
            notifier,
            merger,
            scheduler,
            search,
            forecast_days: options.forecast_days,
        }
    }

    pub fn pins(&self) -> Arc<Vec<PinnedLocation>> {
        self.state.registry().list()
    }

    pub fn find(&self, id: &LocationId) -> Option<PinnedLocation> {
        self.state.registry().find(id)
    }

    pub fn pin(&self, location: PinnedLocation) -> bool {
        self.search.confirm(location)
    }

    pub fn unpin(&self, id: &LocationId) -> bool {
        let removed = self.state.unpin(id);
        if removed {
            info!(location_id = %id, "Location unpinned");
        }
        removed
    }

    pub async fn refresh_one(&self, id: &LocationId) -> Result<PinnedLocation, WeatherError> {
        self.scheduler.refresh_one(id).await
    }

    /// Forced batch. `None` if one is already running.
    pub async fn refresh_all(&self) -> Option<BatchReport> {
        self.scheduler.refresh_all().await
    }

    pub async fn run_if_due(&self) -> Option<BatchReport> {
        self.scheduler.run_if_due().await
    }

    /// Fetch the forecast for a pinned location and merge it in, together with
    /// the current conditions and local time that come with it.
    pub async fn load_forecast(&self, id: &LocationId) -> Result<PinnedLocation, WeatherError> {
        let Some(location) = self.find(id) else {
            return Err(WeatherError::input(format!("Location '{id}' is not pinned")));
        };
        let days = validate_forecast_days(self.forecast_days)?;

        let report = match self.provider.forecast(&location.query(), days).await {
            Ok(report) => report,
            Err(err) => {
                warn!(location_id = %id, error = %err, "Forecast fetch failed");
                self.notifier.send(Notification::from_error(&err, Some(id.clone())));
                return Err(err);
            }
        };

        let ForecastReport { location: info, current, forecast } = report;
        self.merger.merge_forecast(id, forecast);
        self.merger.merge_current_conditions(id, current);
        self.merger.merge_local_time(id, info.localtime, info.localtime_epoch);

        Ok(self.find(id).unwrap_or(location))
    }

    pub async fn search(&self, query: &str) -> Result<SearchOutcome, WeatherError> {
        self.search.search(query).await
    }

    pub async fn suggest(&self, query: &str) -> Result<Vec<SearchCandidate>, WeatherError> {
        self.search.suggest(query).await
    }

    pub async fn bootstrap(&self) -> Result<Option<PinnedLocation>, WeatherError> {
        self.search.bootstrap().await
    }

    pub fn confirm(&self, location: PinnedLocation) -> bool {
        self.search.confirm(location)
    }

    pub fn settings(&self) -> Settings {
        self.state.settings().get()
    }

    pub fn set_refresh_interval(&self, interval: RefreshInterval) {
        self.state.settings().set_refresh_interval(interval);
    }

    pub fn set_temperature_unit(&self, unit: TemperatureUnit) {
        self.state.settings().set_temperature_unit(unit);
    }

    pub fn set_forecast_view(&self, view: ForecastView) {
        self.state.settings().set_forecast_view(view);
    }

    pub fn update_settings(&self, patch: SettingsPatch) -> Settings {
        self.state.settings().update(patch)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.to_snapshot()
    }

    pub fn start(&self) {
        self.scheduler.start();
    }

    pub fn stop(&self) {
        self.scheduler.stop();
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }
}

impl Drop for Dashboard {
    // The loop task holds its own handle on the scheduler.
    fn drop(&mut self) {
        self.scheduler.stop();
    }
}
