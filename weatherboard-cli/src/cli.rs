use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use inquire::{Confirm, Password, PasswordDisplayMode, Text};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use weatherboard_core::{
    Config, Dashboard, DashboardOptions, ForecastView, LocationId, OfflineProvider,
    RefreshInterval, SearchOutcome, SnapshotFile, TemperatureUnit, WeatherProvider,
    provider_from_config, settings::SettingsPatch,
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherboard", version, about = "Weather dashboard for pinned locations")]
pub struct Cli {
    /// More log output (-v, -vv, -vvv). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the weatherapi.com API key and the first-run location.
    Configure,

    #[command(flatten)]
    Dashboard(DashboardCommand),
}

/// Commands that work on the saved dashboard.
#[derive(Debug, Subcommand)]
pub enum DashboardCommand {
    /// Look up a location and pin it.
    Search {
        /// City name, postcode or "lat,lon".
        query: String,

        /// Pin without asking.
        #[arg(short, long)]
        yes: bool,
    },

    /// List locations matching a partial name.
    Suggest { query: String },

    /// Show pinned locations.
    List,

    /// Remove a pinned location.
    Unpin { id: String },

    /// Refresh one location, or all of them.
    Refresh { id: Option<String> },

    /// Show the forecast for a pinned location.
    Forecast { id: String },

    /// Show or change display and refresh settings.
    Settings {
        /// 30min, 1hour or 1day.
        #[arg(long)]
        interval: Option<RefreshInterval>,

        /// celsius or fahrenheit.
        #[arg(long)]
        unit: Option<TemperatureUnit>,

        /// hourly or daily.
        #[arg(long)]
        view: Option<ForecastView>,
    },

    /// Keep pinned locations fresh until interrupted.
    Watch,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Dashboard(command) => Session::open(&command)?.execute(command).await,
        }
    }
}

impl DashboardCommand {
    /// Whether the command talks to weatherapi.com.
    fn needs_network(&self) -> bool {
        !matches!(
            self,
            DashboardCommand::List
                | DashboardCommand::Unpin { .. }
                | DashboardCommand::Settings { .. }
        )
    }
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("weatherapi.com API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .with_help_message("Leave empty to keep the current key")
        .prompt()?;
    if !api_key.trim().is_empty() {
        config.set_api_key(api_key);
    }

    let default_location = Text::new("Location to pin on first run:")
        .with_default(&config.default_location)
        .prompt()?;
    config.default_location = default_location;

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

/// A loaded dashboard plus where to write it back.
struct Session {
    config: Config,
    file: SnapshotFile,
    dashboard: Dashboard,
}

impl Session {
    fn open(command: &DashboardCommand) -> Result<Self> {
        let config = Config::load()?;
        let provider: Arc<dyn WeatherProvider> = if command.needs_network() {
            provider_from_config(&config)?
        } else {
            Arc::new(OfflineProvider)
        };
        let file = SnapshotFile::default_location()?;
        let snapshot = file.load()?.unwrap_or_default();

        let dashboard = Dashboard::new(snapshot, provider, DashboardOptions::from(&config));
        Ok(Self { config, file, dashboard })
    }

    fn save(&self) -> Result<()> {
        self.file
            .save(&self.dashboard.snapshot())
            .context("Could not persist pinned locations")
    }

    fn unit(&self) -> TemperatureUnit {
        self.dashboard.settings().temperature_unit
    }

    fn pinned_id(&self, id: &str) -> Result<LocationId> {
        let id = LocationId::from(id.trim());
        if self.dashboard.find(&id).is_none() {
            bail!("No pinned location with id '{id}'. Run `weatherboard list` to see ids.");
        }
        Ok(id)
    }

    async fn execute(self, command: DashboardCommand) -> Result<()> {
        match command {
            DashboardCommand::Search { query, yes } => self.search(&query, yes).await,
            DashboardCommand::Suggest { query } => {
                let hits = self.dashboard.suggest(&query).await?;
                if hits.is_empty() {
                    println!("No matches for '{query}'");
                }
                for hit in hits {
                    println!("{}", render::candidate_line(&hit));
                }
                Ok(())
            }
            DashboardCommand::List => {
                self.list();
                Ok(())
            }
            DashboardCommand::Unpin { id } => {
                let id = self.pinned_id(&id)?;
                self.dashboard.unpin(&id);
                self.save()?;
                println!("Unpinned {id}");
                Ok(())
            }
            DashboardCommand::Refresh { id: Some(id) } => {
                let id = self.pinned_id(&id)?;
                let location = self.dashboard.refresh_one(&id).await?;
                self.save()?;
                println!("{}", render::location_line(&location, self.unit(), chrono::Utc::now()));
                Ok(())
            }
            DashboardCommand::Refresh { id: None } => {
                if let Some(batch) = self.dashboard.refresh_all().await {
                    println!("{}", render::batch_summary(&batch));
                }
                self.save()?;
                self.list();
                Ok(())
            }
            DashboardCommand::Forecast { id } => {
                let id = self.pinned_id(&id)?;
                let location = self.dashboard.load_forecast(&id).await?;
                self.save()?;

                let settings = self.dashboard.settings();
                println!("{}", render::current_details(&location, settings.temperature_unit));
                if let Some(forecast) = &location.forecast {
                    let lines = match settings.forecast_view {
                        ForecastView::Hourly => {
                            render::hourly(forecast, &location.localtime, settings.temperature_unit)
                        }
                        ForecastView::Daily => render::daily(forecast, settings.temperature_unit),
                    };
                    println!("{lines}");
                }
                Ok(())
            }
            DashboardCommand::Settings { interval, unit, view } => {
                let patch = SettingsPatch {
                    refresh_interval: interval,
                    temperature_unit: unit,
                    forecast_view: view,
                };
                let settings = if patch.is_empty() {
                    self.dashboard.settings()
                } else {
                    let updated = self.dashboard.update_settings(patch);
                    self.save()?;
                    updated
                };
                println!("{}", render::settings(&settings));
                Ok(())
            }
            DashboardCommand::Watch => self.watch().await,
        }
    }

    async fn search(&self, query: &str, yes: bool) -> Result<()> {
        match self.dashboard.search(query).await? {
            SearchOutcome::Pinned(location) => {
                println!("{}", render::current_details(&location, self.unit()));
                println!("Pinned {}", location.label());
            }
            SearchOutcome::Preview(location) => {
                println!("{}", render::current_details(&location, self.unit()));

                let label = location.label();
                let pin = yes
                    || Confirm::new(&format!("Pin {label}?")).with_default(true).prompt()?;
                if !pin {
                    return Ok(());
                }

                if self.dashboard.confirm(location) {
                    println!("Pinned {label}");
                } else {
                    println!("{label} is already pinned");
                }
            }
        }

        self.save()
    }

    fn list(&self) {
        let pins = self.dashboard.pins();
        if pins.is_empty() {
            println!("Nothing pinned yet. Try `weatherboard search <city>`.");
            return;
        }

        let now = chrono::Utc::now();
        for location in pins.iter() {
            println!("{}", render::location_line(location, self.unit(), now));
        }
    }

    async fn watch(self) -> Result<()> {
        let session = self;
        let mut notifications = session.dashboard.subscribe();

        match session.dashboard.bootstrap().await {
            Ok(Some(location)) => {
                println!("Pinned {}", location.label());
                session.save()?;
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "Could not pin the default location"),
        }

        session.dashboard.start();
        println!(
            "Watching {} location(s), refreshing every {}. Ctrl-C to stop.",
            session.dashboard.pins().len(),
            session.dashboard.settings().refresh_interval
        );
        session.list();

        let mut saved_at = session.dashboard.snapshot().last_batch_refresh;
        let mut ticker = tokio::time::interval(session.config.check_interval());

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                received = notifications.recv() => match received {
                    Ok(notification) => println!("{}", render::notification(&notification)),
                    Err(RecvError::Lagged(missed)) => debug!(missed, "Dropped notifications"),
                    Err(RecvError::Closed) => break,
                },
                _ = ticker.tick() => {
                    let snapshot = session.dashboard.snapshot();
                    if snapshot.last_batch_refresh != saved_at {
                        saved_at = snapshot.last_batch_refresh;
                        session.file.save(&snapshot)?;
                        session.list();
                    }
                }
            }
        }

        session.dashboard.stop();
        session.save()
    }
}
