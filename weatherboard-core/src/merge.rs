//! Applies freshly fetched data to pinned locations.
//!
//! Each merge replaces only its own fields plus `last_updated`. Data for an id that
//! is no longer pinned is dropped, so a late response never resurrects a removed
//! location.

use std::sync::Arc;

use tracing::debug;

use crate::{
    clock::Clock,
    model::{CurrentConditions, Forecast, LocationId, PinnedLocation},
    registry::LocationRegistry,
};

#[derive(Debug, Clone)]
pub struct WeatherMerger {
    registry: Arc<LocationRegistry>,
    clock: Arc<dyn Clock>,
}

impl WeatherMerger {
    pub fn new(registry: Arc<LocationRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self { registry, clock }
    }

    pub fn merge_current_conditions(&self, id: &LocationId, reading: CurrentConditions) -> bool {
        self.apply(id, "current", |old, now| PinnedLocation {
            current: Some(reading),
            last_updated: now,
            ..old.clone()
        })
    }

    pub fn merge_forecast(&self, id: &LocationId, forecast: Forecast) -> bool {
        self.apply(id, "forecast", |old, now| PinnedLocation {
            forecast: Some(forecast),
            last_updated: now,
            ..old.clone()
        })
    }

    pub fn merge_local_time(
        &self,
        id: &LocationId,
        localtime: String,
        localtime_epoch: i64,
    ) -> bool {
        self.apply(id, "localtime", |old, now| PinnedLocation {
            localtime,
            localtime_epoch,
            last_updated: now,
            ..old.clone()
        })
    }

    fn apply<F>(&self, id: &LocationId, field: &'static str, update: F) -> bool
    where
        F: FnOnce(&PinnedLocation, chrono::DateTime<chrono::Utc>) -> PinnedLocation,
    {
        let now = self.clock.now();
        let applied = self.registry.replace(id, |old| update(old, now));
        if !applied {
            debug!(location_id = %id, field, "Discarding data for location that is not pinned");
        }
        applied
    }
}
