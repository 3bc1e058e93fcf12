//! Explicitly owned application state and its persisted snapshot.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::{
    model::{LocationId, PinnedLocation},
    registry::LocationRegistry,
    settings::{Settings, SettingsStore},
};

/// Everything that survives a restart. Session-only state is not part of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub pinned_locations: Vec<PinnedLocation>,
    #[serde(default)]
    pub last_batch_refresh: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize state snapshot")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse state snapshot")
    }
}

/// Shared state handed to the scheduler, the search flow and the display layer.
#[derive(Debug, Default)]
pub struct AppState {
    registry: Arc<LocationRegistry>,
    settings: SettingsStore,
    last_batch_refresh: RwLock<Option<DateTime<Utc>>>,
    pins_changed: Notify,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            registry: Arc::new(LocationRegistry::new(snapshot.pinned_locations)),
            settings: SettingsStore::new(snapshot.settings),
            last_batch_refresh: RwLock::new(snapshot.last_batch_refresh),
            pins_changed: Notify::new(),
        }
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            settings: self.settings.get(),
            pinned_locations: (*self.registry.list()).clone(),
            last_batch_refresh: self.last_batch_refresh(),
        }
    }

    pub fn registry(&self) -> &Arc<LocationRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn last_batch_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_batch_refresh.read()
    }

    pub fn set_last_batch_refresh(&self, at: DateTime<Utc>) {
        *self.last_batch_refresh.write() = Some(at);
    }

    /// Pin a location and wake anyone waiting on the pinned set.
    pub fn pin(&self, location: PinnedLocation) -> bool {
        let added = self.registry.add(location);
        if added {
            self.pins_changed.notify_one();
        }
        added
    }

    pub fn unpin(&self, id: &LocationId) -> bool {
        let removed = self.registry.remove(id);
        if removed {
            self.pins_changed.notify_one();
        }
        removed
    }

    /// Resolves the next time a location is pinned or unpinned.
    pub async fn pins_changed(&self) {
        self.pins_changed.notified().await;
    }
}
