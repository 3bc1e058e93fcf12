//! Searching for a place and turning the hit into a pinned location.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use tracing::{debug, info, warn};

use crate::{
    clock::Clock,
    error::WeatherError,
    model::{PinnedLocation, SearchCandidate},
    notify::{Notification, Notifier},
    provider::{WeatherProvider, validate_query},
    store::AppState,
};

/// What a successful search produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Pinned straight away (first-run bootstrap).
    Pinned(PinnedLocation),
    /// Waiting for the user to confirm the add.
    Preview(PinnedLocation),
}

impl SearchOutcome {
    pub fn location(&self) -> &PinnedLocation {
        match self {
            SearchOutcome::Pinned(l) | SearchOutcome::Preview(l) => l,
        }
    }

    pub fn into_location(self) -> PinnedLocation {
        match self {
            SearchOutcome::Pinned(l) | SearchOutcome::Preview(l) => l,
        }
    }
}

#[derive(Debug)]
pub struct SearchFlow {
    state: Arc<AppState>,
    provider: Arc<dyn WeatherProvider>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    default_query: String,
    in_flight: AtomicUsize,
}

/// Counts one running search for as long as it lives.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(count: &'a AtomicUsize) -> Self {
        count.fetch_add(1, Ordering::AcqRel);
        Self(count)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl SearchFlow {
    pub fn new(
        state: Arc<AppState>,
        provider: Arc<dyn WeatherProvider>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
        default_query: impl Into<String>,
    ) -> Self {
        Self {
            state,
            provider,
            notifier,
            clock,
            default_query: default_query.into(),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn default_query(&self) -> &str {
        &self.default_query
    }

    pub fn is_searching(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) > 0
    }

    fn is_bootstrap_query(&self, query: &str) -> bool {
        query.trim().eq_ignore_ascii_case(self.default_query.trim())
    }

    /// Look up `query` and build a pinned location from the answer.
    ///
    /// Only the first-run default is pinned without asking; every other hit comes
    /// back as a preview for [`SearchFlow::confirm`].
    pub async fn search(&self, query: &str) -> Result<SearchOutcome, WeatherError> {
        let query = validate_query(query, "City name")?;

        let _guard = InFlight::enter(&self.in_flight);

        debug!(%query, "Searching location");
        let report = match self.provider.current(query).await {
            Ok(report) => report,
            Err(err) => {
                warn!(%query, error = %err, "Search failed");
                self.notifier.send(Notification::from_error(&err, None));
                return Err(err);
            }
        };

        let location = PinnedLocation::from_report(report, self.clock.now());

        if self.state.registry().is_empty() && self.is_bootstrap_query(query) {
            info!(location_id = %location.id, name = %location.name, "Pinning default location");
            self.state.pin(location.clone());
            return Ok(SearchOutcome::Pinned(location));
        }

        Ok(SearchOutcome::Preview(location))
    }

    /// Pin the default location on first run.
    ///
    /// `Ok(None)` when something is already pinned or a search is running.
    pub async fn bootstrap(&self) -> Result<Option<PinnedLocation>, WeatherError> {
        if !self.state.registry().is_empty() || self.is_searching() {
            return Ok(None);
        }

        let query = self.default_query.clone();
        match self.search(&query).await? {
            SearchOutcome::Pinned(location) => Ok(Some(location)),
            // Something got pinned while the lookup was in flight.
            SearchOutcome::Preview(_) => Ok(None),
        }
    }

    /// Autocomplete candidates; an empty list is not an error.
    pub async fn suggest(&self, query: &str) -> Result<Vec<SearchCandidate>, WeatherError> {
        let query = validate_query(query, "Search query")?;
        self.provider.search(query).await
    }

    /// The user accepted a previewed location.
    pub fn confirm(&self, location: PinnedLocation) -> bool {
        let name = location.name.clone();
        let id = location.id.clone();
        let added = self.state.pin(location);
        if added {
            info!(location_id = %id, %name, "Location pinned");
            self.notifier.send(Notification::success(format!("{name} added"), Some(id)));
        } else {
            debug!(location_id = %id, "Location already pinned");
        }
        added
    }
}
