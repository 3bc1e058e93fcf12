//! Background refresh of pinned locations.
//!
//! A batch fans out one fetch per pinned location and waits for all of them to
//! settle. Failures stay with their location: they are logged and reported on the
//! notification channel, never propagated, and the batch timestamp advances
//! regardless so a partly failed batch does not retry before the next interval.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{
    clock::Clock,
    error::WeatherError,
    merge::WeatherMerger,
    model::{CurrentReport, LocationId, PinnedLocation},
    notify::{Notification, Notifier},
    provider::WeatherProvider,
    settings::RefreshInterval,
    store::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Refreshing,
}

/// Outcome of one batch refresh.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub succeeded: Vec<LocationId>,
    pub failed: Vec<(LocationId, WeatherError)>,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// `true` when no batch has run yet or at least one interval has elapsed.
pub fn is_due(last: Option<DateTime<Utc>>, interval: RefreshInterval, now: DateTime<Utc>) -> bool {
    let Some(last) = last else {
        return true;
    };

    let elapsed = now.signed_duration_since(last);
    elapsed.num_milliseconds() >= interval.as_millis() as i64
}

/// `tokio::time::interval` rejects a zero period.
const MIN_CHECK_EVERY: Duration = Duration::from_millis(1);

#[derive(Debug)]
pub struct RefreshScheduler {
    state: Arc<AppState>,
    provider: Arc<dyn WeatherProvider>,
    merger: WeatherMerger,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    check_every: Duration,
    refreshing: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Clears the in-flight flag even if the batch future is dropped midway.
struct RefreshingGuard<'a>(&'a AtomicBool);

impl Drop for RefreshingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RefreshScheduler {
    pub fn new(
        state: Arc<AppState>,
        provider: Arc<dyn WeatherProvider>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
        check_every: Duration,
    ) -> Self {
        let merger = WeatherMerger::new(Arc::clone(state.registry()), Arc::clone(&clock));
        Self {
            state,
            provider,
            merger,
            notifier,
            clock,
            check_every: check_every.max(MIN_CHECK_EVERY),
            refreshing: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.refreshing.load(Ordering::Acquire) {
            SchedulerState::Refreshing
        } else {
            SchedulerState::Idle
        }
    }

    /// Due-check against the current settings and clock.
    pub fn is_due_now(&self) -> bool {
        is_due(
            self.state.last_batch_refresh(),
            self.state.settings().refresh_interval(),
            self.clock.now(),
        )
    }

    /// Run a batch if there is something pinned, the interval has elapsed and no
    /// batch is already in flight.
    pub async fn run_if_due(&self) -> Option<BatchReport> {
        if self.state.registry().is_empty() {
            debug!("No pinned locations, skipping refresh check");
            return None;
        }
        if !self.is_due_now() {
            debug!(last = ?self.state.last_batch_refresh(), "Refresh not due yet");
            return None;
        }
        self.try_batch().await
    }

    /// Refresh every pinned location now, ignoring the interval.
    ///
    /// Returns `None` only if another batch is already in flight.
    pub async fn refresh_all(&self) -> Option<BatchReport> {
        self.try_batch().await
    }

    async fn try_batch(&self) -> Option<BatchReport> {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Batch refresh already in flight");
            return None;
        }
        let _guard = RefreshingGuard(&self.refreshing);

        Some(self.run_batch().await)
    }

    async fn run_batch(&self) -> BatchReport {
        let started_at = self.clock.now();
        let pinned = self.state.registry().list();
        info!(count = pinned.len(), "Starting batch refresh");

        let fetches = pinned.iter().map(|location| {
            let id = location.id.clone();
            let query = location.query();
            async move {
                let result = self.provider.current(&query).await;
                (id, query, result)
            }
        });

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        for (id, query, result) in join_all(fetches).await {
            match result {
                Ok(report) => {
                    self.apply(&id, report);
                    succeeded.push(id);
                }
                Err(err) => {
                    warn!(location_id = %id, %query, error = %err, "Refresh failed");
                    self.notifier.send(Notification::from_error(&err, Some(id.clone())));
                    failed.push((id, err));
                }
            }
        }

        let finished_at = self.clock.now();
        self.state.set_last_batch_refresh(finished_at);

        info!(succeeded = succeeded.len(), failed = failed.len(), "Batch refresh finished");

        BatchReport { started_at, finished_at, succeeded, failed }
    }

    /// Manual refresh of a single location. Leaves the batch timestamp alone.
    pub async fn refresh_one(&self, id: &LocationId) -> Result<PinnedLocation, WeatherError> {
        let Some(location) = self.state.registry().find(id) else {
            return Err(WeatherError::input(format!("Location '{id}' is not pinned")));
        };

        match self.provider.current(&location.query()).await {
            Ok(report) => {
                self.apply(id, report);
                self.notifier.send(Notification::success(
                    format!("{} weather updated", location.name),
                    Some(id.clone()),
                ));
                // Unpinned while the fetch was in flight: report what we had.
                Ok(self.state.registry().find(id).unwrap_or(location))
            }
            Err(err) => {
                warn!(location_id = %id, error = %err, "Manual refresh failed");
                self.notifier.send(Notification::from_error(&err, Some(id.clone())));
                Err(err)
            }
        }
    }

    fn apply(&self, id: &LocationId, report: CurrentReport) {
        let CurrentReport { location, current } = report;
        if self.merger.merge_current_conditions(id, current) {
            self.merger.merge_local_time(id, location.localtime, location.localtime_epoch);
        }
    }

    /// Spawn the check loop. A no-op if it is already running.
    ///
    /// Checks run on every tick (the first one immediately) and whenever the
    /// pinned set changes. The interval setting is read at each check, so changing
    /// it needs no restart.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        info!(check_every_secs = self.check_every.as_secs_f64(), "Starting refresh scheduler");

        let this = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.check_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = this.state.pins_changed() => {
                        debug!("Pinned locations changed");
                    }
                }

                // The batch runs on its own task so aborting the loop leaves
                // in-flight fetches to settle and merge.
                let batch = Arc::clone(&this);
                if let Err(err) = tokio::spawn(async move { batch.run_if_due().await }).await {
                    warn!(error = %err, "Batch refresh task failed");
                }
            }
        }));
    }

    /// Tear down the check loop. A batch already running completes on its own.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            info!("Stopping refresh scheduler");
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|t| !t.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::{
        clock::FixedClock,
        notify::NotificationKind,
        test_support::{ScriptedProvider, conditions, forecast, report, t0},
    };

    struct Harness {
        state: Arc<AppState>,
        provider: Arc<ScriptedProvider>,
        clock: Arc<FixedClock>,
        notifier: Notifier,
        scheduler: Arc<RefreshScheduler>,
    }

    fn harness() -> Harness {
        let state = Arc::new(AppState::new());
        let provider = ScriptedProvider::new();
        let clock = Arc::new(FixedClock::new(t0()));
        let notifier = Notifier::new();
        let scheduler = Arc::new(RefreshScheduler::new(
            Arc::clone(&state),
            provider.clone(),
            notifier.clone(),
            clock.clone(),
            Duration::from_millis(20),
        ));
        Harness { state, provider, clock, notifier, scheduler }
    }

    fn pin(h: &Harness, name: &str, lat: f64, lon: f64) -> LocationId {
        let r = report(name, lat, lon, 20.0);
        let location = PinnedLocation::from_report(r, t0() - ChronoDuration::hours(3));
        let id = location.id.clone();
        h.state.pin(location);
        id
    }

    #[test]
    fn due_boundary_is_inclusive() {
        let interval = RefreshInterval::OneHour;
        let last = t0();

        assert!(is_due(None, interval, last));
        assert!(!is_due(Some(last), interval, last + ChronoDuration::milliseconds(3_599_999)));
        assert!(is_due(Some(last), interval, last + ChronoDuration::milliseconds(3_600_000)));
        assert!(is_due(Some(last), interval, last + ChronoDuration::hours(2)));
    }

    #[test]
    fn due_check_tracks_each_interval() {
        let now = t0();
        let ago = |m: i64| Some(now - ChronoDuration::minutes(m));

        assert!(!is_due(ago(20), RefreshInterval::ThirtyMinutes, now));
        assert!(is_due(ago(35), RefreshInterval::ThirtyMinutes, now));
        assert!(!is_due(ago(12 * 60), RefreshInterval::OneDay, now));
        assert!(is_due(ago(25 * 60), RefreshInterval::OneDay, now));
    }

    #[test]
    fn lowering_the_interval_applies_on_next_check() {
        let h = harness();
        pin(&h, "Colombo", 6.93, 79.85);
        h.state.set_last_batch_refresh(t0() - ChronoDuration::minutes(45));

        assert!(!h.scheduler.is_due_now());

        h.state.settings().set_refresh_interval(RefreshInterval::ThirtyMinutes);
        assert!(h.scheduler.is_due_now());

        h.state.settings().set_refresh_interval(RefreshInterval::OneDay);
        assert!(!h.scheduler.is_due_now());
    }

    #[tokio::test]
    async fn nothing_pinned_means_no_batch() {
        let h = harness();
        assert!(h.scheduler.run_if_due().await.is_none());
        assert!(h.provider.calls().is_empty());
        assert_eq!(h.state.last_batch_refresh(), None);
    }

    #[tokio::test]
    async fn due_batch_fetches_every_pin_once() {
        let h = harness();
        let colombo = pin(&h, "Colombo", 6.93, 79.85);
        let kandy = pin(&h, "Kandy", 7.3, 80.64);
        h.provider.ok("Colombo, Sri Lanka", report("Colombo", 6.93, 79.85, 31.0));
        h.provider.ok("Kandy, Sri Lanka", report("Kandy", 7.3, 80.64, 24.0));

        h.state.settings().set_refresh_interval(RefreshInterval::ThirtyMinutes);
        h.state.set_last_batch_refresh(t0() - ChronoDuration::minutes(31));

        let batch = h.scheduler.run_if_due().await.expect("batch must run");

        assert_eq!(h.provider.calls().len(), 2);
        assert_eq!(batch.succeeded, vec![colombo.clone(), kandy.clone()]);
        assert!(batch.is_clean());
        assert_eq!(h.state.last_batch_refresh(), Some(t0()));

        for id in [&colombo, &kandy] {
            let location = h.state.registry().find(id).expect("pinned");
            assert_eq!(location.last_updated, t0());
        }
        let colombo = h.state.registry().find(&colombo).expect("pinned");
        assert_eq!(colombo.current, Some(conditions(31.0)));
    }

    #[tokio::test]
    async fn not_due_means_no_fetches() {
        let h = harness();
        pin(&h, "Colombo", 6.93, 79.85);
        h.state.set_last_batch_refresh(t0() - ChronoDuration::minutes(10));

        assert!(h.scheduler.run_if_due().await.is_none());
        assert!(h.provider.calls().is_empty());
    }

    #[tokio::test]
    async fn partial_failure_updates_only_successes() {
        let h = harness();
        let colombo = pin(&h, "Colombo", 6.93, 79.85);
        let kandy = pin(&h, "Kandy", 7.3, 80.64);
        let galle = pin(&h, "Galle", 6.04, 80.22);
        h.provider.ok("Colombo, Sri Lanka", report("Colombo", 6.93, 79.85, 31.0));
        h.provider.fail("Kandy, Sri Lanka", WeatherError::Server { status: 502 });
        h.provider.fail("Galle, Sri Lanka", WeatherError::Timeout);

        let before_kandy = h.state.registry().find(&kandy).expect("pinned");
        let before_galle = h.state.registry().find(&galle).expect("pinned");
        let mut rx = h.notifier.subscribe();

        h.clock.advance(ChronoDuration::minutes(1));
        let batch = h.scheduler.refresh_all().await.expect("batch must run");

        assert_eq!(batch.attempted(), 3);
        assert_eq!(batch.succeeded, vec![colombo.clone()]);
        assert_eq!(batch.failed.len(), 2);

        let after = h.state.registry().find(&colombo).expect("pinned");
        assert_eq!(after.last_updated, t0() + ChronoDuration::minutes(1));
        assert_eq!(h.state.registry().find(&kandy), Some(before_kandy));
        assert_eq!(h.state.registry().find(&galle), Some(before_galle));
        assert_eq!(h.state.last_batch_refresh(), Some(t0() + ChronoDuration::minutes(1)));

        let first = rx.recv().await.expect("failure notification");
        let second = rx.recv().await.expect("failure notification");
        assert_eq!(first.kind, NotificationKind::Failure);
        assert_eq!(second.kind, NotificationKind::Failure);
    }

    #[tokio::test]
    async fn all_failing_still_advances_timestamp() {
        let h = harness();
        pin(&h, "Colombo", 6.93, 79.85);
        h.provider.fail("Colombo, Sri Lanka", WeatherError::Network("down".into()));

        let batch = h.scheduler.run_if_due().await.expect("first batch is always due");
        assert!(batch.succeeded.is_empty());
        assert_eq!(h.state.last_batch_refresh(), Some(t0()));

        // The failure does not make the next check due again.
        assert!(h.scheduler.run_if_due().await.is_none());
    }

    #[tokio::test]
    async fn merge_keeps_forecast_of_refreshed_location() {
        let h = harness();
        let colombo = pin(&h, "Colombo", 6.93, 79.85);
        h.state.registry().replace(&colombo, |old| PinnedLocation {
            forecast: Some(forecast()),
            ..old.clone()
        });
        h.provider.ok("Colombo, Sri Lanka", report("Colombo", 6.93, 79.85, 30.0));

        h.scheduler.refresh_all().await.expect("batch must run");

        let after = h.state.registry().find(&colombo).expect("pinned");
        assert_eq!(after.forecast, Some(forecast()));
        assert_eq!(after.current, Some(conditions(30.0)));
    }

    #[tokio::test]
    async fn removed_while_in_flight_is_not_resurrected() {
        let h = harness();
        let colombo = pin(&h, "Colombo", 6.93, 79.85);
        h.provider.ok("Colombo, Sri Lanka", report("Colombo", 6.93, 79.85, 30.0));
        h.provider.delay("Colombo, Sri Lanka", Duration::from_millis(50));

        let scheduler = Arc::clone(&h.scheduler);
        let batch = tokio::spawn(async move { scheduler.refresh_all().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.scheduler.state(), SchedulerState::Refreshing);
        assert!(h.state.unpin(&colombo));

        let batch = batch.await.expect("join").expect("batch must run");
        assert_eq!(batch.succeeded, vec![colombo.clone()]);
        assert!(h.state.registry().is_empty());
        assert_eq!(h.scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn overlapping_triggers_coalesce() {
        let h = harness();
        pin(&h, "Colombo", 6.93, 79.85);
        h.provider.ok("Colombo, Sri Lanka", report("Colombo", 6.93, 79.85, 30.0));
        h.provider.delay("Colombo, Sri Lanka", Duration::from_millis(50));

        let (first, second) = tokio::join!(h.scheduler.refresh_all(), h.scheduler.refresh_all());

        assert_eq!(first.is_some() as u8 + second.is_some() as u8, 1);
        assert_eq!(h.provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn refresh_one_notifies_and_leaves_batch_timestamp() {
        let h = harness();
        let colombo = pin(&h, "Colombo", 6.93, 79.85);
        h.provider.ok("Colombo, Sri Lanka", report("Colombo", 6.93, 79.85, 27.0));
        let mut rx = h.notifier.subscribe();

        let updated = h.scheduler.refresh_one(&colombo).await.expect("refresh succeeds");
        assert_eq!(updated.current, Some(conditions(27.0)));
        assert_eq!(h.state.last_batch_refresh(), None);

        let n = rx.recv().await.expect("success notification");
        assert_eq!(n.kind, NotificationKind::Success);
        assert_eq!(n.location, Some(colombo.clone()));

        h.provider.fail("Colombo, Sri Lanka", WeatherError::RateLimited);
        let err = h.scheduler.refresh_one(&colombo).await.unwrap_err();
        assert_eq!(err, WeatherError::RateLimited);
        let n = rx.recv().await.expect("failure notification");
        assert_eq!(n.kind, NotificationKind::Failure);
    }

    #[tokio::test]
    async fn refresh_one_unknown_id_is_input_error() {
        let h = harness();
        let err = h.scheduler.refresh_one(&LocationId::from("0-0")).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Input);
        assert!(h.provider.calls().is_empty());
    }

    #[tokio::test]
    async fn start_runs_an_immediate_check_and_stop_tears_down() {
        let h = harness();
        pin(&h, "Colombo", 6.93, 79.85);
        h.provider.ok("Colombo, Sri Lanka", report("Colombo", 6.93, 79.85, 30.0));

        h.scheduler.start();
        h.scheduler.start();
        assert!(h.scheduler.is_running());

        for _ in 0..50 {
            if h.state.last_batch_refresh().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(h.state.last_batch_refresh(), Some(t0()));

        // Further ticks find nothing due while the clock stands still.
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(h.provider.calls().len(), 1);

        h.scheduler.stop();
        assert!(!h.scheduler.is_running());
    }

    #[tokio::test]
    async fn stop_mid_batch_lets_fetches_settle() {
        let h = harness();
        let colombo = pin(&h, "Colombo", 6.93, 79.85);
        h.provider.ok("Colombo, Sri Lanka", report("Colombo", 6.93, 79.85, 30.0));
        h.provider.delay("Colombo, Sri Lanka", Duration::from_millis(50));

        h.scheduler.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.scheduler.state(), SchedulerState::Refreshing);

        h.scheduler.stop();
        assert!(!h.scheduler.is_running());

        for _ in 0..50 {
            if h.state.last_batch_refresh().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(h.state.last_batch_refresh(), Some(t0()));
        let after = h.state.registry().find(&colombo).expect("pinned");
        assert_eq!(after.current, Some(conditions(30.0)));
        assert_eq!(h.scheduler.state(), SchedulerState::Idle);

        // No further checks once stopped.
        h.clock.advance(ChronoDuration::days(2));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(h.provider.calls().len(), 1);
    }

    #[test]
    fn zero_check_period_is_clamped() {
        let h = harness();
        let scheduler = RefreshScheduler::new(
            Arc::clone(&h.state),
            h.provider.clone(),
            h.notifier.clone(),
            h.clock.clone(),
            Duration::ZERO,
        );
        assert_eq!(scheduler.check_every, MIN_CHECK_EVERY);
    }

    #[tokio::test]
    async fn pinning_into_empty_registry_wakes_the_loop() {
        let h = harness();
        let scheduler = Arc::new(RefreshScheduler::new(
            Arc::clone(&h.state),
            h.provider.clone(),
            h.notifier.clone(),
            h.clock.clone(),
            Duration::from_secs(3600),
        ));
        h.provider.ok("Colombo, Sri Lanka", report("Colombo", 6.93, 79.85, 30.0));

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.provider.calls().is_empty());

        pin(&h, "Colombo", 6.93, 79.85);
        for _ in 0..50 {
            if !h.provider.calls().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(h.provider.calls(), vec!["Colombo, Sri Lanka".to_string()]);

        scheduler.stop();
    }
}
