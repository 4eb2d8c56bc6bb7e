use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::advisor::{
    request_and_report, AutoRequestLoop, OptimalTimeRequester, RequestWindow, StatusBoard,
};
use crate::constants::MAX_DATA_POINTS;
use crate::probe::{LatencyProbe, ProbeScheduler};
use crate::remote::EntryTimeApi;
use crate::series::SeriesHandle;

pub const STOPPED_BY_USER: &str = "Request stopped by user.";

/// Composes the probing and advisor halves of the dashboard.
///
/// Selecting a target resets the series and restarts probing; requesting an
/// optimal time fires one immediate call and activates the auto loop; stop
/// aborts the in-flight call and halts the loop. A target change deliberately
/// leaves an in-flight advisor call running (see DESIGN.md).
pub struct DashboardController {
    series: SeriesHandle,
    scheduler: ProbeScheduler,
    requester: OptimalTimeRequester,
    auto_loop: AutoRequestLoop,
    window: Arc<Mutex<RequestWindow>>,
    status: Arc<StatusBoard>,
}

impl DashboardController {
    pub fn new(
        probe: Arc<dyn LatencyProbe>,
        api: Arc<dyn EntryTimeApi>,
        probe_interval: Duration,
        auto_interval: Duration,
        release_time: Option<DateTime<Utc>>,
    ) -> Self {
        let series = SeriesHandle::new(MAX_DATA_POINTS);
        let window = Arc::new(Mutex::new(RequestWindow {
            target: None,
            release_time,
        }));
        let status = Arc::new(StatusBoard::default());
        let requester = OptimalTimeRequester::new(api);
        let auto_loop = AutoRequestLoop::new(
            requester.clone(),
            Arc::clone(&window),
            Arc::clone(&status),
            auto_interval,
        );
        let scheduler = ProbeScheduler::new(probe, series.clone(), probe_interval);

        Self {
            series,
            scheduler,
            requester,
            auto_loop,
            window,
            status,
        }
    }

    pub fn series(&self) -> &SeriesHandle {
        &self.series
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    pub fn selected_target(&self) -> Option<String> {
        self.window.lock().unwrap().target.clone()
    }

    pub fn release_time(&self) -> Option<DateTime<Utc>> {
        self.window.lock().unwrap().release_time
    }

    pub fn is_probing(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn auto_active(&self) -> bool {
        self.auto_loop.is_active()
    }

    /// Switches monitoring to `target`: the series restarts empty and the
    /// probe cadence begins anew with an immediate first sample.
    pub fn select_target(&mut self, target: &str) {
        info!(%target, "target selected");
        self.window.lock().unwrap().target = Some(target.to_string());
        self.scheduler.start(target);
    }

    pub fn set_release_time(&mut self, release_time: Option<DateTime<Utc>>) {
        self.window.lock().unwrap().release_time = release_time;
    }

    /// Moves the release time by `minutes`, seeding from now when unset.
    pub fn adjust_release_time(&mut self, minutes: i64) {
        let mut window = self.window.lock().unwrap();
        let base = window.release_time.unwrap_or_else(Utc::now);
        window.release_time = Some(base + chrono::Duration::minutes(minutes));
    }

    /// Fires one advisor request now and activates the repeating loop.
    /// While the loop is active the manual trigger is disabled, so this is a
    /// no-op; the loop's own ticks keep the status fresh.
    pub fn request_optimal_time(&mut self) {
        if self.auto_loop.is_active() {
            return;
        }

        let requester = self.requester.clone();
        let window = Arc::clone(&self.window);
        let status = Arc::clone(&self.status);
        tokio::spawn(async move {
            request_and_report(&requester, &window, &status).await;
        });
        self.auto_loop.start();
    }

    /// User-facing stop: aborts the in-flight advisor call (posting the stop
    /// notice only when there was one) and halts the auto loop. Probing is
    /// untouched.
    pub fn stop_requests(&mut self) {
        if self.requester.cancel_in_flight() {
            self.status.set_message(STOPPED_BY_USER);
        }
        self.auto_loop.stop();
    }

    /// Deterministic teardown: both timers cleared, nothing ticks afterwards.
    pub fn shutdown(&mut self) {
        self.scheduler.stop();
        self.auto_loop.stop();
    }
}
