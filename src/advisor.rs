//! Optimal-entry-time workflow: a cancellable single-shot requester with an
//! at-most-one-in-flight guarantee, and the repeating loop that drives it.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::RequestError;
use crate::remote::{EntryTimeApi, EntryTimeRequest};

/// Inputs for one advisor request. `current_time` is not part of the window:
/// it is recomputed at send time.
#[derive(Debug, Default, Clone)]
pub struct RequestWindow {
    pub target: Option<String>,
    pub release_time: Option<DateTime<Utc>>,
}

/// The single visible status message plus the loading flag that spans exactly
/// one request/response cycle. The most recent outcome wins; there is no
/// message history.
#[derive(Default)]
pub struct StatusBoard {
    message: Mutex<String>,
    loading: AtomicBool,
}

impl StatusBoard {
    pub fn set_message(&self, message: impl Into<String>) {
        *self.message.lock().unwrap() = message.into();
    }

    pub fn message(&self) -> String {
        self.message.lock().unwrap().clone()
    }

    pub fn set_loading(&self, loading: bool) {
        self.loading.store(loading, Ordering::SeqCst);
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }
}

struct InFlight {
    id: u64,
    token: CancellationToken,
}

/// Issues one cancellable advisor call at a time. Dispatching a new request
/// first cancels whichever call is still in flight, so the newest request
/// always wins regardless of whether it came from the loop or a manual
/// trigger.
#[derive(Clone)]
pub struct OptimalTimeRequester {
    api: Arc<dyn EntryTimeApi>,
    in_flight: Arc<Mutex<Option<InFlight>>>,
    next_id: Arc<AtomicU64>,
}

impl OptimalTimeRequester {
    pub fn new(api: Arc<dyn EntryTimeApi>) -> Self {
        Self {
            api,
            in_flight: Arc::new(Mutex::new(None)),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Requests the optimal entry time for `target` relative to
    /// `release_time`. Returns the ready-to-display success text, or the
    /// error naming what went wrong; [`RequestError::Cancelled`] means this
    /// call was superseded or aborted and nothing should be shown.
    pub async fn request(
        &self,
        target: Option<&str>,
        release_time: Option<DateTime<Utc>>,
    ) -> Result<String, RequestError> {
        let (target, release_time) = match (target, release_time) {
            (Some(target), Some(release_time)) => (target, release_time),
            _ => return Err(RequestError::Validation),
        };

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();
        {
            let mut slot = self.in_flight.lock().unwrap();
            if let Some(previous) = slot.replace(InFlight {
                id,
                token: token.clone(),
            }) {
                previous.token.cancel();
            }
        }

        let request = EntryTimeRequest {
            site_domain: target.to_string(),
            release_time: release_time.to_rfc3339_opts(SecondsFormat::Millis, true),
            current_time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };

        let outcome = tokio::select! {
            _ = token.cancelled() => Err(RequestError::Cancelled),
            result = self.api.best_entry_time(&request) => result,
        };

        // Release the slot only if it still belongs to this call; a newer
        // request may already own it.
        {
            let mut slot = self.in_flight.lock().unwrap();
            if slot.as_ref().map(|current| current.id) == Some(id) {
                *slot = None;
            }
        }

        outcome.and_then(|raw| format_optimal_time(&raw))
    }

    /// Aborts the in-flight call, if any. Returns whether one was aborted.
    pub fn cancel_in_flight(&self) -> bool {
        let mut slot = self.in_flight.lock().unwrap();
        match slot.take() {
            Some(in_flight) => {
                in_flight.token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Formats the advisor's timestamp as zero-padded 24-hour HH:MM:SS, in the
/// offset the timestamp itself carries so rendering does not depend on the
/// host timezone.
fn format_optimal_time(raw: &str) -> Result<String, RequestError> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(format!(
            "Optimal entry time: {}",
            timestamp.format("%H:%M:%S")
        ));
    }
    raw.parse::<NaiveDateTime>()
        .map(|timestamp| format!("Optimal entry time: {}", timestamp.format("%H:%M:%S")))
        .map_err(|_| RequestError::UnknownBody)
}

/// One full request cycle against the shared status board: validate, flag
/// loading, run the request, publish the outcome. Cancellation publishes
/// nothing; the flag clears on every path.
pub async fn request_and_report(
    requester: &OptimalTimeRequester,
    window: &Mutex<RequestWindow>,
    status: &StatusBoard,
) {
    let window = window.lock().unwrap().clone();
    if window.target.is_none() || window.release_time.is_none() {
        status.set_message(RequestError::Validation.to_string());
        return;
    }

    status.set_loading(true);
    let outcome = requester
        .request(window.target.as_deref(), window.release_time)
        .await;
    match outcome {
        Ok(text) => status.set_message(text),
        Err(RequestError::Cancelled) => debug!("optimal time request superseded or aborted"),
        Err(err) => status.set_message(err.to_string()),
    }
    status.set_loading(false);
}

/// Repeating driver for [`OptimalTimeRequester`], independent of the probe
/// cadence. Start is idempotent; stop clears the timer so no tick fires
/// afterwards. A tick already dispatched is sequenced by the requester's
/// at-most-one-in-flight rule, not by this loop.
pub struct AutoRequestLoop {
    requester: OptimalTimeRequester,
    window: Arc<Mutex<RequestWindow>>,
    status: Arc<StatusBoard>,
    interval: Duration,
    cancel: Option<CancellationToken>,
}

impl AutoRequestLoop {
    pub fn new(
        requester: OptimalTimeRequester,
        window: Arc<Mutex<RequestWindow>>,
        status: Arc<StatusBoard>,
        interval: Duration,
    ) -> Self {
        Self {
            requester,
            window,
            status,
            interval,
            cancel: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    pub fn start(&mut self) {
        if self.cancel.is_some() {
            return;
        }

        let token = CancellationToken::new();
        self.cancel = Some(token.clone());

        let requester = self.requester.clone();
        let window = Arc::clone(&self.window);
        let status = Arc::clone(&self.status);
        let period = self.interval;

        debug!(?period, "auto request loop started");
        tokio::spawn(async move {
            // First tick lands one full period out; the caller already fires
            // an immediate manual request alongside starting the loop.
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let requester = requester.clone();
                        let window = Arc::clone(&window);
                        let status = Arc::clone(&status);
                        tokio::spawn(async move {
                            request_and_report(&requester, &window, &status).await;
                        });
                    }
                }
            }
            debug!("auto request loop stopped");
        });
    }

    pub fn stop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }
}

impl Drop for AutoRequestLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct MockApi {
        calls: AtomicUsize,
        delay: Duration,
        responses: Mutex<Vec<Result<String, RequestError>>>,
    }

    impl MockApi {
        fn new(delay: Duration, responses: Vec<Result<String, RequestError>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                responses: Mutex::new(responses),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl EntryTimeApi for MockApi {
        async fn best_entry_time(
            &self,
            _request: &EntryTimeRequest,
        ) -> Result<String, RequestError> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.responses
                .lock()
                .unwrap()
                .get(index)
                .cloned()
                .unwrap_or_else(|| Ok("2025-06-01T10:15:30Z".to_string()))
        }
    }

    fn window_for(target: &str) -> Arc<Mutex<RequestWindow>> {
        Arc::new(Mutex::new(RequestWindow {
            target: Some(target.to_string()),
            release_time: Some(Utc::now()),
        }))
    }

    #[tokio::test]
    async fn missing_release_time_never_contacts_the_remote() {
        let api = MockApi::new(Duration::ZERO, vec![]);
        let requester = OptimalTimeRequester::new(Arc::clone(&api) as Arc<dyn EntryTimeApi>);

        let outcome = requester.request(Some("example.com"), None).await;
        assert_eq!(outcome, Err(RequestError::Validation));
        assert_eq!(
            outcome.unwrap_err().to_string(),
            "Please select a site and choose a release time."
        );
        assert_eq!(api.call_count(), 0);

        let outcome = requester.request(None, Some(Utc::now())).await;
        assert_eq!(outcome, Err(RequestError::Validation));
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn success_formats_24_hour_time() {
        let api = MockApi::new(Duration::ZERO, vec![Ok("2025-06-01T10:15:30Z".to_string())]);
        let requester = OptimalTimeRequester::new(api);

        let outcome = requester
            .request(Some("example.com"), Some(Utc::now()))
            .await;
        assert_eq!(outcome, Ok("Optimal entry time: 10:15:30".to_string()));
    }

    #[test]
    fn formats_zero_padded_and_naive_timestamps() {
        assert_eq!(
            format_optimal_time("2025-06-01T05:04:03Z").unwrap(),
            "Optimal entry time: 05:04:03"
        );
        assert_eq!(
            format_optimal_time("2025-06-01T22:00:00").unwrap(),
            "Optimal entry time: 22:00:00"
        );
        assert_eq!(
            format_optimal_time("not a timestamp"),
            Err(RequestError::UnknownBody)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn newer_request_cancels_the_one_in_flight() {
        let api = MockApi::new(
            Duration::from_secs(5),
            vec![
                Ok("2025-01-01T01:01:01Z".to_string()),
                Ok("2025-01-01T02:02:02Z".to_string()),
            ],
        );
        let requester = OptimalTimeRequester::new(Arc::clone(&api) as Arc<dyn EntryTimeApi>);
        let window = window_for("example.com");
        let status = Arc::new(StatusBoard::default());

        let first = {
            let requester = requester.clone();
            let window = Arc::clone(&window);
            let status = Arc::clone(&status);
            tokio::spawn(async move {
                request_and_report(&requester, &window, &status).await;
            })
        };
        // Let the first call reach its suspension point before superseding it.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(status.is_loading());

        request_and_report(&requester, &window, &status).await;
        first.await.unwrap();

        assert_eq!(api.call_count(), 2);
        assert_eq!(status.message(), "Optimal entry time: 02:02:02");
        assert!(!status.is_loading());
    }

    #[tokio::test]
    async fn remote_error_text_reaches_the_status_board() {
        let api = MockApi::new(
            Duration::ZERO,
            vec![Err(RequestError::Remote("site not found".to_string()))],
        );
        let requester = OptimalTimeRequester::new(api);
        let window = window_for("example.com");
        let status = Arc::new(StatusBoard::default());

        request_and_report(&requester, &window, &status).await;
        assert_eq!(status.message(), "site not found");
        assert!(!status.is_loading());
    }

    #[tokio::test]
    async fn validation_message_is_reported_without_loading() {
        let api = MockApi::new(Duration::ZERO, vec![]);
        let requester = OptimalTimeRequester::new(Arc::clone(&api) as Arc<dyn EntryTimeApi>);
        let window = Arc::new(Mutex::new(RequestWindow::default()));
        let status = Arc::new(StatusBoard::default());

        request_and_report(&requester, &window, &status).await;
        assert_eq!(
            status.message(),
            "Please select a site and choose a release time."
        );
        assert!(!status.is_loading());
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_cancel_silences_the_outcome_and_clears_loading() {
        let api = MockApi::new(Duration::from_secs(5), vec![]);
        let requester = OptimalTimeRequester::new(api);
        let window = window_for("example.com");
        let status = Arc::new(StatusBoard::default());
        status.set_message("earlier message");

        let task = {
            let requester = requester.clone();
            let window = Arc::clone(&window);
            let status = Arc::clone(&status);
            tokio::spawn(async move {
                request_and_report(&requester, &window, &status).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(requester.cancel_in_flight());
        task.await.unwrap();

        // A cancelled call is a silent no-op, not a failure.
        assert_eq!(status.message(), "earlier message");
        assert!(!status.is_loading());
        // Nothing left to cancel.
        assert!(!requester.cancel_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn auto_loop_fires_once_per_interval_and_start_is_idempotent() {
        let api = MockApi::new(Duration::ZERO, vec![]);
        let requester = OptimalTimeRequester::new(Arc::clone(&api) as Arc<dyn EntryTimeApi>);
        let window = window_for("example.com");
        let status = Arc::new(StatusBoard::default());
        let mut auto = AutoRequestLoop::new(
            requester,
            window,
            Arc::clone(&status),
            Duration::from_secs(10),
        );

        auto.start();
        auto.start();
        assert!(auto.is_active());

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(api.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn no_request_fires_after_the_loop_stops() {
        let api = MockApi::new(Duration::ZERO, vec![]);
        let requester = OptimalTimeRequester::new(Arc::clone(&api) as Arc<dyn EntryTimeApi>);
        let window = window_for("example.com");
        let status = Arc::new(StatusBoard::default());
        let mut auto = AutoRequestLoop::new(
            requester,
            window,
            Arc::clone(&status),
            Duration::from_secs(10),
        );

        auto.start();
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(api.call_count(), 1);

        auto.stop();
        assert!(!auto.is_active());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(api.call_count(), 1);
    }
}
