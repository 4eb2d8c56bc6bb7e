use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::{interval, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::series::{MeasurementPoint, SeriesHandle};

/// One latency measurement against a target. Implementations never fail:
/// a refused or errored fetch is still a timed completion.
#[async_trait]
pub trait LatencyProbe: Send + Sync {
    async fn probe(&self, target: &str) -> f64;
}

/// Rewrites a stored site identifier into a probeable URL. Identifiers may
/// encode dots as underscores, and most carry no scheme.
pub fn normalize_target(target: &str) -> String {
    let formatted = if target.contains('_') {
        target.replace('_', ".")
    } else {
        target.to_string()
    };
    let lower = formatted.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        formatted
    } else {
        format!("https://{formatted}")
    }
}

/// Measures round-trip latency with a single best-effort GET. There is no
/// cross-origin timing API to lean on, so elapsed wall-clock time until the
/// request resolves (either way) is the sample.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    /// The client should carry a request timeout; an unreachable host then
    /// still produces a (large) timed sample instead of hanging the tick.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LatencyProbe for HttpProbe {
    async fn probe(&self, target: &str) -> f64 {
        let url = normalize_target(target);
        let start = Instant::now();
        // Success and failure both count as "done"; no retry.
        let _ = self.client.get(&url).send().await;
        start.elapsed().as_secs_f64()
    }
}

/// Drives the repeating latency probe for the currently selected target.
///
/// `start` fires one probe immediately, then one per interval; restarting for
/// a new target first stops the old timer and clears the series so no stale
/// points carry over. `stop` is idempotent and only halts future ticks: a
/// probe already dispatched runs to completion and its point still lands.
pub struct ProbeScheduler {
    probe: Arc<dyn LatencyProbe>,
    series: SeriesHandle,
    interval: Duration,
    cancel: Option<CancellationToken>,
}

impl ProbeScheduler {
    pub fn new(probe: Arc<dyn LatencyProbe>, series: SeriesHandle, interval: Duration) -> Self {
        Self {
            probe,
            series,
            interval,
            cancel: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.cancel.is_some()
    }

    pub fn start(&mut self, target: &str) {
        self.stop();
        self.series.reset();

        let token = CancellationToken::new();
        self.cancel = Some(token.clone());

        let probe = Arc::clone(&self.probe);
        let series = self.series.clone();
        let target = target.to_string();
        let period = self.interval;

        debug!(%target, ?period, "probe scheduler started");
        tokio::spawn(async move {
            // The first tick of `interval` completes immediately, which gives
            // the chart its first point without waiting a full period.
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let probe = Arc::clone(&probe);
                        let series = series.clone();
                        let target = target.clone();
                        // Each tick measures independently; a slow probe must
                        // not delay the cadence. Completions append in arrival
                        // order, which may differ from dispatch order.
                        tokio::spawn(async move {
                            let seconds = probe.probe(&target).await;
                            series.append(MeasurementPoint::now(seconds));
                        });
                    }
                }
            }
            debug!("probe scheduler stopped");
        });
    }

    pub fn stop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }
}

impl Drop for ProbeScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
