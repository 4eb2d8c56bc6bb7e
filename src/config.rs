use chrono::{DateTime, Utc};
use clap::Parser;

use crate::constants::{AUTO_REQUEST_INTERVAL_MS, PROBE_INTERVAL_MS};

/// Terminal dashboard for site latency monitoring and entry-time advice.
#[derive(Debug, Clone, Parser)]
#[command(name = "site_monitor", version, about)]
pub struct Config {
    /// Base URL of the monitoring API.
    #[arg(long, env = "SITE_MONITOR_BASE_URL", default_value = "http://134.195.158.7:8000")]
    pub base_url: String,

    /// Latency probe cadence in milliseconds.
    #[arg(long, env = "SITE_MONITOR_PROBE_INTERVAL_MS", default_value_t = PROBE_INTERVAL_MS)]
    pub probe_interval_ms: u64,

    /// Auto-request cadence in milliseconds. Set to the probe cadence to
    /// couple the two loops.
    #[arg(long, env = "SITE_MONITOR_AUTO_INTERVAL_MS", default_value_t = AUTO_REQUEST_INTERVAL_MS)]
    pub auto_interval_ms: u64,

    /// Release time as RFC 3339; also adjustable from the dashboard.
    #[arg(long)]
    pub release_time: Option<DateTime<Utc>>,

    /// Geolocation endpoint.
    #[arg(long, env = "SITE_MONITOR_GEO_URL", default_value = "http://ip-api.com/json/")]
    pub geo_url: String,
}
