mod advisor;
mod app;
mod config;
mod constants;
mod error;
mod probe;
mod remote;
mod series;
mod ui;
mod util;

use std::{sync::Arc, time::Duration};

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::app::DashboardController;
use crate::config::Config;
use crate::constants::PROBE_TIMEOUT_MS;
use crate::probe::HttpProbe;
use crate::remote::{fetch_location, ApiClient};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // The TUI owns stdout; logs go to stderr and are off unless RUST_LOG is
    // set (redirect stderr to a file when debugging).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(PROBE_TIMEOUT_MS))
        .build()?;

    let api = Arc::new(ApiClient::new(config.base_url.clone(), http.clone()));

    let sites = match api.fetch_sites().await {
        Ok(sites) => sites,
        Err(err) => {
            warn!(%err, "could not fetch the site list; starting with an empty sidebar");
            Vec::new()
        }
    };

    let location = match fetch_location(&http, &config.geo_url).await {
        Ok(info) => info.into_location(),
        Err(err) => {
            warn!(%err, "geolocation lookup failed");
            None
        }
    };

    let controller = DashboardController::new(
        Arc::new(HttpProbe::new(http)),
        api,
        Duration::from_millis(config.probe_interval_ms),
        Duration::from_millis(config.auto_interval_ms),
        config.release_time,
    );

    ui::run(controller, sites, location).await
}
