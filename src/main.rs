//! ThermoWatch - LoRaWAN sensor fleet monitoring service.
//!
//! Polls a latest-readings endpoint for temperature/humidity sensors,
//! computes per-device status and fleet-wide stats, and serves the result
//! over a small JSON API.

mod config;
mod fetch;
mod scheduler;
mod status;
mod web;

use config::ServiceConfig;
use fetch::ReadingsClient;
use scheduler::{RefreshScheduler, StatusCache};
use web::Server;

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("thermowatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServiceConfig::load();
    tracing::info!("Starting ThermoWatch on port {}...", cfg.http_port);
    tracing::info!(
        "Polling {} every {}s",
        cfg.readings_url,
        cfg.refresh_interval_secs
    );

    // Upstream client, bounded to the configured devices
    let client = ReadingsClient::new(
        &cfg.readings_url,
        Duration::from_secs(cfg.fetch_timeout_secs),
        &cfg.device_euis,
    )?;

    // Cache and scheduler
    let cache = Arc::new(StatusCache::new());
    let scheduler = Arc::new(RefreshScheduler::new(
        Arc::new(client),
        cache.clone(),
        &cfg,
    ));
    scheduler.clone().start(cfg.refresh_interval());

    // Start web server
    let server = Server::new(cfg, cache, scheduler);
    server.start().await?;

    Ok(())
}
