// Category HTTP Server: Scrape Relay
//
// Serves POST /scrape over one shared headless Chromium instance.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use scrape_relay::{ChromiumEngine, ServiceArgs, logging, run_server};

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before clap reads the environment
    let dotenv = dotenvy::dotenv();

    let config = ServiceArgs::parse()
        .into_config()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;
    logging::init_tracing(config.log_filter());

    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }
    info!(
        concurrency = config.crawl_concurrency(),
        headless = config.headless(),
        stealth = config.enable_stealth(),
        "Starting scrape relay"
    );

    let engine = ChromiumEngine::launch(config.engine_options())
        .await
        .context("Failed to launch browser engine")?;

    run_server(config, Arc::new(engine)).await
}
