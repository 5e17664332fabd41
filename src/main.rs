mod bigchat;
mod clock;
mod config;
mod dispatcher;
mod ourapi;
mod poller;
mod shutdown;
mod translator;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bigchat::BigChatClient;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::ourapi::OurApiClient;
use crate::poller::Poller;
use crate::shutdown::forward_shutdown;
use crate::translator::EventTranslator;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bigchat_sync=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  BigChat: {}", config.bigchat.base_url);
    info!("  OurAPI: {}", config.ourapi.base_url);
    info!("  Poll interval: {}s", config.sync.poll_interval_secs);
    info!("  Skip duplicate START: {}", config.sync.skip_duplicate_start);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let timeout = config.sync.request_timeout();

    let source = BigChatClient::new(&config.bigchat, timeout)?;
    let destination = OurApiClient::new(&config.ourapi, timeout)?;
    let translator =
        EventTranslator::new(destination, clock.clone(), config.sync.skip_duplicate_start);
    let mut poller = Poller::new(source, Dispatcher::new(translator), clock, &config.sync)?;

    // Stop between cycles on Ctrl-C
    let shutdown_rx = forward_shutdown(tokio::signal::ctrl_c());

    info!("Starting BigChat -> OurAPI sync loop...");
    poller.run(shutdown_rx).await;

    Ok(())
}
