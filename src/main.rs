mod access;
mod command;
mod config;
mod gateway;
mod memory;
mod platform;
mod reply;
mod router;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::access::{Authority, BootstrapList, JsonFileStore};
use crate::config::Config;
use crate::gateway::{Gateway, HttpServices};
use crate::memory::MessageStore;
use crate::router::Router;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,relaybot=debug".into()),
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
    info!("  Database: {}", config.storage.database_path.display());
    info!("  Art model: {}", config.art.model);
    info!("  Research model: {}", config.research.model);
    info!("  Summarizer model: {}", config.summarizer.model);
    info!("  Remote timeout: {}s", config.gateway.timeout_secs);

    let store = MessageStore::open(&config.storage.database_path)
        .context("Failed to open message store")?;

    let bootstrap = BootstrapList::load(&config.access.bootstrap_path)
        .context("Failed to read bootstrap list")?;
    let allowlist = JsonFileStore::new(&config.access.allowlist_path);
    info!("  Allow-list: {}", allowlist.path().display());
    let authority = Arc::new(
        Authority::new(Box::new(allowlist), bootstrap).context("Failed to load allow-list")?,
    );

    let services = HttpServices::new(&config)?;
    let gateway = Gateway::new(
        Arc::new(services),
        store.clone(),
        config.gateway.max_inline_chars,
        config.summarizer.max_transcript_chars,
    );

    let router = Arc::new(Router::new(
        store,
        authority,
        gateway,
        config.summarizer.default_hours,
    ));

    // Run the Telegram bot
    info!("Bot is starting...");
    let bot = teloxide::Bot::new(&config.telegram.bot_token);
    platform::telegram::run(router, bot).await?;

    Ok(())
}
