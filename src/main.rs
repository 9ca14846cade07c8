//! Bounty Board Server
//!
//! Winner assignment and prize distribution for the bounty marketplace

use std::sync::Arc;

use bounty_board::notify::{Notifier, NullNotifier, WebhookNotifier};
use bounty_board::server::AppState;
use bounty_board::{Config, HttpRateGateway, MarketStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Bounty Board Server");

    let config = Config::load()?;

    let store = Arc::new(MarketStore::new(&config.database.path)?);
    info!("SQLite storage initialized at {}", config.database.path);

    let rates = Arc::new(HttpRateGateway::new(
        config.exchange.base_url.clone(),
        config.exchange.timeout_secs,
    ));

    let notifier: Arc<dyn Notifier> = if config.notifications.webhook_url.is_empty() {
        info!("Winner notifications disabled (no webhook configured)");
        Arc::new(NullNotifier)
    } else {
        info!(
            "Winner notifications via webhook {}",
            config.notifications.webhook_url
        );
        Arc::new(WebhookNotifier::new(config.notifications.webhook_url.clone()))
    };

    let state = Arc::new(AppState {
        store,
        rates,
        notifier,
        started_at: std::time::Instant::now(),
    });

    bounty_board::server::run_server(&config.host(), config.port(), state).await?;

    Ok(())
}
