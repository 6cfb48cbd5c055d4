//! Hotel Wizard - Telegram hotel search bot
//!
//! Guides each chat user through a step-by-step search wizard driven by a
//! pure state machine, queries the hotel provider, and pages through results.

mod config;
mod db;
mod provider;
mod runtime;
mod session;
mod state_machine;
mod telegram;

use config::BotConfig;
use db::Database;
use provider::{LoggingProvider, RapidApiProvider};
use runtime::SessionManager;
use std::sync::Arc;
use telegram::{command_menu, TelegramClient, TelegramTransport, UpdatePoller};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hotel_wizard=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = BotConfig::from_env()?;

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    let provider = LoggingProvider::new(Arc::new(RapidApiProvider::new(config.rapid_api())?));

    let client = Arc::new(TelegramClient::new(&config.telegram_token, config.poll_timeout)?);
    if let Err(e) = client.set_my_commands(&command_menu()).await {
        tracing::warn!(error = %e, "Failed to register bot commands");
    }
    let transport = TelegramTransport::new(Arc::clone(&client), config.placeholder_photo.clone());

    let manager = SessionManager::new(transport, provider, db, config.runtime_settings());
    let poller = UpdatePoller::new(client, config.poll_timeout);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
        }
        signal.cancel();
    });

    tracing::info!(
        result_counts = ?config.result_counts,
        photo_counts = ?config.photo_counts,
        "Hotel wizard started"
    );
    poller.run(&manager, shutdown).await;

    tracing::info!(active_sessions = manager.active_workers(), "Hotel wizard stopped");
    Ok(())
}
