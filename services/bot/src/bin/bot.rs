//! services/bot/src/bin/bot.rs

use bot_lib::{
    adapters::{SqliteReminderStore, SystemClock, TelegramGateway},
    bot::{handle_event, AppState},
    config::Config,
    error::BotError,
};
use futures::StreamExt;
use reminder_core::{InMemoryEditSessions, PhraseParser, Scheduler};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), BotError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!(dev_mode = config.dev_mode, "Configuration loaded. Starting bot...");

    // --- 2. Open the Database & Run Migrations ---
    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    info!(path = %config.database_path.display(), "Opening database...");
    let store = Arc::new(SqliteReminderStore::connect(&config.database_path).await?);
    info!("Running database migrations...");
    store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Adapters & Shared State ---
    let gateway = Arc::new(TelegramGateway::new(
        config.telegram_api_url.clone(),
        &config.bot_token,
        config.poll_timeout,
    )?);
    let clock = Arc::new(SystemClock);
    let state = AppState {
        store: store.clone(),
        gateway: gateway.clone(),
        sessions: Arc::new(InMemoryEditSessions::new()),
        parser: Arc::new(PhraseParser::new()),
        clock: clock.clone(),
    };

    // --- 4. Start the Scheduler ---
    let shutdown = CancellationToken::new();
    let scheduler = Scheduler::new(store, gateway.clone(), clock, config.tick_interval);
    let scheduler_task = tokio::spawn(scheduler.run(shutdown.clone()));

    // --- 5. Consume Updates Until Ctrl-C ---
    info!("Listening for Telegram updates...");
    let updates = gateway.updates();
    let ctrl_c = tokio::signal::ctrl_c();
    futures::pin_mut!(updates, ctrl_c);
    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for the shutdown signal");
                }
                info!("Shutdown requested.");
                break;
            }
            event = updates.next() => {
                let Some(event) = event else { break };
                let state = state.clone();
                tokio::spawn(async move {
                    handle_event(&state, event).await;
                });
            }
        }
    }

    shutdown.cancel();
    scheduler_task
        .await
        .map_err(|e| BotError::Internal(format!("Scheduler task failed: {}", e)))?;
    info!("Bot stopped.");
    Ok(())
}
