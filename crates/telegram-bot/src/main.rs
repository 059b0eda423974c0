mod config;
mod telegram;

use anyhow::{Context, Result};
use coingecko_client::CoinGeckoClient;
use price_tracker::{handle_command, Command, TrackingEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::BotConfig;
use telegram::{TelegramClient, Update};

/// Pause after a failed getUpdates call before polling again.
const UPDATE_RETRY_DELAY_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "telegram_bot=info,price_tracker=info,coingecko_client=info".into()
    });

    if json_logging {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        tracing::error!("PANIC: {info}");
    }));

    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {:#}", e);
            eprintln!("Error: Please make sure you have set up the BOT_TOKEN in your .env file");
            return Err(e);
        }
    };

    tracing::info!("Starting {} price tracker bot", config.asset_name);
    tracing::info!("  Asset: {} ({})", config.asset_name, config.asset_id);
    tracing::info!("  Check interval: {}s", config.price_check_interval_seconds);
    tracing::info!("  History window: {} samples", config.price_history_capacity);

    let source = Arc::new(
        CoinGeckoClient::with_base_url(config.asset_id.clone(), config.coingecko_base_url.clone())
            .context("Failed to build CoinGecko client")?,
    );
    let engine = Arc::new(TrackingEngine::new(source, config.engine_config()));

    let telegram = Arc::new(
        TelegramClient::new(
            &config.bot_token,
            &config.telegram_api_url,
            Duration::from_secs(config.telegram_poll_timeout_seconds),
        )
        .context("Failed to build Telegram client")?,
    );

    // Long polling is refused while a webhook is set; also skip updates queued while offline.
    if let Err(e) = telegram.delete_webhook(true).await {
        tracing::warn!("Failed to remove webhook: {}", e);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let poll_loop = Arc::clone(&engine).spawn(telegram.clone(), shutdown_rx.clone());
    let update_loop = tokio::spawn(run_update_loop(
        Arc::clone(&engine),
        Arc::clone(&telegram),
        shutdown_rx,
    ));

    println!("Bot is running. Press Ctrl+C to stop.");

    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT");
        }
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
    }

    shutdown_tx.send(true).ok();
    if let Err(e) = poll_loop.await {
        tracing::warn!("Price tracking loop ended abnormally: {}", e);
    }
    if let Err(e) = update_loop.await {
        tracing::warn!("Update loop ended abnormally: {}", e);
    }

    println!("\nBot stopped by user");
    tracing::info!("Bot shut down.");
    Ok(())
}

/// Receive chat updates and handle each command on its own task.
async fn run_update_loop(
    engine: Arc<TrackingEngine>,
    telegram: Arc<TelegramClient>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut offset = 0;

    loop {
        let updates = tokio::select! {
            result = telegram.get_updates(offset) => result,
            _ = shutdown.changed() => break,
        };

        match updates {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    dispatch_update(&engine, &telegram, update);
                }
            }
            Err(e) => {
                tracing::warn!("Failed to fetch updates: {}", e);
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(UPDATE_RETRY_DELAY_SECS)) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }
    }

    tracing::info!("Update loop stopped");
}

fn dispatch_update(engine: &Arc<TrackingEngine>, telegram: &Arc<TelegramClient>, update: Update) {
    let Some(message) = update.message else {
        return;
    };
    let Some(command) = message.text.as_deref().and_then(Command::parse) else {
        return;
    };

    let engine = Arc::clone(engine);
    let telegram = Arc::clone(telegram);
    tokio::spawn(async move {
        let user = message.sender();
        tracing::debug!("Handling {:?} for user {}", command, user);

        let reply = handle_command(&engine, user, &command).await;
        if let Err(e) = telegram
            .send_message(message.chat.id, &reply, Some(message.message_id))
            .await
        {
            tracing::error!("Reply to {} failed: {}", user, e);
        }
    });
}
