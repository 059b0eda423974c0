use anyhow::{bail, Context, Result};
use std::env;
use std::time::Duration;

use coingecko_client::DEFAULT_BASE_URL as COINGECKO_BASE_URL;
use price_tracker::history::MAX_CAPACITY;
use price_tracker::EngineConfig;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct BotConfig {
    // Telegram
    pub bot_token: String,
    pub telegram_api_url: String,
    pub telegram_poll_timeout_seconds: u64,

    // Price feed
    pub coingecko_base_url: String,
    pub asset_id: String,
    pub asset_name: String,

    // Tracking
    pub price_check_interval_seconds: u64,
    pub price_history_capacity: usize,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup (the process environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            bot_token: var("BOT_TOKEN").context("BOT_TOKEN not set")?,
            telegram_api_url: var("TELEGRAM_API_URL")
                .unwrap_or_else(|| TELEGRAM_API_URL.to_string()),
            telegram_poll_timeout_seconds: var("TELEGRAM_POLL_TIMEOUT")
                .unwrap_or_else(|| "10".to_string())
                .parse()
                .context("TELEGRAM_POLL_TIMEOUT must be a whole number of seconds")?,

            coingecko_base_url: var("COINGECKO_BASE_URL")
                .unwrap_or_else(|| COINGECKO_BASE_URL.to_string()),
            asset_id: var("COINGECKO_ASSET_ID").unwrap_or_else(|| "world-coin".to_string()),
            asset_name: var("COINGECKO_ASSET_NAME").unwrap_or_else(|| "Worldcoin".to_string()),

            price_check_interval_seconds: var("PRICE_CHECK_INTERVAL")
                .unwrap_or_else(|| "60".to_string())
                .parse()
                .context("PRICE_CHECK_INTERVAL must be a whole number of seconds")?,
            price_history_capacity: var("PRICE_HISTORY_CAPACITY")
                .unwrap_or_else(|| "24".to_string())
                .parse()
                .context("PRICE_HISTORY_CAPACITY must be a positive integer")?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.price_check_interval_seconds == 0 {
            bail!("PRICE_CHECK_INTERVAL must be greater than 0");
        }
        if self.price_history_capacity == 0 || self.price_history_capacity > MAX_CAPACITY {
            bail!("PRICE_HISTORY_CAPACITY must be between 1 and {}", MAX_CAPACITY);
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            interval: Duration::from_secs(self.price_check_interval_seconds),
            history_capacity: self.price_history_capacity,
            asset_name: self.asset_name.clone(),
        }
    }
}
