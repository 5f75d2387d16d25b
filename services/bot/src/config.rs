//! services/bot/src/config.rs
//!
//! Defines the bot's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use reminder_core::scheduler::DEFAULT_TICK_PERIOD;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use url::Url;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bot_token: String,
    pub dev_mode: bool,
    pub database_path: PathBuf,
    pub log_level: Level,
    pub tick_interval: Duration,
    pub telegram_api_url: Url,
    pub poll_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Credentials ---
        let bot_token = lookup("BOT_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("BOT_TOKEN".to_string()))?;

        // --- Environment and Storage ---
        let dev_mode = lookup("ENV").map(|env| env == "dev").unwrap_or(false);
        let database_path = lookup("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                if dev_mode {
                    PathBuf::from("reminders.db")
                } else {
                    PathBuf::from("/app/data/reminders.db")
                }
            });

        let default_level = if dev_mode { "DEBUG" } else { "INFO" };
        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| default_level.to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Scheduler and Transport Settings ---
        let tick_interval = Duration::from_secs(seconds(
            &lookup,
            "TICK_INTERVAL_SECS",
            DEFAULT_TICK_PERIOD.as_secs(),
        )?);
        let poll_timeout = Duration::from_secs(seconds(&lookup, "POLL_TIMEOUT_SECS", 60)?);
        let api_url_str =
            lookup("TELEGRAM_API_URL").unwrap_or_else(|| "https://api.telegram.org".to_string());
        let telegram_api_url = Url::parse(api_url_str.trim()).map_err(|e| {
            ConfigError::InvalidValue("TELEGRAM_API_URL".to_string(), e.to_string())
        })?;

        Ok(Self {
            bot_token,
            dev_mode,
            database_path,
            log_level,
            tick_interval,
            telegram_api_url,
            poll_timeout,
        })
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(0) | Err(_) => Err(ConfigError::InvalidValue(
                name.to_string(),
                format!("'{}' is not a positive number of seconds", raw),
            )),
            Ok(value) => Ok(value),
        },
    }
}
