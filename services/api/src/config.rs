//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where and as whom the remote document store is reached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteConfig {
    pub base_url: String,
    pub user_id: String,
    pub api_token: Option<String>,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub cors_origin: String,
    /// `None` disables sync entirely.
    pub remote: Option<RemoteConfig>,
    pub session_flush_interval: Duration,
    pub session_check_interval: Duration,
    pub auto_sync_interval: Duration,
    pub words_per_page: usize,
}

fn parse_or<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn positive(name: &str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(value)
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

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin = std::env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        // --- Load the Remote Store Settings (optional) ---
        let remote = match std::env::var("REMOTE_STORE_URL") {
            Ok(url) if !url.trim().is_empty() => Some(RemoteConfig {
                base_url: url.trim().trim_end_matches('/').to_string(),
                user_id: std::env::var("REMOTE_USER_ID").unwrap_or_else(|_| "default".to_string()),
                api_token: std::env::var("REMOTE_API_TOKEN").ok(),
            }),
            _ => None,
        };

        // --- Load Timer and Extraction Settings ---
        let flush_minutes = positive(
            "SESSION_FLUSH_MINUTES",
            parse_or("SESSION_FLUSH_MINUTES", 10)?,
        )?;
        let check_seconds = positive(
            "SESSION_CHECK_SECONDS",
            parse_or("SESSION_CHECK_SECONDS", 60)?,
        )?;
        let sync_minutes = positive("AUTO_SYNC_MINUTES", parse_or("AUTO_SYNC_MINUTES", 15)?)?;
        let words_per_page = positive("WORDS_PER_PAGE", parse_or("WORDS_PER_PAGE", 300)?)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            remote,
            session_flush_interval: Duration::from_secs(flush_minutes * 60),
            session_check_interval: Duration::from_secs(check_seconds),
            auto_sync_interval: Duration::from_secs(sync_minutes * 60),
            words_per_page: words_per_page as usize,
        })
    }
}
