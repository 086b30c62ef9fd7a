//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
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

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub suggest_model: String,
    pub summary_model: String,
    pub geocoder_url: String,
    pub screen_capture_enabled: bool,
    pub cors_origin: String,
    /// Starting length of the in-call countdown.
    pub session_length: Duration,
    /// Upper bound the countdown can be extended to.
    pub session_max_length: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Server and Database ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            var("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Generation ---
        let openai_api_key = var("OPENAI_API_KEY").filter(|k| !k.trim().is_empty());
        let suggest_model = var("SUGGEST_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let summary_model = var("SUMMARY_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());

        // --- Lookups & Platform ---
        let geocoder_url = var("GEOCODER_URL")
            .unwrap_or_else(|| "https://nominatim.openstreetmap.org".to_string())
            .trim_end_matches('/')
            .to_string();

        let screen_capture_enabled = match var("SCREEN_CAPTURE_ENABLED") {
            None => true,
            Some(raw) => parse_flag(&raw).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "SCREEN_CAPTURE_ENABLED".to_string(),
                    format!("'{}' is not a boolean", raw),
                )
            })?,
        };

        let cors_origin = var("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());

        // --- Call Countdown ---
        let session_length = parse_minutes(&var, "SESSION_MINUTES", 30)?;
        let session_max_length = parse_minutes(&var, "SESSION_MAX_MINUTES", 60)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            suggest_model,
            summary_model,
            geocoder_url,
            screen_capture_enabled,
            cors_origin,
            session_length,
            session_max_length: session_max_length.max(session_length),
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_minutes(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let minutes = match var(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(minutes) if minutes > 0 => minutes,
            _ => {
                return Err(ConfigError::InvalidValue(
                    key.to_string(),
                    format!("'{}' is not a positive number of minutes", raw),
                ))
            }
        },
    };
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| {
            ConfigError::InvalidValue(key.to_string(), format!("{} minutes is too long", minutes))
        })
}
