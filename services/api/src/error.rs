//! services/api/src/error.rs
//!
//! Startup failures of the `api` binary. Request handlers never return these;
//! they answer with a `HandlerError` instead.

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pool connection or migration failure.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The geocoder's HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Binding or serving the listener.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Startup settings that parse but cannot be used, such as a bad CORS origin.
    #[error("Startup failed: {0}")]
    Internal(String),
}
