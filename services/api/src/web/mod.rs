pub mod auth;
pub mod middleware;
pub mod registration;
pub mod rest;
pub mod room;
pub mod state;

#[cfg(test)]
mod testing;

use axum::http::StatusCode;
use kova_core::ports::PortError;
use tracing::error;

pub use middleware::{require_auth, CurrentUser};

/// Handler failures go back to the browser as a status and a message.
pub type HandlerError = (StatusCode, String);

/// Maps a port failure from a blocking user flow onto a response.
pub(crate) fn port_failure(context: &str, e: PortError) -> HandlerError {
    error!("{}: {:?}", context, e);
    let status = match e {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Conflict(_) => StatusCode::CONFLICT,
        PortError::Unauthorized => StatusCode::UNAUTHORIZED,
        PortError::PermissionDenied => StatusCode::FORBIDDEN,
        PortError::Network(_) => StatusCode::BAD_GATEWAY,
        PortError::Unsupported | PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, context.to_string())
}
