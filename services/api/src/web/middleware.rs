//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use kova_core::ports::AuthToken;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::web::state::AppState;

pub const SESSION_COOKIE: &str = "session";

/// The signed-in caller, placed in request extensions by `require_auth`.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub token: AuthToken,
}

/// Reads one cookie from the request headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            let (key, value) = c.trim().split_once('=')?;
            (key == name && !value.is_empty()).then_some(value)
        })
}

/// Middleware that validates the auth session cookie and resolves the caller.
///
/// If valid, inserts a `CurrentUser` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = cookie_value(req.headers(), SESSION_COOKIE)
        .map(|v| AuthToken(v.to_string()))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let identity = state
        .identity
        .current_session(&token)
        .await
        .map_err(|e| {
            error!("Failed to validate auth session: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(CurrentUser {
        id: identity.id,
        email: identity.email,
        token,
    });

    Ok(next.run(req).await)
}
