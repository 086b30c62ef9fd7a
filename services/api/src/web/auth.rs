//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for login, logout and session restore. Accounts are
//! created by the registration wizard in `web::registration`.

use crate::web::middleware::{cookie_value, SESSION_COOKIE};
use crate::web::state::AppState;
use crate::web::HandlerError;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Duration;
use kova_core::auth::{AuthError, Authenticated};
use kova_core::domain::Profile;
use kova_core::ports::AuthToken;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::adapters::identity::SESSION_TTL_DAYS;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
    #[schema(value_type = Object)]
    pub profile: Profile,
}

impl From<Authenticated> for AuthResponse {
    fn from(auth: Authenticated) -> Self {
        Self {
            user_id: auth.profile.id,
            email: auth.profile.email.clone(),
            profile: auth.profile,
        }
    }
}

/// `Set-Cookie` value for a fresh sign-in.
pub(crate) fn session_cookie(token: &AuthToken) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        token.0,
        Duration::days(SESSION_TTL_DAYS).num_seconds()
    )
}

fn cleared_session_cookie() -> String {
    format!("{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE)
}

pub(crate) fn auth_failure(e: AuthError) -> HandlerError {
    let status = match &e {
        AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::EmailTaken => StatusCode::CONFLICT,
        AuthError::WeakPassword => StatusCode::BAD_REQUEST,
        AuthError::ProfileMissing => StatusCode::NOT_FOUND,
        AuthError::Service(inner) => {
            error!("Auth service failure: {:?}", inner);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong. Please try again.".to_string(),
            );
        }
    };
    (status, e.to_string())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 404, description = "Account has no profile"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let auth = state
        .auth_flow()
        .login(&req.email, &req.password)
        .await
        .map_err(auth_failure)?;

    let cookie = session_cookie(&auth.token);
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse::from(auth)),
    ))
}

/// GET /auth/session - Restore the signed-in user from the session cookie
#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "Session is valid", body = AuthResponse),
        (status = 401, description = "Not signed in or session expired")
    )
)]
pub async fn session_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AuthResponse>, HandlerError> {
    let not_signed_in = || (StatusCode::UNAUTHORIZED, "Not signed in".to_string());
    let token = cookie_value(&headers, SESSION_COOKIE)
        .map(|v| AuthToken(v.to_string()))
        .ok_or_else(not_signed_in)?;

    match state.auth_flow().restore(&token).await.map_err(auth_failure)? {
        Some(auth) => Ok(Json(AuthResponse::from(auth))),
        None => Err(not_signed_in()),
    }
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HandlerError> {
    let token = cookie_value(&headers, SESSION_COOKIE)
        .map(|v| AuthToken(v.to_string()))
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    if let Ok(Some(identity)) = state.identity.current_session(&token).await {
        state.forget_session(identity.id).await;
        info!("User {} signed out", identity.id);
    }
    state.auth_flow().sign_out(&token).await;

    Ok((StatusCode::OK, [(header::SET_COOKIE, cleared_session_cookie())]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_carries_token_and_lifetime() {
        let cookie = session_cookie(&AuthToken("tok".into()));
        assert!(cookie.starts_with("session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains(&format!("Max-Age={}", 30 * 24 * 60 * 60)));
        assert!(cleared_session_cookie().contains("Max-Age=0"));
    }

    #[test]
    fn auth_errors_map_to_statuses() {
        assert_eq!(auth_failure(AuthError::InvalidCredentials).0, StatusCode::UNAUTHORIZED);
        assert_eq!(auth_failure(AuthError::EmailTaken).0, StatusCode::CONFLICT);
        let (status, message) = auth_failure(AuthError::Service(
            kova_core::ports::PortError::Network("down".into()),
        ));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!message.contains("down"));
    }
}
