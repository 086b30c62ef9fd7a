//! services/api/src/web/registration.rs
//!
//! Endpoints driving the three-step sign-up wizard. Each browser is tied to its
//! wizard by a `kova_wizard` cookie; finishing the last step creates the account
//! and signs the browser in.

use crate::web::auth::{auth_failure, session_cookie, AuthResponse};
use crate::web::middleware::cookie_value;
use crate::web::state::{AppState, SharedWizard};
use crate::web::HandlerError;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use kova_core::registration::{
    BackOutcome, DraftEdit, NextOutcome, RegistrationDraft, RegistrationWizard, ValidationErrors,
    SECURITY_QUESTIONS, TOTAL_STEPS, US_STATES,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

pub const WIZARD_COOKIE: &str = "kova_wizard";

//=========================================================================================
// Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct WizardView {
    pub step: usize,
    pub total_steps: usize,
    #[schema(value_type = Object)]
    pub draft: RegistrationDraft,
    #[schema(value_type = Object)]
    pub errors: ValidationErrors,
}

impl WizardView {
    fn of(wizard: &RegistrationWizard) -> Self {
        Self {
            step: wizard.step(),
            total_steps: TOTAL_STEPS,
            draft: wizard.draft().clone(),
            errors: wizard.errors().clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RegistrationOptions {
    pub security_questions: Vec<&'static str>,
    pub states: Vec<&'static str>,
}

//=========================================================================================
// Helpers
//=========================================================================================

/// The caller's wizard id, minting a fresh one for a first visit.
fn wizard_id(headers: &HeaderMap) -> Uuid {
    cookie_value(headers, WIZARD_COOKIE)
        .and_then(|v| Uuid::parse_str(v).ok())
        .unwrap_or_else(Uuid::new_v4)
}

fn wizard_cookie(id: Uuid) -> String {
    format!("{}={}; HttpOnly; Secure; SameSite=Lax; Path=/", WIZARD_COOKIE, id)
}

async fn wizard(state: &AppState, headers: &HeaderMap) -> (Uuid, SharedWizard) {
    let id = wizard_id(headers);
    (id, state.wizard_for(id).await)
}

fn view_response(id: Uuid, status: StatusCode, view: WizardView) -> Response {
    (status, [(header::SET_COOKIE, wizard_cookie(id))], Json(view)).into_response()
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /register/options - Fixed choices for the wizard's select inputs
#[utoipa::path(
    get,
    path = "/register/options",
    responses((status = 200, description = "Wizard options", body = RegistrationOptions))
)]
pub async fn options_handler() -> Json<RegistrationOptions> {
    Json(RegistrationOptions {
        security_questions: SECURITY_QUESTIONS.to_vec(),
        states: US_STATES.to_vec(),
    })
}

/// GET /register - Resume (or start) the wizard
#[utoipa::path(
    get,
    path = "/register",
    responses((status = 200, description = "Current wizard state", body = WizardView))
)]
pub async fn show_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (id, wizard) = wizard(&state, &headers).await;
    let view = WizardView::of(&*wizard.lock().await);
    view_response(id, StatusCode::OK, view)
}

/// PATCH /register - Apply form edits
///
/// Changing the state selection re-runs the location check.
#[utoipa::path(
    patch,
    path = "/register",
    request_body(content_type = "application/json", description = "Fields to change"),
    responses((status = 200, description = "Updated wizard state", body = WizardView))
)]
pub async fn edit_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(edit): Json<DraftEdit>,
) -> Response {
    let (id, wizard) = wizard(&state, &headers).await;
    let mut wizard = wizard.lock().await;
    if wizard.apply(edit) {
        wizard.verify_location().await;
    }
    view_response(id, StatusCode::OK, WizardView::of(&wizard))
}

/// POST /register/location - Check the entered city (on city blur)
#[utoipa::path(
    post,
    path = "/register/location",
    responses((status = 200, description = "Wizard state with the lookup result", body = WizardView))
)]
pub async fn verify_location_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let (id, wizard) = wizard(&state, &headers).await;
    let mut wizard = wizard.lock().await;
    wizard.verify_location().await;
    view_response(id, StatusCode::OK, WizardView::of(&wizard))
}

/// POST /register/next - Validate the current step and advance, or submit on the last
#[utoipa::path(
    post,
    path = "/register/next",
    responses(
        (status = 200, description = "Advanced to the next step", body = WizardView),
        (status = 201, description = "Account created and signed in", body = AuthResponse),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Validation failed", body = WizardView)
    )
)]
pub async fn next_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, HandlerError> {
    let (id, shared) = wizard(&state, &headers).await;
    let mut wizard = shared.lock().await;

    let submission = match wizard.next().await {
        NextOutcome::Advanced(_) => {
            return Ok(view_response(id, StatusCode::OK, WizardView::of(&wizard)));
        }
        NextOutcome::Blocked => {
            return Ok(view_response(
                id,
                StatusCode::UNPROCESSABLE_ENTITY,
                WizardView::of(&wizard),
            ));
        }
        NextOutcome::Submitted(submission) => submission,
    };

    // On failure the draft stays so the user can fix the problem and retry.
    let auth = state
        .auth_flow()
        .register(*submission)
        .await
        .map_err(auth_failure)?;

    wizard.clear();
    drop(wizard);
    state.forget_wizard(id).await;
    info!("Registration finished for {}", auth.profile.id);

    let cookie = session_cookie(&auth.token);
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse::from(auth)),
    )
        .into_response())
}

/// POST /register/back - Go back one step; from the first step the draft is discarded
#[utoipa::path(
    post,
    path = "/register/back",
    responses(
        (status = 200, description = "Moved back one step", body = WizardView),
        (status = 205, description = "Wizard left and draft discarded")
    )
)]
pub async fn back_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (id, shared) = wizard(&state, &headers).await;
    let mut wizard = shared.lock().await;
    match wizard.back() {
        BackOutcome::Step(_) => view_response(id, StatusCode::OK, WizardView::of(&wizard)),
        BackOutcome::Exit => {
            drop(wizard);
            state.forget_wizard(id).await;
            StatusCode::RESET_CONTENT.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn existing_wizard_cookie_is_reused() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{}={}", WIZARD_COOKIE, id)).unwrap(),
        );
        assert_eq!(wizard_id(&headers), id);
    }

    #[test]
    fn malformed_wizard_cookie_starts_fresh() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("kova_wizard=nope"));
        let first = wizard_id(&headers);
        assert_ne!(first, wizard_id(&headers));
        assert!(wizard_cookie(first).starts_with("kova_wizard="));
    }
}
