//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the signed-in screens (profile, discover,
//! matches, dashboard) and the master definition for the OpenAPI specification.

use crate::web::state::AppState;
use crate::web::{auth, port_failure, registration, room, CurrentUser, HandlerError};
use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::Json,
};
use kova_core::app_session::{ConnectError, Screen};
use kova_core::dashboard::{self, DashboardStats};
use kova_core::domain::{Match, PhotoPosition, Profile, ProfileUpdate, SwipeDirection};
use kova_core::photo_editor::PhotoEditor;
use kova_core::swipe_deck::DeckError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login_handler,
        auth::session_handler,
        auth::logout_handler,
        registration::options_handler,
        registration::show_handler,
        registration::edit_handler,
        registration::verify_location_handler,
        registration::next_handler,
        registration::back_handler,
        get_profile_handler,
        update_profile_handler,
        save_photo_handler,
        discover_handler,
        swipe_handler,
        list_matches_handler,
        connect_handler,
        dashboard_handler,
        room::create_room_handler,
        room::get_room_handler,
        room::end_call_handler,
        room::summary_handler,
        room::return_handler,
    ),
    components(
        schemas(
            auth::LoginRequest,
            auth::AuthResponse,
            registration::WizardView,
            registration::RegistrationOptions,
            DeckView,
            SwipeRequest,
            ConnectRequest,
            room::CreateRoomRequest,
        )
    ),
    tags(
        (name = "Kova API", description = "API endpoints for the Kova entrepreneur networking app.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The discovery card stack as the screen shows it.
#[derive(Serialize, ToSchema)]
pub struct DeckView {
    #[schema(value_type = Option<Object>)]
    pub current: Option<Profile>,
    pub remaining: usize,
}

#[derive(Deserialize, ToSchema)]
pub struct SwipeRequest {
    /// `left` to pass, `right` to connect.
    #[schema(value_type = String)]
    pub direction: SwipeDirection,
}

#[derive(Serialize)]
pub struct SwipeResponse {
    pub swiped: Profile,
    pub deck: DeckView,
}

#[derive(Deserialize, ToSchema)]
pub struct ConnectRequest {
    /// The other user's id as typed by the user.
    pub user_id: String,
}

fn deck_failure(e: DeckError) -> HandlerError {
    match e {
        DeckError::Empty => (StatusCode::CONFLICT, e.to_string()),
        DeckError::NotRecorded(inner) => port_failure("Could not record swipe", inner),
    }
}

fn connect_failure(e: ConnectError) -> HandlerError {
    match e {
        ConnectError::SelfConnection => (StatusCode::BAD_REQUEST, e.to_string()),
        ConnectError::UnknownProfile => (StatusCode::NOT_FOUND, e.to_string()),
        ConnectError::Failed(inner) => port_failure("Could not connect", inner),
    }
}

//=========================================================================================
// Profile
//=========================================================================================

/// GET /me - The signed-in user's profile
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Own profile"), (status = 401, description = "Not signed in"))
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Profile>, HandlerError> {
    let session = state.session_for(user.id).await?;
    let me = session.lock().await.me().clone();
    Ok(Json(me))
}

/// PATCH /me - Edit profile fields
#[utoipa::path(
    patch,
    path = "/me",
    request_body(content_type = "application/json", description = "Fields to change"),
    responses((status = 200, description = "Updated profile"))
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>, HandlerError> {
    let session = state.session_for(user.id).await?;
    let mut session = session.lock().await;
    let updated = session
        .update_profile(&update)
        .await
        .map_err(|e| port_failure("Failed to update profile", e))?;
    Ok(Json(updated.clone()))
}

/// PUT /me/photo - Save the photo editor's zoom and offsets
#[utoipa::path(
    put,
    path = "/me/photo",
    request_body(content_type = "application/json", description = "Zoom and offsets"),
    responses((status = 200, description = "Updated profile"))
)]
pub async fn save_photo_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(position): Json<PhotoPosition>,
) -> Result<Json<Profile>, HandlerError> {
    let update = ProfileUpdate {
        photo_position: Some(PhotoEditor::open(position).save()),
        ..Default::default()
    };
    let session = state.session_for(user.id).await?;
    let mut session = session.lock().await;
    let updated = session
        .update_profile(&update)
        .await
        .map_err(|e| port_failure("Failed to save photo position", e))?;
    Ok(Json(updated.clone()))
}

//=========================================================================================
// Discover
//=========================================================================================

/// GET /discover - Reload candidates and show the head card
#[utoipa::path(
    get,
    path = "/discover",
    responses((status = 200, description = "Current deck", body = DeckView))
)]
pub async fn discover_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<DeckView>, HandlerError> {
    let session = state.session_for(user.id).await?;
    let mut session = session.lock().await;
    session.refresh_for(Screen::Discover).await;
    Ok(Json(DeckView {
        current: session.deck().current().cloned(),
        remaining: session.deck().remaining(),
    }))
}

/// POST /discover/swipe - Swipe on the head card
#[utoipa::path(
    post,
    path = "/discover/swipe",
    request_body = SwipeRequest,
    responses(
        (status = 200, description = "Swipe recorded; next card returned"),
        (status = 409, description = "No more profiles"),
        (status = 502, description = "Swipe could not be recorded; card kept")
    )
)]
pub async fn swipe_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<SwipeRequest>,
) -> Result<Json<SwipeResponse>, HandlerError> {
    let session = state.session_for(user.id).await?;
    let mut session = session.lock().await;
    let swiped = session.swipe(req.direction).await.map_err(deck_failure)?;
    Ok(Json(SwipeResponse {
        swiped,
        deck: DeckView {
            current: session.deck().current().cloned(),
            remaining: session.deck().remaining(),
        },
    }))
}

//=========================================================================================
// Matches & Dashboard
//=========================================================================================

/// GET /matches - The user's connections
#[utoipa::path(
    get,
    path = "/matches",
    responses((status = 200, description = "Matches with partner profiles"))
)]
pub async fn list_matches_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<Match>>, HandlerError> {
    let session = state.session_for(user.id).await?;
    let mut session = session.lock().await;
    session.refresh_for(Screen::Matches).await;
    Ok(Json(session.matches().to_vec()))
}

/// POST /matches/connect - Connect directly with a user by id
#[utoipa::path(
    post,
    path = "/matches/connect",
    request_body = ConnectRequest,
    responses(
        (status = 201, description = "Connected"),
        (status = 400, description = "Invalid id or self-connection"),
        (status = 404, description = "No such user")
    )
)]
pub async fn connect_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<ConnectRequest>,
) -> Result<(StatusCode, Json<Match>), HandlerError> {
    let other = Uuid::parse_str(req.user_id.trim())
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid user ID".to_string()))?;
    let session = state.session_for(user.id).await?;
    let mut session = session.lock().await;
    let connected = session
        .connect_by_id(other)
        .await
        .map_err(connect_failure)?;
    info!("{} connected with {}", user.id, other);
    Ok((StatusCode::CREATED, Json(connected)))
}

/// GET /dashboard - Connection stats and badges
#[utoipa::path(
    get,
    path = "/dashboard",
    responses((status = 200, description = "Dashboard figures"))
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<DashboardStats>, HandlerError> {
    let session = state.session_for(user.id).await?;
    let mut session = session.lock().await;
    session.refresh_for(Screen::Dashboard).await;
    Ok(Json(dashboard::build(session.me(), session.matches())))
}
