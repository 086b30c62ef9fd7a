//! services/api/src/web/room.rs
//!
//! Endpoints for a live video call. Each room sits behind its own async mutex;
//! calls to the generation service run with that lock released, in two phases,
//! so the pending state stays observable.
//!
//! Two background tasks run per room: the countdown, cancelled when the room
//! closes, and one watcher per screen capture that reacts to the platform's own
//! "stop sharing" control.

use crate::web::state::{AppState, RoomEntry, SharedRoom};
use crate::web::{port_failure, CurrentUser, HandlerError};
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::Json,
};
use kova_core::countdown::CountdownConfig;
use kova_core::domain::{Participant, ParticipantRole};
use kova_core::video_room::{
    LocalUser, RoomError, RoomExit, RoomPhase, RoomSnapshot, ShareToggle, ShareWatch,
    SummaryOutcome, VideoRoom,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

pub const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateRoomRequest {
    pub partner_id: Uuid,
}

#[derive(Serialize)]
pub struct RoomView {
    pub room_id: Uuid,
    #[serde(flatten)]
    pub snapshot: RoomSnapshot,
}

#[derive(Serialize)]
pub struct ShareResponse {
    /// `started`, `stopped` or `refused`.
    pub outcome: &'static str,
    /// Reported back by the browser when the platform ends the capture.
    pub stream_id: Option<Uuid>,
    #[serde(flatten)]
    pub room: RoomView,
}

#[derive(Serialize)]
pub struct ExitResponse {
    pub exit: RoomExit,
}

#[derive(Deserialize)]
pub struct StreamEndedRequest {
    pub stream_id: Uuid,
}

#[derive(Deserialize)]
pub struct InviteRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub role: Option<ParticipantRole>,
}

#[derive(Deserialize)]
pub struct GoalRequest {
    pub text: String,
}

#[derive(Deserialize)]
pub struct SuggestRequest {
    pub topic: String,
}

#[derive(Deserialize)]
pub struct NotesRequest {
    pub notes: String,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

#[derive(Deserialize)]
pub struct ExtendRequest {
    pub minutes: u64,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn room_failure(e: RoomError) -> HandlerError {
    (StatusCode::CONFLICT, e.to_string())
}

fn view(room_id: Uuid, room: &VideoRoom) -> RoomView {
    RoomView {
        room_id,
        snapshot: room.snapshot(),
    }
}

/// One countdown beat. Returns `false` once there is nothing left to count.
async fn countdown_beat(room: &SharedRoom, tick: Duration) -> bool {
    let mut room = room.lock().await;
    if room.phase() != RoomPhase::InCall {
        return false;
    }
    let reached_zero = room.tick_countdown(tick);
    !reached_zero && !room.countdown().is_expired()
}

/// Ticks the room's countdown until it runs out, the call leaves `InCall`, or the
/// token is cancelled.
fn spawn_countdown(room: SharedRoom, cancel: CancellationToken, tick: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if !countdown_beat(&room, tick).await {
                        break;
                    }
                }
            }
        }
    });
}

fn spawn_share_watch(room: SharedRoom, watch: ShareWatch) {
    tokio::spawn(async move {
        let stream_id = watch.wait().await;
        if room.lock().await.screen_share_ended(stream_id) {
            info!("Screen share {} ended from the platform control", stream_id);
        }
    });
}

//=========================================================================================
// Lifecycle
//=========================================================================================

/// POST /rooms - Open a call with a partner
#[utoipa::path(
    post,
    path = "/rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Call started"),
        (status = 404, description = "Partner not found")
    )
)]
pub async fn create_room_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomView>), HandlerError> {
    if req.partner_id == user.id {
        return Err((
            StatusCode::BAD_REQUEST,
            "You cannot call yourself".to_string(),
        ));
    }
    let partner = state
        .profiles
        .fetch_profile(req.partner_id)
        .await
        .map_err(|e| port_failure("Partner not found", e))?;
    let session = state.session_for(user.id).await?;
    let local = {
        let session = session.lock().await;
        LocalUser {
            id: user.id,
            display_name: session.me().name.clone(),
        }
    };

    let room_id = Uuid::new_v4();
    let countdown = CountdownConfig::new(
        state.config.session_length,
        state.config.session_max_length,
        COUNTDOWN_TICK,
    )
    .on_zero(move || info!("Room {} reached its time limit", room_id));

    let mut room = VideoRoom::new(
        local,
        Participant::from_profile(&partner),
        state.room_ports(),
        countdown,
    );
    room.start().await.map_err(room_failure)?;
    let body = view(room_id, &room);

    let room: SharedRoom = Arc::new(tokio::sync::Mutex::new(room));
    let cancel = CancellationToken::new();
    spawn_countdown(room.clone(), cancel.clone(), COUNTDOWN_TICK);
    state
        .rooms
        .insert(room_id, RoomEntry::new(user.id, room, cancel))
        .await;
    info!("User {} opened room {} with {}", user.id, room_id, partner.id);
    Ok((StatusCode::CREATED, Json(body)))
}

/// GET /rooms/{room_id} - Current room state
#[utoipa::path(
    get,
    path = "/rooms/{room_id}",
    params(("room_id" = Uuid, Path, description = "Room id")),
    responses((status = 200, description = "Room state"), (status = 404, description = "No such room"))
)]
pub async fn get_room_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<RoomView>, HandlerError> {
    let room = state.room_for(room_id, user.id).await?;
    let room = room.lock().await;
    Ok(Json(view(room_id, &room)))
}

/// POST /rooms/{room_id}/end - End the call without a recap
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/end",
    params(("room_id" = Uuid, Path, description = "Room id")),
    responses((status = 200, description = "Call ended"), (status = 409, description = "Not in a call"))
)]
pub async fn end_call_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<ExitResponse>, HandlerError> {
    let room = state.room_for(room_id, user.id).await?;
    let exit = room.lock().await.end_call().await.map_err(room_failure)?;
    state.close_room(room_id).await;
    Ok(Json(ExitResponse { exit }))
}

/// POST /rooms/{room_id}/summary - End the call with a generated recap
///
/// If generation fails the call ends directly and the response carries the exit.
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/summary",
    params(("room_id" = Uuid, Path, description = "Room id")),
    responses(
        (status = 200, description = "Recap shown, or call ended when generation failed"),
        (status = 409, description = "Not in a call")
    )
)]
pub async fn summary_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    let room = state.room_for(room_id, user.id).await?;
    let request = room.lock().await.begin_summary().map_err(room_failure)?;

    let generated = state
        .generator
        .summarize(&request.goals, &request.notes)
        .await;

    let outcome = room
        .lock()
        .await
        .finish_summary(generated)
        .await
        .map_err(room_failure)?;
    let body = match outcome {
        SummaryOutcome::Shown(summary) => serde_json::json!({ "summary": summary }),
        SummaryOutcome::Ended(exit) => {
            state.close_room(room_id).await;
            serde_json::json!({ "exit": exit })
        }
    };
    Ok(Json(body))
}

/// POST /rooms/{room_id}/return - Leave the recap for the dashboard
#[utoipa::path(
    post,
    path = "/rooms/{room_id}/return",
    params(("room_id" = Uuid, Path, description = "Room id")),
    responses((status = 200, description = "Room closed"), (status = 409, description = "No recap shown"))
)]
pub async fn return_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<ExitResponse>, HandlerError> {
    let room = state.room_for(room_id, user.id).await?;
    let exit = room
        .lock()
        .await
        .return_to_dashboard()
        .await
        .map_err(room_failure)?;
    state.close_room(room_id).await;
    Ok(Json(ExitResponse { exit }))
}

//=========================================================================================
// Media
//=========================================================================================

pub async fn toggle_mic_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<RoomView>, HandlerError> {
    let room = state.room_for(room_id, user.id).await?;
    let mut room = room.lock().await;
    room.toggle_mic().map_err(room_failure)?;
    Ok(Json(view(room_id, &room)))
}

pub async fn toggle_camera_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<RoomView>, HandlerError> {
    let room = state.room_for(room_id, user.id).await?;
    let mut room = room.lock().await;
    room.toggle_camera().map_err(room_failure)?;
    Ok(Json(view(room_id, &room)))
}

pub async fn toggle_share_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<ShareResponse>, HandlerError> {
    let shared = state.room_for(room_id, user.id).await?;
    let mut room = shared.lock().await;
    let (outcome, stream_id) = match room.toggle_screen_share().await.map_err(room_failure)? {
        ShareToggle::Started(watch) => {
            let stream_id = watch.stream_id();
            spawn_share_watch(shared.clone(), watch);
            ("started", Some(stream_id))
        }
        ShareToggle::Stopped => ("stopped", None),
        ShareToggle::Refused => ("refused", None),
    };
    Ok(Json(ShareResponse {
        outcome,
        stream_id,
        room: view(room_id, &room),
    }))
}

/// The browser saw the capture track end (the platform's own stop control).
pub async fn share_ended_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(room_id): Path<Uuid>,
    Json(req): Json<StreamEndedRequest>,
) -> Result<Json<RoomView>, HandlerError> {
    let room = state.room_for(room_id, user.id).await?;
    if !state.media.platform_stopped(req.stream_id) {
        warn!("Stop reported for unknown stream {}", req.stream_id);
    }
    let mut room = room.lock().await;
    room.screen_share_ended(req.stream_id);
    Ok(Json(view(room_id, &room)))
}

//=========================================================================================
// Roster, Goals, Notes & Chat
//=========================================================================================

pub async fn invite_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(room_id): Path<Uuid>,
    Json(req): Json<InviteRequest>,
) -> Result<Json<RoomView>, HandlerError> {
    let room = state.room_for(room_id, user.id).await?;
    let profile = state
        .profiles
        .fetch_profile(req.user_id)
        .await
        .map_err(|e| port_failure("User not found", e))?;
    let participant = Participant {
        role: req.role.unwrap_or(ParticipantRole::Guest),
        ..Participant::from_profile(&profile)
    };
    let mut room = room.lock().await;
    room.invite(participant).map_err(room_failure)?;
    Ok(Json(view(room_id, &room)))
}

pub async fn add_goal_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(room_id): Path<Uuid>,
    Json(req): Json<GoalRequest>,
) -> Result<Json<RoomView>, HandlerError> {
    let room = state.room_for(room_id, user.id).await?;
    let mut room = room.lock().await;
    room.add_goal(&req.text).map_err(room_failure)?;
    Ok(Json(view(room_id, &room)))
}

pub async fn toggle_goal_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path((room_id, goal_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RoomView>, HandlerError> {
    let room = state.room_for(room_id, user.id).await?;
    let mut room = room.lock().await;
    if !room.toggle_goal(goal_id).map_err(room_failure)? {
        return Err((StatusCode::NOT_FOUND, "Goal not found".to_string()));
    }
    Ok(Json(view(room_id, &room)))
}

/// Suggestions are generated with the room unlocked, then appended.
pub async fn suggest_goals_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(room_id): Path<Uuid>,
    Json(req): Json<SuggestRequest>,
) -> Result<Json<RoomView>, HandlerError> {
    let room = state.room_for(room_id, user.id).await?;
    {
        let room = room.lock().await;
        if room.phase() != RoomPhase::InCall {
            return Err(room_failure(RoomError::InvalidPhase(room.phase())));
        }
    }

    let suggestions = state
        .generator
        .suggest_goals(&req.topic)
        .await
        .map_err(|e| port_failure("Could not suggest goals", e))?;

    let mut room = room.lock().await;
    room.append_suggested_goals(suggestions)
        .map_err(room_failure)?;
    Ok(Json(view(room_id, &room)))
}

pub async fn notes_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(room_id): Path<Uuid>,
    Json(req): Json<NotesRequest>,
) -> Result<Json<RoomView>, HandlerError> {
    let room = state.room_for(room_id, user.id).await?;
    let mut room = room.lock().await;
    room.set_notes(req.notes).map_err(room_failure)?;
    Ok(Json(view(room_id, &room)))
}

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(room_id): Path<Uuid>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<RoomView>, HandlerError> {
    let room = state.room_for(room_id, user.id).await?;
    let mut room = room.lock().await;
    room.set_chat_input(req.text);
    room.send_chat().map_err(room_failure)?;
    Ok(Json(view(room_id, &room)))
}

pub async fn extend_countdown_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(room_id): Path<Uuid>,
    Json(req): Json<ExtendRequest>,
) -> Result<Json<RoomView>, HandlerError> {
    let room = state.room_for(room_id, user.id).await?;
    let mut room = room.lock().await;
    room.extend_countdown(Duration::from_secs(req.minutes.saturating_mul(60)))
        .map_err(room_failure)?;
    Ok(Json(view(room_id, &room)))
}
