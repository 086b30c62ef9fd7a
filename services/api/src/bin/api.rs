//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        DbAdapter, NominatimGeocoder, OpenAiGenerationAdapter, PgIdentityAdapter,
        RelayMediaPlatform,
    },
    config::Config,
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler, session_handler},
        registration::{
            back_handler, edit_handler, next_handler, options_handler, show_handler,
            verify_location_handler,
        },
        require_auth,
        rest::{
            connect_handler, dashboard_handler, discover_handler, get_profile_handler,
            list_matches_handler, save_photo_handler, swipe_handler, update_profile_handler,
        },
        room,
        state::{spawn_sweeper, AppState, SWEEP_INTERVAL},
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use kova_core::ports::{IdentityEvent, IdentityService};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let identity = Arc::new(PgIdentityAdapter::new(db_pool));
    identity.on_identity_change(Box::new(|event: &IdentityEvent| match event {
        IdentityEvent::SignedIn(who) => info!("Identity {} signed in", who.id),
        IdentityEvent::SignedOut(id) => info!("Identity {} signed out", id),
    }));

    let openai_config = match &config.openai_api_key {
        Some(key) => OpenAIConfig::new().with_api_key(key),
        None => {
            warn!("OPENAI_API_KEY is not set; goal suggestions and recaps will fail");
            OpenAIConfig::new()
        }
    };
    let generator = Arc::new(OpenAiGenerationAdapter::new(
        Client::with_config(openai_config),
        config.suggest_model.clone(),
        config.summary_model.clone(),
    ));

    let geocoder = Arc::new(NominatimGeocoder::new(config.geocoder_url.clone())?);
    let media = Arc::new(RelayMediaPlatform::new(config.screen_capture_enabled));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        identity,
        db_adapter.clone(),
        db_adapter.clone(),
        db_adapter.clone(),
        db_adapter,
        generator,
        geocoder,
        media,
    ));

    spawn_sweeper(app_state.clone(), SWEEP_INTERVAL);

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/login", post(login_handler))
        .route("/auth/session", get(session_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/register", get(show_handler).patch(edit_handler))
        .route("/register/options", get(options_handler))
        .route("/register/location", post(verify_location_handler))
        .route("/register/next", post(next_handler))
        .route("/register/back", post(back_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/me", get(get_profile_handler).patch(update_profile_handler))
        .route("/me/photo", put(save_photo_handler))
        .route("/discover", get(discover_handler))
        .route("/discover/swipe", post(swipe_handler))
        .route("/matches", get(list_matches_handler))
        .route("/matches/connect", post(connect_handler))
        .route("/dashboard", get(dashboard_handler))
        .route("/rooms", post(room::create_room_handler))
        .route("/rooms/{room_id}", get(room::get_room_handler))
        .route("/rooms/{room_id}/end", post(room::end_call_handler))
        .route("/rooms/{room_id}/summary", post(room::summary_handler))
        .route("/rooms/{room_id}/return", post(room::return_handler))
        .route("/rooms/{room_id}/mic", post(room::toggle_mic_handler))
        .route("/rooms/{room_id}/camera", post(room::toggle_camera_handler))
        .route("/rooms/{room_id}/screen-share", post(room::toggle_share_handler))
        .route(
            "/rooms/{room_id}/screen-share/ended",
            post(room::share_ended_handler),
        )
        .route("/rooms/{room_id}/invite", post(room::invite_handler))
        .route("/rooms/{room_id}/goals", post(room::add_goal_handler))
        .route(
            "/rooms/{room_id}/goals/{goal_id}/toggle",
            post(room::toggle_goal_handler),
        )
        .route("/rooms/{room_id}/goals/suggest", post(room::suggest_goals_handler))
        .route("/rooms/{room_id}/notes", put(room::notes_handler))
        .route("/rooms/{room_id}/chat", post(room::chat_handler))
        .route(
            "/rooms/{room_id}/countdown/extend",
            post(room::extend_countdown_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
