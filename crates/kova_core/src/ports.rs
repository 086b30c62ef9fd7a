//! crates/kova_core/src/ports.rs
//!
//! Defines the service contracts (traits) for every external collaborator the
//! screens talk to. These traits form the boundary of the hexagonal architecture:
//! the controllers in this crate only ever see these, never a concrete backend.

use crate::domain::{
    Goal, Identity, MatchRecord, Profile, ProfileUpdate, RecoveryQuestion, SessionHandle,
    SwipeDirection,
};
use crate::registration::RegistrationDraft;
use async_trait::async_trait;
use futures::channel::oneshot;
use std::collections::HashSet;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    Conflict(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Not supported on this platform")]
    Unsupported,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Identity
//=========================================================================================

/// The bearer token tying a browser to a signed-in identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthToken(pub String);

/// A successful sign-in or sign-up.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub identity: Identity,
    pub token: AuthToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    SignedIn(Identity),
    SignedOut(Uuid),
}

pub type IdentityListener = Box<dyn Fn(&IdentityEvent) + Send + Sync>;

#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> PortResult<SignedIn>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        recovery: Option<&RecoveryQuestion>,
    ) -> PortResult<SignedIn>;

    /// Resolves a token to its identity; `None` when the session is gone or expired.
    async fn current_session(&self, token: &AuthToken) -> PortResult<Option<Identity>>;

    /// Registers a listener fired after every sign-in and sign-out.
    fn on_identity_change(&self, listener: IdentityListener);

    async fn sign_out(&self, token: &AuthToken) -> PortResult<()>;
}

//=========================================================================================
// Row Storage
//=========================================================================================

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch_profile(&self, id: Uuid) -> PortResult<Profile>;

    async fn insert_profile(&self, profile: &Profile) -> PortResult<()>;

    async fn update_profile(&self, id: Uuid, fields: &ProfileUpdate) -> PortResult<Profile>;

    /// Discovery candidates: every profile whose id is not in `excluding`.
    async fn list_candidates(&self, excluding: &HashSet<Uuid>) -> PortResult<Vec<Profile>>;
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Matches involving `user_id`, newest first.
    async fn list_matches_for(&self, user_id: Uuid) -> PortResult<Vec<MatchRecord>>;

    async fn create_match(&self, user_a: Uuid, user_b: Uuid) -> PortResult<MatchRecord>;

    /// Looks a match up in either direction.
    async fn find_existing_match(&self, user_a: Uuid, user_b: Uuid)
        -> PortResult<Option<MatchRecord>>;
}

#[async_trait]
pub trait SwipeStore: Send + Sync {
    async fn record_swipe(
        &self,
        swiper_id: Uuid,
        swiped_id: Uuid,
        direction: SwipeDirection,
    ) -> PortResult<()>;

    /// Every user `swiper_id` has already swiped on, in either direction.
    async fn swiped_ids(&self, swiper_id: Uuid) -> PortResult<Vec<Uuid>>;
}

//=========================================================================================
// Lookups & Generation
//=========================================================================================

#[async_trait]
pub trait GeocodingService: Send + Sync {
    /// Whether `city` (optionally within `state`) resolves to a real place.
    /// Transport failures surface as `PortError::Network`.
    async fn verify(&self, city: &str, state: Option<&str>) -> PortResult<bool>;
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Suggests short meeting goals for a topic.
    async fn suggest_goals(&self, topic: &str) -> PortResult<Vec<String>>;

    /// Writes a recap of a meeting from its goals and notes.
    async fn summarize(&self, goals: &[Goal], notes: &str) -> PortResult<String>;
}

#[async_trait]
pub trait SessionTracker: Send + Sync {
    async fn start(&self, user_a: Uuid, user_b: Uuid) -> PortResult<SessionHandle>;

    async fn end(&self, handle: &SessionHandle) -> PortResult<()>;
}

//=========================================================================================
// Media Platform
//=========================================================================================

/// A live media stream owned by the caller until `stop` is called.
pub trait MediaStream: Send + Sync {
    fn id(&self) -> Uuid;

    /// Releases the underlying tracks. Calling it twice is harmless.
    fn stop(&self);
}

/// A granted screen capture.
///
/// `ended` resolves when the user stops sharing through the platform's own control.
pub struct ScreenCapture {
    pub stream: Box<dyn MediaStream>,
    pub ended: oneshot::Receiver<()>,
}

#[async_trait]
pub trait MediaPlatform: Send + Sync {
    /// Opens the local camera and microphone.
    async fn open_user_media(&self) -> PortResult<Box<dyn MediaStream>>;

    /// Fails with `PermissionDenied` or `Unsupported` when no capture is granted.
    async fn request_screen_capture(&self) -> PortResult<ScreenCapture>;
}

//=========================================================================================
// Draft Persistence
//=========================================================================================

/// Per-wizard storage for the in-progress registration draft.
pub trait DraftStore: Send + Sync {
    fn load(&self) -> Option<RegistrationDraft>;

    fn save(&self, draft: &RegistrationDraft) -> PortResult<()>;

    fn clear(&self);
}
