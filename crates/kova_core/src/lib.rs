pub mod app_session;
pub mod auth;
pub mod countdown;
pub mod dashboard;
pub mod domain;
pub mod photo_editor;
pub mod ports;
pub mod registration;
pub mod swipe_deck;
pub mod video_room;

#[cfg(test)]
mod testing;

pub use app_session::{AppPorts, AppSession, ConnectError, Screen};
pub use auth::{AuthError, AuthFlow, Authenticated};
pub use countdown::{CountdownConfig, CountdownTimer};
pub use domain::{
    CallSession, ChatMessage, Goal, Identity, Match, MatchRecord, MediaState, Participant,
    ParticipantRole, PhotoPosition, Profile, ProfileUpdate, SessionHandle, SessionSummary,
    SwipeDirection,
};
pub use ports::{
    AuthToken, DraftStore, GenerationService, GeocodingService, IdentityService, MatchStore,
    MediaPlatform, MediaStream, PortError, PortResult, ProfileStore, ScreenCapture,
    SessionTracker, SwipeStore,
};
pub use registration::{RegistrationDraft, RegistrationWizard};
pub use video_room::{RoomExit, RoomPhase, RoomPorts, VideoRoom};
