//! crates/kova_core/src/domain.rs
//!
//! Defines the core data structures shared by every screen of the application.
//! They carry serde derives so the host can hand them to the browser shell as-is,
//! but nothing here knows about a database or a transport.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Accounts & Profiles
//=========================================================================================

/// The identity returned by the identity service after a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

/// How a profile photo sits inside its circular mask.
///
/// Offsets are percentages of the container size, zoom is a scale factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhotoPosition {
    pub zoom: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for PhotoPosition {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

/// A user's public profile record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
    pub city: String,
    pub state: String,
    pub bio: String,
    pub avatar_url: String,
    pub photo_position: PhotoPosition,
    /// Short professional tagline, e.g. "Founder @ Acme".
    pub headline: String,
    pub industry: String,
    pub looking_for: String,
    pub skills: Vec<String>,
    pub security_question: String,
    pub created_at: DateTime<Utc>,
}

/// A partial update applied to an existing profile. `None` leaves the field alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub photo_position: Option<PhotoPosition>,
    pub headline: Option<String>,
    pub industry: Option<String>,
    pub looking_for: Option<String>,
    pub skills: Option<Vec<String>>,
}

/// A password-recovery question and its answer, collected during registration.
#[derive(Debug, Clone)]
pub struct RecoveryQuestion {
    pub question: String,
    pub answer: String,
}

//=========================================================================================
// Discovery & Matches
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeDirection {
    /// Reject.
    Left,
    /// Accept.
    Right,
}

impl SwipeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwipeDirection::Left => "left",
            SwipeDirection::Right => "right",
        }
    }
}

/// A stored, mutually-established connection between two users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub created_at: DateTime<Utc>,
}

impl MatchRecord {
    /// Returns the id of the participant that is not `me`.
    pub fn partner_of(&self, me: Uuid) -> Uuid {
        if self.user_a == me {
            self.user_b
        } else {
            self.user_a
        }
    }

    pub fn involves(&self, user: Uuid) -> bool {
        self.user_a == user || self.user_b == user
    }
}

/// A match as shown on the match list: the record plus the other person's profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub record: MatchRecord,
    pub partner: Profile,
}

//=========================================================================================
// Video Room
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Host,
    Guest,
    Mentor,
    Investor,
}

/// A remote participant on a call. The local user is never one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub display_name: String,
    pub role: ParticipantRole,
    pub avatar_ref: String,
}

impl Participant {
    /// Builds a guest participant from a profile.
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            display_name: profile.name.clone(),
            role: ParticipantRole::Guest,
            avatar_ref: profile.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub text: String,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaState {
    pub mic_enabled: bool,
    pub cam_enabled: bool,
    pub screen_share_active: bool,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            mic_enabled: true,
            cam_enabled: true,
            screen_share_active: false,
        }
    }
}

/// What the local tile shows. Screen share wins over the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalFeed {
    Screen,
    Camera,
    Off,
}

impl MediaState {
    pub fn local_feed(&self) -> LocalFeed {
        if self.screen_share_active {
            LocalFeed::Screen
        } else if self.cam_enabled {
            LocalFeed::Camera
        } else {
            LocalFeed::Off
        }
    }

    /// The camera control is disabled while a screen is being shared.
    pub fn camera_toggle_enabled(&self) -> bool {
        !self.screen_share_active
    }
}

/// One call's session record, from start to end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSession {
    pub local_participant_id: Uuid,
    pub roster: Vec<Participant>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// The recap produced once at the end of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub text: String,
    pub goals_completed_count: usize,
    pub goals_total_count: usize,
}

/// The opaque handle returned by the session-tracking service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle(pub String);

impl std::fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
