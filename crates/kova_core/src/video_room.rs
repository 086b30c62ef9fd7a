//! crates/kova_core/src/video_room.rs
//!
//! The session controller behind one video call screen.
//!
//! A room moves `Idle -> InCall`, then ends either directly (`InCall -> Closed`) or
//! through the recap (`InCall -> SummaryPending -> SummaryShown -> Closed`). A failed
//! summary falls back to the direct path. Nothing leads back into `InCall`.
//!
//! The tracked session handle is held in an `Option` and `take`n when closed, so it
//! is closed at most once whichever exit is used.

use crate::countdown::{CountdownConfig, CountdownTimer};
use crate::domain::{
    CallSession, ChatMessage, Goal, LocalFeed, MediaState, Participant, SessionHandle,
    SessionSummary,
};
use crate::ports::{
    GenerationService, MediaPlatform, MediaStream, PortResult, ScreenCapture, SessionTracker,
};
use chrono::Utc;
use futures::channel::oneshot;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const SYSTEM_SENDER_NAME: &str = "Kova";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    Idle,
    InCall,
    SummaryPending,
    SummaryShown,
    Closed,
}

/// How the room was left; the host routes on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomExit {
    CallEnded,
    ReturnToDashboard,
}

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("The call has already been started")]
    AlreadyStarted,
    #[error("Operation not valid while the room is {0:?}")]
    InvalidPhase(RoomPhase),
}

pub type RoomResult<T> = Result<T, RoomError>;

/// The signed-in user as shown on their own tile.
#[derive(Debug, Clone)]
pub struct LocalUser {
    pub id: Uuid,
    pub display_name: String,
}

/// The external collaborators one room talks to.
#[derive(Clone)]
pub struct RoomPorts {
    pub tracker: Arc<dyn SessionTracker>,
    pub media: Arc<dyn MediaPlatform>,
    pub generator: Arc<dyn GenerationService>,
}

/// Resolves when the platform's own "stop sharing" control ends a capture.
///
/// The host awaits it and feeds the id back through `VideoRoom::screen_share_ended`.
pub struct ShareWatch {
    stream_id: Uuid,
    ended: oneshot::Receiver<()>,
}

impl ShareWatch {
    pub fn stream_id(&self) -> Uuid {
        self.stream_id
    }

    /// A dropped sender counts as ended too: the platform released the stream.
    pub async fn wait(self) -> Uuid {
        let _ = self.ended.await;
        self.stream_id
    }
}

pub enum ShareToggle {
    Started(ShareWatch),
    Stopped,
    /// Capture was refused; nothing changed.
    Refused,
}

/// Inputs captured when the recap is requested.
#[derive(Debug, Clone)]
pub struct SummaryRequest {
    pub goals: Vec<Goal>,
    pub notes: String,
}

#[derive(Debug, Clone)]
pub enum SummaryOutcome {
    Shown(SessionSummary),
    /// Generation failed and the room took the direct end-call path.
    Ended(RoomExit),
}

/// Serializable view of the room for the screen.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    pub phase: RoomPhase,
    pub session: CallSession,
    pub media: MediaState,
    pub local_feed: LocalFeed,
    pub camera_toggle_enabled: bool,
    pub goals: Vec<Goal>,
    pub notes: String,
    pub chat: Vec<ChatMessage>,
    pub chat_input: String,
    pub summary: Option<SessionSummary>,
    pub time_remaining: String,
    pub time_up: bool,
    pub tracked: bool,
}

pub struct VideoRoom {
    local: LocalUser,
    session: CallSession,
    phase: RoomPhase,
    media: MediaState,
    goals: Vec<Goal>,
    notes: String,
    chat: Vec<ChatMessage>,
    chat_input: String,
    summary: Option<SessionSummary>,
    tracked: Option<SessionHandle>,
    camera: Option<Box<dyn MediaStream>>,
    screen: Option<Box<dyn MediaStream>>,
    countdown: CountdownTimer,
    ports: RoomPorts,
}

impl VideoRoom {
    pub fn new(
        local: LocalUser,
        initial: Participant,
        ports: RoomPorts,
        countdown: CountdownConfig,
    ) -> Self {
        let welcome = ChatMessage {
            id: Uuid::new_v4(),
            sender_id: Uuid::nil(),
            sender_name: SYSTEM_SENDER_NAME.to_string(),
            text: format!(
                "Welcome! You're meeting with {}. Set your goals, take notes, and chat here.",
                initial.display_name
            ),
            timestamp: Utc::now(),
        };
        Self {
            session: CallSession {
                local_participant_id: local.id,
                roster: vec![initial],
                started_at: Utc::now(),
                ended_at: None,
            },
            local,
            phase: RoomPhase::Idle,
            media: MediaState::default(),
            goals: Vec::new(),
            notes: String::new(),
            chat: vec![welcome],
            chat_input: String::new(),
            summary: None,
            tracked: None,
            camera: None,
            screen: None,
            countdown: CountdownTimer::new(countdown),
            ports,
        }
    }

    //=====================================================================================
    // Accessors
    //=====================================================================================

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    pub fn roster(&self) -> &[Participant] {
        &self.session.roster
    }

    pub fn media(&self) -> MediaState {
        self.media
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn chat(&self) -> &[ChatMessage] {
        &self.chat
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    pub fn tracked_session(&self) -> Option<&SessionHandle> {
        self.tracked.as_ref()
    }

    pub fn countdown(&self) -> &CountdownTimer {
        &self.countdown
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            phase: self.phase,
            session: self.session.clone(),
            media: self.media,
            local_feed: self.media.local_feed(),
            camera_toggle_enabled: self.media.camera_toggle_enabled(),
            goals: self.goals.clone(),
            notes: self.notes.clone(),
            chat: self.chat.clone(),
            chat_input: self.chat_input.clone(),
            summary: self.summary.clone(),
            time_remaining: self.countdown.display(),
            time_up: self.countdown.is_expired(),
            tracked: self.tracked.is_some(),
        }
    }

    fn require_in_call(&self) -> RoomResult<()> {
        if self.phase != RoomPhase::InCall {
            return Err(RoomError::InvalidPhase(self.phase));
        }
        Ok(())
    }

    //=====================================================================================
    // Lifecycle
    //=====================================================================================

    /// Opens the tracked session and the local camera. Both are best-effort.
    pub async fn start(&mut self) -> RoomResult<()> {
        if self.phase != RoomPhase::Idle {
            return Err(RoomError::AlreadyStarted);
        }
        let remote_id = self.session.roster[0].id;

        match self.ports.tracker.start(self.local.id, remote_id).await {
            Ok(handle) => {
                info!("Tracking call session {}", handle);
                self.tracked = Some(handle);
            }
            Err(e) => warn!("Could not start session tracking, continuing untracked: {}", e),
        }

        match self.ports.media.open_user_media().await {
            Ok(stream) => self.camera = Some(stream),
            Err(e) => warn!("Could not open camera/microphone: {}", e),
        }

        self.session.started_at = Utc::now();
        self.phase = RoomPhase::InCall;
        Ok(())
    }

    async fn close_tracked(&mut self) {
        if let Some(handle) = self.tracked.take() {
            if let Err(e) = self.ports.tracker.end(&handle).await {
                warn!("Failed to close tracked session {}: {}", handle, e);
            }
        }
    }

    fn release_media(&mut self) {
        if let Some(stream) = self.screen.take() {
            stream.stop();
        }
        if let Some(stream) = self.camera.take() {
            stream.stop();
        }
        self.media.screen_share_active = false;
    }

    fn finish(&mut self) {
        self.release_media();
        self.session.ended_at = Some(Utc::now());
        self.phase = RoomPhase::Closed;
    }

    /// Ends the call right away.
    pub async fn end_call(&mut self) -> RoomResult<RoomExit> {
        self.require_in_call()?;
        Ok(self.end_direct().await)
    }

    async fn end_direct(&mut self) -> RoomExit {
        self.close_tracked().await;
        self.finish();
        info!("Call ended for {}", self.local.id);
        RoomExit::CallEnded
    }

    /// First half of the recap flow: stops sharing and captures goals and notes.
    pub fn begin_summary(&mut self) -> RoomResult<SummaryRequest> {
        self.require_in_call()?;
        if let Some(stream) = self.screen.take() {
            stream.stop();
        }
        self.media.screen_share_active = false;
        self.phase = RoomPhase::SummaryPending;
        Ok(SummaryRequest {
            goals: self.goals.clone(),
            notes: self.notes.clone(),
        })
    }

    /// Second half of the recap flow. The tracked session stays open on success
    /// until `return_to_dashboard`.
    pub async fn finish_summary(&mut self, generated: PortResult<String>) -> RoomResult<SummaryOutcome> {
        if self.phase != RoomPhase::SummaryPending {
            return Err(RoomError::InvalidPhase(self.phase));
        }
        match generated {
            Ok(text) => {
                let summary = SessionSummary {
                    text,
                    goals_completed_count: self.goals.iter().filter(|g| g.completed).count(),
                    goals_total_count: self.goals.len(),
                };
                self.summary = Some(summary.clone());
                self.phase = RoomPhase::SummaryShown;
                Ok(SummaryOutcome::Shown(summary))
            }
            Err(e) => {
                error!("Summary generation failed, ending call directly: {}", e);
                Ok(SummaryOutcome::Ended(self.end_direct().await))
            }
        }
    }

    /// Runs the whole recap flow in place.
    pub async fn end_call_with_summary(&mut self) -> RoomResult<SummaryOutcome> {
        let request = self.begin_summary()?;
        let generator = self.ports.generator.clone();
        let generated = generator.summarize(&request.goals, &request.notes).await;
        self.finish_summary(generated).await
    }

    /// Leaves the recap screen.
    pub async fn return_to_dashboard(&mut self) -> RoomResult<RoomExit> {
        if self.phase != RoomPhase::SummaryShown {
            return Err(RoomError::InvalidPhase(self.phase));
        }
        self.close_tracked().await;
        self.finish();
        Ok(RoomExit::ReturnToDashboard)
    }

    //=====================================================================================
    // Media
    //=====================================================================================

    pub fn toggle_mic(&mut self) -> RoomResult<bool> {
        self.require_in_call()?;
        self.media.mic_enabled = !self.media.mic_enabled;
        Ok(self.media.mic_enabled)
    }

    /// Ignored while sharing the screen; returns the resulting camera flag.
    pub fn toggle_camera(&mut self) -> RoomResult<bool> {
        self.require_in_call()?;
        if self.media.camera_toggle_enabled() {
            self.media.cam_enabled = !self.media.cam_enabled;
        }
        Ok(self.media.cam_enabled)
    }

    pub async fn toggle_screen_share(&mut self) -> RoomResult<ShareToggle> {
        self.require_in_call()?;
        if let Some(stream) = self.screen.take() {
            stream.stop();
            self.media.screen_share_active = false;
            return Ok(ShareToggle::Stopped);
        }

        match self.ports.media.request_screen_capture().await {
            Ok(ScreenCapture { stream, ended }) => {
                let stream_id = stream.id();
                self.screen = Some(stream);
                self.media.screen_share_active = true;
                Ok(ShareToggle::Started(ShareWatch { stream_id, ended }))
            }
            Err(e) => {
                error!("Screen share unavailable: {}", e);
                Ok(ShareToggle::Refused)
            }
        }
    }

    /// Called when the platform stop control fired. Stale ids are ignored.
    pub fn screen_share_ended(&mut self, stream_id: Uuid) -> bool {
        match &self.screen {
            Some(stream) if stream.id() == stream_id => {}
            _ => return false,
        }
        if let Some(stream) = self.screen.take() {
            stream.stop();
        }
        self.media.screen_share_active = false;
        true
    }

    //=====================================================================================
    // Roster
    //=====================================================================================

    /// Returns `true` when the participant was added.
    pub fn invite(&mut self, participant: Participant) -> RoomResult<bool> {
        self.require_in_call()?;
        if participant.id == self.local.id
            || self.session.roster.iter().any(|p| p.id == participant.id)
        {
            return Ok(false);
        }
        self.session.roster.push(participant);
        Ok(true)
    }

    //=====================================================================================
    // Goals & Notes
    //=====================================================================================

    pub fn add_goal(&mut self, text: &str) -> RoomResult<Option<Uuid>> {
        self.require_in_call()?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let id = Uuid::new_v4();
        self.goals.push(Goal {
            id,
            text: text.to_string(),
            completed: false,
        });
        Ok(Some(id))
    }

    /// Returns `false` if no goal has that id.
    pub fn toggle_goal(&mut self, id: Uuid) -> RoomResult<bool> {
        self.require_in_call()?;
        match self.goals.iter_mut().find(|g| g.id == id) {
            Some(goal) => {
                goal.completed = !goal.completed;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Appends generated goals as incomplete. Blank suggestions are skipped.
    pub fn append_suggested_goals(&mut self, texts: Vec<String>) -> RoomResult<usize> {
        self.require_in_call()?;
        let before = self.goals.len();
        self.goals.extend(
            texts
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .map(|text| Goal {
                    id: Uuid::new_v4(),
                    text,
                    completed: false,
                }),
        );
        Ok(self.goals.len() - before)
    }

    /// Fetches suggestions and appends them. Concurrent requests are not de-duplicated.
    pub async fn suggest_goals(&mut self, topic: &str) -> RoomResult<usize> {
        self.require_in_call()?;
        let generator = self.ports.generator.clone();
        match generator.suggest_goals(topic).await {
            Ok(texts) => self.append_suggested_goals(texts),
            Err(e) => {
                error!("Goal suggestion failed: {}", e);
                Ok(0)
            }
        }
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) -> RoomResult<()> {
        self.require_in_call()?;
        self.notes = notes.into();
        Ok(())
    }

    //=====================================================================================
    // Chat
    //=====================================================================================

    pub fn set_chat_input(&mut self, text: impl Into<String>) {
        self.chat_input = text.into();
    }

    /// Sends whatever is in the input box. Local only; nothing is relayed to peers.
    pub fn send_chat(&mut self) -> RoomResult<Option<&ChatMessage>> {
        self.require_in_call()?;
        let text = self.chat_input.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let message = ChatMessage {
            id: Uuid::new_v4(),
            sender_id: self.local.id,
            sender_name: self.local.display_name.clone(),
            text: text.to_string(),
            timestamp: Utc::now(),
        };
        self.chat_input.clear();
        self.chat.push(message);
        Ok(self.chat.last())
    }

    //=====================================================================================
    // Countdown
    //=====================================================================================

    /// Returns `true` on the tick that ran the clock out.
    pub fn tick_countdown(&mut self, elapsed: Duration) -> bool {
        if self.phase != RoomPhase::InCall {
            return false;
        }
        self.countdown.tick(elapsed)
    }

    pub fn extend_countdown(&mut self, by: Duration) -> RoomResult<()> {
        self.require_in_call()?;
        self.countdown.extend(by);
        Ok(())
    }
}

impl Drop for VideoRoom {
    fn drop(&mut self) {
        self.release_media();
        if let Some(handle) = &self.tracked {
            warn!("Room dropped with tracked session {} still open", handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ParticipantRole;
    use crate::testing::{FakeGenerator, FakeMedia, FakeTracker};

    struct Harness {
        room: VideoRoom,
        tracker: Arc<FakeTracker>,
        media: Arc<FakeMedia>,
    }

    fn participant(name: &str) -> Participant {
        Participant {
            id: Uuid::new_v4(),
            display_name: name.to_string(),
            role: ParticipantRole::Guest,
            avatar_ref: String::new(),
        }
    }

    fn harness_with(tracker: FakeTracker, media: FakeMedia, generator: FakeGenerator) -> Harness {
        let tracker = Arc::new(tracker);
        let media = Arc::new(media);
        let ports = RoomPorts {
            tracker: tracker.clone(),
            media: media.clone(),
            generator: Arc::new(generator),
        };
        let local = LocalUser {
            id: Uuid::new_v4(),
            display_name: "Ada".into(),
        };
        let countdown = CountdownConfig::new(
            Duration::from_secs(60),
            Duration::from_secs(120),
            Duration::from_secs(1),
        );
        Harness {
            room: VideoRoom::new(local, participant("Grace"), ports, countdown),
            tracker,
            media,
        }
    }

    async fn started() -> Harness {
        let mut h = harness_with(
            FakeTracker::default(),
            FakeMedia::default(),
            FakeGenerator::default(),
        );
        h.room.start().await.unwrap();
        h
    }

    #[tokio::test]
    async fn start_tracks_the_session() {
        let h = started().await;
        assert_eq!(h.room.phase(), RoomPhase::InCall);
        assert!(h.room.tracked_session().is_some());
        assert_eq!(h.room.roster().len(), 1);
        assert_eq!(h.room.chat()[0].sender_name, SYSTEM_SENDER_NAME);
    }

    #[tokio::test]
    async fn tracker_failure_is_not_fatal() {
        let mut h = harness_with(
            FakeTracker {
                fail_start: true,
                ..Default::default()
            },
            FakeMedia::default(),
            FakeGenerator::default(),
        );
        h.room.start().await.unwrap();
        assert_eq!(h.room.phase(), RoomPhase::InCall);
        assert!(h.room.tracked_session().is_none());

        h.room.end_call().await.unwrap();
        assert_eq!(h.tracker.end_count(), 0);
    }

    #[tokio::test]
    async fn starting_twice_is_rejected() {
        let mut h = started().await;
        assert!(matches!(h.room.start().await, Err(RoomError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn toggling_a_goal_twice_restores_it() {
        let mut h = started().await;
        let id = h.room.add_goal("Agree on pilot scope").unwrap().unwrap();
        let before = h.room.goals().to_vec();
        assert!(h.room.toggle_goal(id).unwrap());
        assert!(h.room.goals()[0].completed);
        h.room.toggle_goal(id).unwrap();
        assert_eq!(h.room.goals(), before.as_slice());
        assert!(!h.room.toggle_goal(Uuid::new_v4()).unwrap());
    }

    #[tokio::test]
    async fn blank_goal_is_ignored() {
        let mut h = started().await;
        assert_eq!(h.room.add_goal("   ").unwrap(), None);
        assert!(h.room.goals().is_empty());
    }

    #[tokio::test]
    async fn suggested_goals_are_appended_incomplete() {
        let mut h = harness_with(
            FakeTracker::default(),
            FakeMedia::default(),
            FakeGenerator {
                suggestions: vec!["Define ICP".into(), " ".into(), "Pick a launch date".into()],
                ..Default::default()
            },
        );
        h.room.start().await.unwrap();
        h.room.add_goal("Intro").unwrap();
        assert_eq!(h.room.suggest_goals("go-to-market").await.unwrap(), 2);
        let texts: Vec<_> = h.room.goals().iter().map(|g| g.text.as_str()).collect();
        assert_eq!(texts, ["Intro", "Define ICP", "Pick a launch date"]);
        assert!(h.room.goals().iter().all(|g| !g.completed));
    }

    #[tokio::test]
    async fn chat_appends_local_messages_only_when_non_blank() {
        let mut h = started().await;
        h.room.set_chat_input("   ");
        assert!(h.room.send_chat().unwrap().is_none());
        assert_eq!(h.room.chat().len(), 1);

        h.room.set_chat_input("hello");
        let sent = h.room.send_chat().unwrap().cloned().unwrap();
        assert_eq!(sent.text, "hello");
        assert_eq!(sent.sender_id, h.room.session().local_participant_id);
        assert_eq!(h.room.chat().len(), 2);
        assert!(h.room.snapshot().chat_input.is_empty());
    }

    #[tokio::test]
    async fn duplicate_invite_is_a_no_op() {
        let mut h = started().await;
        let guest = participant("Linus");
        assert!(h.room.invite(guest.clone()).unwrap());
        let order: Vec<_> = h.room.roster().iter().map(|p| p.id).collect();
        assert!(!h.room.invite(guest).unwrap());
        let after: Vec<_> = h.room.roster().iter().map(|p| p.id).collect();
        assert_eq!(order, after);
    }

    #[tokio::test]
    async fn local_user_never_joins_the_roster() {
        let mut h = started().await;
        let me = Participant {
            id: h.room.session().local_participant_id,
            ..participant("Ada")
        };
        assert!(!h.room.invite(me).unwrap());
        assert_eq!(h.room.roster().len(), 1);
    }

    #[tokio::test]
    async fn screen_share_locks_the_camera_toggle() {
        let mut h = started().await;
        assert!(matches!(
            h.room.toggle_screen_share().await.unwrap(),
            ShareToggle::Started(_)
        ));
        assert_eq!(h.room.media().local_feed(), LocalFeed::Screen);

        assert!(h.room.toggle_camera().unwrap());
        assert!(h.room.media().cam_enabled);

        assert!(matches!(
            h.room.toggle_screen_share().await.unwrap(),
            ShareToggle::Stopped
        ));
        assert!(h.media.last_screen_stopped());
        assert!(!h.room.toggle_camera().unwrap());
        assert_eq!(h.room.media().local_feed(), LocalFeed::Off);
    }

    #[tokio::test]
    async fn platform_stop_resets_screen_share() {
        let mut h = started().await;
        let ShareToggle::Started(watch) = h.room.toggle_screen_share().await.unwrap() else {
            panic!("capture should be granted");
        };
        h.media.stop_sharing_from_platform();
        let id = watch.wait().await;
        assert!(h.room.screen_share_ended(id));
        assert!(!h.room.media().screen_share_active);
        assert!(!h.room.screen_share_ended(id));
    }

    #[tokio::test]
    async fn refused_capture_leaves_state_unchanged() {
        let mut h = harness_with(
            FakeTracker::default(),
            FakeMedia {
                deny_screen: true,
                ..Default::default()
            },
            FakeGenerator::default(),
        );
        h.room.start().await.unwrap();
        let before = h.room.media();
        assert!(matches!(
            h.room.toggle_screen_share().await.unwrap(),
            ShareToggle::Refused
        ));
        assert_eq!(h.room.media(), before);
    }

    #[tokio::test]
    async fn direct_end_closes_tracked_session_once() {
        let mut h = started().await;
        assert_eq!(h.room.end_call().await.unwrap(), RoomExit::CallEnded);
        assert_eq!(h.room.phase(), RoomPhase::Closed);
        assert!(h.room.end_call().await.is_err());
        assert!(h.room.add_goal("late").is_err());
        assert_eq!(h.tracker.end_count(), 1);
        assert!(h.room.session().ended_at.is_some());
    }

    #[tokio::test]
    async fn summary_defers_closing_until_return() {
        let mut h = started().await;
        let id = h.room.add_goal("Ship beta").unwrap().unwrap();
        h.room.add_goal("Hire designer").unwrap();
        h.room.toggle_goal(id).unwrap();
        h.room.set_notes("Follow up next week").unwrap();
        h.room.toggle_screen_share().await.unwrap();

        let SummaryOutcome::Shown(summary) = h.room.end_call_with_summary().await.unwrap() else {
            panic!("summary should be shown");
        };
        assert_eq!(summary.goals_completed_count, 1);
        assert_eq!(summary.goals_total_count, 2);
        assert!(summary.text.contains("Follow up next week"));
        assert!(h.media.last_screen_stopped());
        assert_eq!(h.room.phase(), RoomPhase::SummaryShown);
        assert_eq!(h.tracker.end_count(), 0);

        assert!(h.room.end_call().await.is_err());
        assert_eq!(
            h.room.return_to_dashboard().await.unwrap(),
            RoomExit::ReturnToDashboard
        );
        assert_eq!(h.tracker.end_count(), 1);
    }

    #[tokio::test]
    async fn failed_summary_falls_back_to_direct_end() {
        let mut h = harness_with(
            FakeTracker::default(),
            FakeMedia::default(),
            FakeGenerator {
                fail: true,
                ..Default::default()
            },
        );
        h.room.start().await.unwrap();
        let outcome = h.room.end_call_with_summary().await.unwrap();
        assert!(matches!(outcome, SummaryOutcome::Ended(RoomExit::CallEnded)));
        assert_eq!(h.room.phase(), RoomPhase::Closed);
        assert!(h.room.return_to_dashboard().await.is_err());
        assert_eq!(h.tracker.end_count(), 1);
    }

    #[tokio::test]
    async fn tracker_end_failure_does_not_block_exit() {
        let mut h = harness_with(
            FakeTracker {
                fail_end: true,
                ..Default::default()
            },
            FakeMedia::default(),
            FakeGenerator::default(),
        );
        h.room.start().await.unwrap();
        assert_eq!(h.room.end_call().await.unwrap(), RoomExit::CallEnded);
        assert_eq!(h.tracker.end_count(), 1);
    }

    #[tokio::test]
    async fn no_mutations_while_summary_is_pending() {
        let mut h = started().await;
        h.room.begin_summary().unwrap();
        assert_eq!(h.room.phase(), RoomPhase::SummaryPending);
        assert!(h.room.toggle_mic().is_err());
        assert!(h.room.add_goal("too late").is_err());
    }

    #[tokio::test]
    async fn end_call_waits_for_a_pending_summary() {
        let mut h = started().await;
        let request = h.room.begin_summary().unwrap();
        assert!(matches!(
            h.room.end_call().await,
            Err(RoomError::InvalidPhase(RoomPhase::SummaryPending))
        ));
        assert_eq!(h.tracker.end_count(), 0);

        let outcome = h
            .room
            .finish_summary(Ok(format!("{} goals reviewed", request.goals.len())))
            .await
            .unwrap();
        assert!(matches!(outcome, SummaryOutcome::Shown(_)));
        assert_eq!(h.room.phase(), RoomPhase::SummaryShown);
    }

    #[tokio::test]
    async fn countdown_only_runs_in_call() {
        let mut h = harness_with(
            FakeTracker::default(),
            FakeMedia::default(),
            FakeGenerator::default(),
        );
        assert!(!h.room.tick_countdown(Duration::from_secs(60)));
        h.room.start().await.unwrap();
        h.room.extend_countdown(Duration::from_secs(600)).unwrap();
        assert_eq!(h.room.countdown().remaining(), Duration::from_secs(120));
        assert!(h.room.tick_countdown(Duration::from_secs(120)));
        assert!(h.room.snapshot().time_up);
    }

    #[tokio::test]
    async fn dropping_the_room_releases_the_capture() {
        let mut h = started().await;
        h.room.toggle_screen_share().await.unwrap();
        let media = h.media.clone();
        drop(h);
        assert!(media.last_screen_stopped());
    }
}
