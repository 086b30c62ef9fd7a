//! Port fakes for the host's unit tests.

use crate::adapters::RelayMediaPlatform;
use async_trait::async_trait;
use kova_core::countdown::CountdownConfig;
use kova_core::domain::{Goal, Participant, ParticipantRole, SessionHandle};
use kova_core::ports::{GenerationService, GeocodingService, PortResult, SessionTracker};
use kova_core::video_room::{LocalUser, RoomPorts, VideoRoom};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
pub struct CountingTracker {
    ended: AtomicUsize,
}

impl CountingTracker {
    pub fn ended(&self) -> usize {
        self.ended.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionTracker for CountingTracker {
    async fn start(&self, _user_a: Uuid, _user_b: Uuid) -> PortResult<SessionHandle> {
        Ok(SessionHandle(Uuid::new_v4().to_string()))
    }

    async fn end(&self, _handle: &SessionHandle) -> PortResult<()> {
        self.ended.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct EchoGenerator;

#[async_trait]
impl GenerationService for EchoGenerator {
    async fn suggest_goals(&self, topic: &str) -> PortResult<Vec<String>> {
        Ok(vec![format!("Talk about {topic}")])
    }

    async fn summarize(&self, goals: &[Goal], _notes: &str) -> PortResult<String> {
        Ok(format!("{} goals", goals.len()))
    }
}

pub struct EveryCityExists;

#[async_trait]
impl GeocodingService for EveryCityExists {
    async fn verify(&self, _city: &str, _state: Option<&str>) -> PortResult<bool> {
        Ok(true)
    }
}

/// A started room with a countdown of `length`.
pub async fn started_room(tracker: Arc<CountingTracker>, length: Duration) -> VideoRoom {
    let ports = RoomPorts {
        tracker,
        media: Arc::new(RelayMediaPlatform::new(true)),
        generator: Arc::new(EchoGenerator),
    };
    let local = LocalUser {
        id: Uuid::new_v4(),
        display_name: "Ada".into(),
    };
    let partner = Participant {
        id: Uuid::new_v4(),
        display_name: "Grace".into(),
        role: ParticipantRole::Guest,
        avatar_ref: String::new(),
    };
    let mut room = VideoRoom::new(
        local,
        partner,
        ports,
        CountdownConfig::new(length, length, Duration::from_secs(1)),
    );
    room.start().await.unwrap();
    room
}
