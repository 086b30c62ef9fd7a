//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-user, per-room and
//! per-wizard state it owns. Rooms and wizards nobody has touched for a while are
//! swept by a background task.

use crate::adapters::{DraftVault, RelayMediaPlatform};
use crate::config::Config;
use crate::web::{port_failure, HandlerError};
use axum::http::StatusCode;
use kova_core::app_session::{AppPorts, AppSession};
use kova_core::auth::AuthFlow;
use kova_core::ports::{
    GenerationService, GeocodingService, IdentityService, MatchStore, MediaPlatform, ProfileStore,
    SessionTracker, SwipeStore,
};
use kova_core::registration::RegistrationWizard;
use kova_core::video_room::{RoomPhase, RoomPorts, VideoRoom};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

pub type SharedSession = Arc<Mutex<AppSession>>;
pub type SharedRoom = Arc<Mutex<VideoRoom>>;
pub type SharedWizard = Arc<Mutex<RegistrationWizard>>;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// A cached wizard is dropped after this long; its draft stays in the vault.
pub const WIZARD_IDLE: Duration = Duration::from_secs(30 * 60);
pub const DRAFT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const ROOM_IDLE: Duration = Duration::from_secs(2 * 60 * 60);

//=========================================================================================
// Rooms (Live Calls)
//=========================================================================================

pub struct RoomEntry {
    pub owner: Uuid,
    pub room: SharedRoom,
    /// Stops the countdown task when the room closes.
    pub cancel: CancellationToken,
    last_touched: Instant,
}

impl RoomEntry {
    pub fn new(owner: Uuid, room: SharedRoom, cancel: CancellationToken) -> Self {
        Self {
            owner,
            room,
            cancel,
            last_touched: Instant::now(),
        }
    }
}

#[derive(Default)]
pub struct RoomRegistry {
    entries: Mutex<HashMap<Uuid, RoomEntry>>,
}

impl RoomRegistry {
    pub async fn insert(&self, room_id: Uuid, entry: RoomEntry) {
        self.entries.lock().await.insert(room_id, entry);
    }

    /// A live room, visible only to the user who opened it.
    pub async fn get(&self, room_id: Uuid, user_id: Uuid) -> Result<SharedRoom, HandlerError> {
        match self.entries.lock().await.get_mut(&room_id) {
            Some(entry) if entry.owner == user_id => {
                entry.last_touched = Instant::now();
                Ok(entry.room.clone())
            }
            _ => Err((StatusCode::NOT_FOUND, "Room not found".to_string())),
        }
    }

    /// Drops a finished room and stops its countdown.
    pub async fn close(&self, room_id: Uuid) {
        if let Some(entry) = self.entries.lock().await.remove(&room_id) {
            entry.cancel.cancel();
            info!("Room {} closed", room_id);
        }
    }

    /// Ends and drops rooms untouched for `idle`. Returns how many went.
    pub async fn evict_idle(&self, now: Instant, idle: Duration) -> usize {
        let stale: Vec<(Uuid, RoomEntry)> = {
            let mut entries = self.entries.lock().await;
            let ids: Vec<Uuid> = entries
                .iter()
                .filter(|(_, e)| now.saturating_duration_since(e.last_touched) >= idle)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| entries.remove(&id).map(|e| (id, e)))
                .collect()
        };

        let count = stale.len();
        for (room_id, entry) in stale {
            entry.cancel.cancel();
            let mut room = entry.room.lock().await;
            let closed = match room.phase() {
                RoomPhase::InCall => room.end_call().await.map(Some),
                RoomPhase::SummaryShown => room.return_to_dashboard().await.map(Some),
                _ => Ok(None),
            };
            if let Err(e) = closed {
                warn!("Could not close idle room {}: {}", room_id, e);
            }
            info!("Evicted idle room {}", room_id);
        }
        count
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

//=========================================================================================
// Registration Wizards
//=========================================================================================

struct WizardEntry {
    wizard: SharedWizard,
    last_touched: Instant,
}

pub struct WizardRegistry {
    entries: Mutex<HashMap<Uuid, WizardEntry>>,
    drafts: DraftVault,
    geocoder: Arc<dyn GeocodingService>,
}

impl WizardRegistry {
    pub fn new(drafts: DraftVault, geocoder: Arc<dyn GeocodingService>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            drafts,
            geocoder,
        }
    }

    /// The wizard for one browser. One that is not cached is mounted from its saved draft.
    pub async fn get(&self, wizard_id: Uuid) -> SharedWizard {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(wizard_id).or_insert_with(|| WizardEntry {
            wizard: Arc::new(Mutex::new(RegistrationWizard::mount(
                self.drafts.store_for(wizard_id),
                self.geocoder.clone(),
            ))),
            last_touched: Instant::now(),
        });
        entry.last_touched = Instant::now();
        entry.wizard.clone()
    }

    pub async fn forget(&self, wizard_id: Uuid) {
        self.entries.lock().await.remove(&wizard_id);
    }

    /// Uncaches wizards idle for `idle` and deletes drafts older than `draft_ttl`.
    pub async fn evict_idle(&self, now: Instant, idle: Duration, draft_ttl: Duration) -> usize {
        let evicted = {
            let mut entries = self.entries.lock().await;
            let before = entries.len();
            entries.retain(|_, e| now.saturating_duration_since(e.last_touched) < idle);
            before - entries.len()
        };
        if let Some(cutoff) = now.checked_sub(draft_ttl) {
            let dropped = self.drafts.evict_older_than(cutoff);
            if dropped > 0 {
                info!("Dropped {} abandoned registration drafts", dropped);
            }
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub identity: Arc<dyn IdentityService>,
    pub profiles: Arc<dyn ProfileStore>,
    pub matches: Arc<dyn MatchStore>,
    pub swipes: Arc<dyn SwipeStore>,
    pub tracker: Arc<dyn SessionTracker>,
    pub generator: Arc<dyn GenerationService>,
    pub geocoder: Arc<dyn GeocodingService>,
    pub media: Arc<RelayMediaPlatform>,
    pub sessions: Mutex<HashMap<Uuid, SharedSession>>,
    pub rooms: RoomRegistry,
    pub wizards: WizardRegistry,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        identity: Arc<dyn IdentityService>,
        profiles: Arc<dyn ProfileStore>,
        matches: Arc<dyn MatchStore>,
        swipes: Arc<dyn SwipeStore>,
        tracker: Arc<dyn SessionTracker>,
        generator: Arc<dyn GenerationService>,
        geocoder: Arc<dyn GeocodingService>,
        media: Arc<RelayMediaPlatform>,
    ) -> Self {
        Self {
            config,
            identity,
            profiles,
            matches,
            swipes,
            tracker,
            generator,
            wizards: WizardRegistry::new(DraftVault::new(), geocoder.clone()),
            geocoder,
            media,
            sessions: Mutex::new(HashMap::new()),
            rooms: RoomRegistry::default(),
        }
    }

    pub fn auth_flow(&self) -> AuthFlow {
        AuthFlow::new(self.identity.clone(), self.profiles.clone())
    }

    pub fn room_ports(&self) -> RoomPorts {
        let media: Arc<dyn MediaPlatform> = self.media.clone();
        RoomPorts {
            tracker: self.tracker.clone(),
            media,
            generator: self.generator.clone(),
        }
    }

    /// The signed-in screens' state for `user_id`, loaded on first use.
    pub async fn session_for(&self, user_id: Uuid) -> Result<SharedSession, HandlerError> {
        if let Some(existing) = self.sessions.lock().await.get(&user_id) {
            return Ok(existing.clone());
        }

        let me = self
            .profiles
            .fetch_profile(user_id)
            .await
            .map_err(|e| port_failure("Failed to load your profile", e))?;
        let ports = AppPorts {
            profiles: self.profiles.clone(),
            matches: self.matches.clone(),
            swipes: self.swipes.clone(),
        };

        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(AppSession::new(me, ports))));
        Ok(session.clone())
    }

    pub async fn forget_session(&self, user_id: Uuid) {
        self.sessions.lock().await.remove(&user_id);
    }

    pub async fn room_for(&self, room_id: Uuid, user_id: Uuid) -> Result<SharedRoom, HandlerError> {
        self.rooms.get(room_id, user_id).await
    }

    pub async fn close_room(&self, room_id: Uuid) {
        self.rooms.close(room_id).await
    }

    pub async fn wizard_for(&self, wizard_id: Uuid) -> SharedWizard {
        self.wizards.get(wizard_id).await
    }

    pub async fn forget_wizard(&self, wizard_id: Uuid) {
        self.wizards.forget(wizard_id).await
    }

    /// One pass of the idle sweep.
    pub async fn sweep(&self, now: Instant) {
        let rooms = self.rooms.evict_idle(now, ROOM_IDLE).await;
        let wizards = self.wizards.evict_idle(now, WIZARD_IDLE, DRAFT_TTL).await;
        if rooms + wizards > 0 {
            info!("Idle sweep: {} rooms, {} wizards", rooms, wizards);
        }
    }
}

/// Runs `AppState::sweep` every `every` for the life of the process.
pub fn spawn_sweeper(state: Arc<AppState>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            state.sweep(Instant::now()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::testing::{started_room, CountingTracker, EveryCityExists};
    use kova_core::registration::{DraftEdit, NextOutcome};

    fn registry() -> WizardRegistry {
        WizardRegistry::new(DraftVault::new(), Arc::new(EveryCityExists))
    }

    #[tokio::test]
    async fn uncached_wizard_resumes_from_its_saved_draft() {
        let wizards = registry();
        let id = Uuid::new_v4();
        let first = wizards.get(id).await;
        {
            let mut wizard = first.lock().await;
            wizard.apply(DraftEdit {
                name: Some("Ada Lovelace".into()),
                email: Some("ada@example.com".into()),
                password: Some("abc123".into()),
                confirm_password: Some("abc123".into()),
                security_answer: Some("Engines".into()),
                ..Default::default()
            });
            assert!(matches!(wizard.next().await, NextOutcome::Advanced(1)));
        }

        let later = Instant::now() + WIZARD_IDLE;
        assert_eq!(wizards.evict_idle(later, WIZARD_IDLE, DRAFT_TTL).await, 1);
        assert_eq!(wizards.len().await, 0);

        let resumed = wizards.get(id).await;
        assert!(!Arc::ptr_eq(&first, &resumed));
        let resumed = resumed.lock().await;
        assert_eq!(resumed.step(), 1);
        assert_eq!(resumed.draft().name, "Ada Lovelace");
        assert!(resumed.draft().password.is_empty());
    }

    #[tokio::test]
    async fn recently_used_wizards_stay_cached() {
        let wizards = registry();
        let id = Uuid::new_v4();
        let first = wizards.get(id).await;
        assert_eq!(
            wizards.evict_idle(Instant::now(), WIZARD_IDLE, DRAFT_TTL).await,
            0
        );
        assert!(Arc::ptr_eq(&first, &wizards.get(id).await));
    }

    #[tokio::test]
    async fn idle_rooms_are_ended_and_dropped() {
        let tracker = Arc::new(CountingTracker::default());
        let room = started_room(tracker.clone(), Duration::from_secs(60)).await;
        let rooms = RoomRegistry::default();
        let owner = Uuid::new_v4();
        let room_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let shared: SharedRoom = Arc::new(Mutex::new(room));
        rooms
            .insert(room_id, RoomEntry::new(owner, shared.clone(), cancel.clone()))
            .await;

        assert!(rooms.get(room_id, Uuid::new_v4()).await.is_err());
        assert_eq!(rooms.evict_idle(Instant::now(), ROOM_IDLE).await, 0);

        let later = Instant::now() + ROOM_IDLE;
        assert_eq!(rooms.evict_idle(later, ROOM_IDLE).await, 1);
        assert_eq!(rooms.len().await, 0);
        assert!(cancel.is_cancelled());
        assert_eq!(tracker.ended(), 1);
        assert_eq!(shared.lock().await.phase(), RoomPhase::Closed);
        assert!(rooms.get(room_id, owner).await.is_err());
    }
}
