//! In-memory port implementations shared by the unit tests of this crate.

use crate::domain::{
    Goal, Identity, MatchRecord, Profile, ProfileUpdate, RecoveryQuestion, SessionHandle,
    SwipeDirection,
};
use crate::ports::*;
use crate::registration::RegistrationDraft;
use async_trait::async_trait;
use chrono::Utc;
use futures::channel::oneshot;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub fn profile(name: &str) -> Profile {
    Profile {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        date_of_birth: None,
        city: "Austin".into(),
        state: "TX".into(),
        bio: String::new(),
        avatar_url: String::new(),
        photo_position: Default::default(),
        headline: String::new(),
        industry: String::new(),
        looking_for: String::new(),
        skills: Vec::new(),
        security_question: String::new(),
        created_at: Utc::now(),
    }
}

//=========================================================================================
// Drafts & Geocoding
//=========================================================================================

/// Stores the draft as JSON, like the browser's session storage would.
#[derive(Default)]
pub struct MemoryDraftStore {
    slot: Mutex<Option<String>>,
}

impl DraftStore for MemoryDraftStore {
    fn load(&self) -> Option<RegistrationDraft> {
        let slot = self.slot.lock().unwrap();
        slot.as_deref().and_then(|s| serde_json::from_str(s).ok())
    }

    fn save(&self, draft: &RegistrationDraft) -> PortResult<()> {
        let json =
            serde_json::to_string(draft).map_err(|e| PortError::Unexpected(e.to_string()))?;
        *self.slot.lock().unwrap() = Some(json);
        Ok(())
    }

    fn clear(&self) {
        *self.slot.lock().unwrap() = None;
    }
}

pub struct FakeGeocoder {
    answer: Option<bool>,
    pub calls: Arc<AtomicUsize>,
}

impl FakeGeocoder {
    pub fn found() -> Self {
        Self {
            answer: Some(true),
            calls: Arc::default(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            answer: Some(false),
            calls: Arc::default(),
        }
    }

    pub fn offline() -> Self {
        Self {
            answer: None,
            calls: Arc::default(),
        }
    }
}

#[async_trait]
impl GeocodingService for FakeGeocoder {
    async fn verify(&self, _city: &str, _state: Option<&str>) -> PortResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
            .ok_or_else(|| PortError::Network("connection refused".into()))
    }
}

//=========================================================================================
// Video Room Collaborators
//=========================================================================================

#[derive(Default)]
pub struct FakeTracker {
    pub fail_start: bool,
    pub fail_end: bool,
    pub started: AtomicUsize,
    pub ended: Mutex<Vec<SessionHandle>>,
}

impl FakeTracker {
    pub fn end_count(&self) -> usize {
        self.ended.lock().unwrap().len()
    }
}

#[async_trait]
impl SessionTracker for FakeTracker {
    async fn start(&self, _user_a: Uuid, _user_b: Uuid) -> PortResult<SessionHandle> {
        if self.fail_start {
            return Err(PortError::Network("tracker unreachable".into()));
        }
        let n = self.started.fetch_add(1, Ordering::SeqCst);
        Ok(SessionHandle(format!("session-{n}")))
    }

    async fn end(&self, handle: &SessionHandle) -> PortResult<()> {
        self.ended.lock().unwrap().push(handle.clone());
        if self.fail_end {
            return Err(PortError::Network("tracker unreachable".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeGenerator {
    pub fail: bool,
    pub suggestions: Vec<String>,
}

#[async_trait]
impl GenerationService for FakeGenerator {
    async fn suggest_goals(&self, _topic: &str) -> PortResult<Vec<String>> {
        if self.fail {
            return Err(PortError::Unexpected("model unavailable".into()));
        }
        Ok(self.suggestions.clone())
    }

    async fn summarize(&self, goals: &[Goal], notes: &str) -> PortResult<String> {
        if self.fail {
            return Err(PortError::Network("timed out".into()));
        }
        Ok(format!("{} goals discussed. Notes: {}", goals.len(), notes))
    }
}

pub struct FakeStream {
    id: Uuid,
    pub stopped: Arc<AtomicBool>,
}

impl MediaStream for FakeStream {
    fn id(&self) -> Uuid {
        self.id
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Grants or denies screen capture; keeps the sender of every granted capture so
/// tests can fire the platform "stop sharing" control.
#[derive(Default)]
pub struct FakeMedia {
    pub deny_screen: bool,
    pub end_senders: Mutex<Vec<oneshot::Sender<()>>>,
    pub screen_stopped: Mutex<Vec<Arc<AtomicBool>>>,
}

impl FakeMedia {
    pub fn stop_sharing_from_platform(&self) {
        if let Some(tx) = self.end_senders.lock().unwrap().pop() {
            let _ = tx.send(());
        }
    }

    pub fn last_screen_stopped(&self) -> bool {
        self.screen_stopped
            .lock()
            .unwrap()
            .last()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl MediaPlatform for FakeMedia {
    async fn open_user_media(&self) -> PortResult<Box<dyn MediaStream>> {
        Ok(Box::new(FakeStream {
            id: Uuid::new_v4(),
            stopped: Arc::default(),
        }))
    }

    async fn request_screen_capture(&self) -> PortResult<ScreenCapture> {
        if self.deny_screen {
            return Err(PortError::PermissionDenied);
        }
        let (tx, rx) = oneshot::channel();
        let stopped = Arc::new(AtomicBool::new(false));
        self.end_senders.lock().unwrap().push(tx);
        self.screen_stopped.lock().unwrap().push(stopped.clone());
        Ok(ScreenCapture {
            stream: Box::new(FakeStream {
                id: Uuid::new_v4(),
                stopped,
            }),
            ended: rx,
        })
    }
}

//=========================================================================================
// Identity & Row Storage
//=========================================================================================

#[derive(Default)]
pub struct FakeIdentity {
    accounts: Mutex<HashMap<String, (Identity, String)>>,
    tokens: Mutex<HashMap<String, Identity>>,
    listeners: Mutex<Vec<IdentityListener>>,
}

impl FakeIdentity {
    fn notify(&self, event: IdentityEvent) {
        for listener in self.listeners.lock().unwrap().iter() {
            listener(&event);
        }
    }

    fn issue(&self, identity: Identity) -> SignedIn {
        let token = AuthToken(Uuid::new_v4().to_string());
        self.tokens
            .lock()
            .unwrap()
            .insert(token.0.clone(), identity.clone());
        self.notify(IdentityEvent::SignedIn(identity.clone()));
        SignedIn { identity, token }
    }
}

#[async_trait]
impl IdentityService for FakeIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> PortResult<SignedIn> {
        let found = self.accounts.lock().unwrap().get(email).cloned();
        match found {
            Some((identity, stored)) if stored == password => Ok(self.issue(identity)),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _recovery: Option<&RecoveryQuestion>,
    ) -> PortResult<SignedIn> {
        let identity = {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.contains_key(email) {
                return Err(PortError::Conflict(email.to_string()));
            }
            let identity = Identity {
                id: Uuid::new_v4(),
                email: email.to_string(),
            };
            accounts.insert(email.to_string(), (identity.clone(), password.to_string()));
            identity
        };
        Ok(self.issue(identity))
    }

    async fn current_session(&self, token: &AuthToken) -> PortResult<Option<Identity>> {
        Ok(self.tokens.lock().unwrap().get(&token.0).cloned())
    }

    fn on_identity_change(&self, listener: IdentityListener) {
        self.listeners.lock().unwrap().push(listener);
    }

    async fn sign_out(&self, token: &AuthToken) -> PortResult<()> {
        let removed = self.tokens.lock().unwrap().remove(&token.0);
        if let Some(identity) = removed {
            self.notify(IdentityEvent::SignedOut(identity.id));
        }
        Ok(())
    }
}

/// Profiles, matches and swipes in one place, with switches to make writes fail.
#[derive(Default)]
pub struct MemoryBackend {
    pub profiles: Mutex<Vec<Profile>>,
    pub matches: Mutex<Vec<MatchRecord>>,
    pub swipes: Mutex<Vec<(Uuid, Uuid, SwipeDirection)>>,
    pub fail_swipes: AtomicBool,
    pub fail_reads: AtomicBool,
}

impl MemoryBackend {
    pub fn with_profiles(profiles: Vec<Profile>) -> Self {
        Self {
            profiles: Mutex::new(profiles),
            ..Default::default()
        }
    }

    fn check_reads(&self) -> PortResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PortError::Network("offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryBackend {
    async fn fetch_profile(&self, id: Uuid) -> PortResult<Profile> {
        self.check_reads()?;
        self.profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Profile {id} not found")))
    }

    async fn insert_profile(&self, profile: &Profile) -> PortResult<()> {
        self.profiles.lock().unwrap().push(profile.clone());
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, fields: &ProfileUpdate) -> PortResult<Profile> {
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Profile {id} not found")))?;
        if let Some(bio) = &fields.bio {
            profile.bio = bio.clone();
        }
        if let Some(name) = &fields.name {
            profile.name = name.clone();
        }
        Ok(profile.clone())
    }

    async fn list_candidates(&self, excluding: &HashSet<Uuid>) -> PortResult<Vec<Profile>> {
        self.check_reads()?;
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .filter(|p| !excluding.contains(&p.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MatchStore for MemoryBackend {
    async fn list_matches_for(&self, user_id: Uuid) -> PortResult<Vec<MatchRecord>> {
        self.check_reads()?;
        Ok(self
            .matches
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.involves(user_id))
            .cloned()
            .collect())
    }

    async fn create_match(&self, user_a: Uuid, user_b: Uuid) -> PortResult<MatchRecord> {
        let record = MatchRecord {
            id: Uuid::new_v4(),
            user_a,
            user_b,
            created_at: Utc::now(),
        };
        self.matches.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn find_existing_match(
        &self,
        user_a: Uuid,
        user_b: Uuid,
    ) -> PortResult<Option<MatchRecord>> {
        Ok(self
            .matches
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.involves(user_a) && m.involves(user_b))
            .cloned())
    }
}

#[async_trait]
impl SwipeStore for MemoryBackend {
    async fn record_swipe(
        &self,
        swiper_id: Uuid,
        swiped_id: Uuid,
        direction: SwipeDirection,
    ) -> PortResult<()> {
        if self.fail_swipes.load(Ordering::SeqCst) {
            return Err(PortError::Network("write failed".into()));
        }
        self.swipes
            .lock()
            .unwrap()
            .push((swiper_id, swiped_id, direction));
        Ok(())
    }

    async fn swiped_ids(&self, swiper_id: Uuid) -> PortResult<Vec<Uuid>> {
        self.check_reads()?;
        Ok(self
            .swipes
            .lock()
            .unwrap()
            .iter()
            .filter(|(swiper, _, _)| *swiper == swiper_id)
            .map(|(_, swiped, _)| *swiped)
            .collect())
    }
}
