//! crates/kova_core/src/app_session.rs
//!
//! Per-user state shared by the signed-in screens: the user's own profile, the
//! discovery deck and the match list. Each screen asks for a refresh when it is
//! shown; a failed refresh keeps whatever was loaded before.

use crate::domain::{Match, MatchRecord, Profile, ProfileUpdate, SwipeDirection};
use crate::ports::{MatchStore, PortError, PortResult, ProfileStore, SwipeStore};
use crate::swipe_deck::{DeckError, SwipeDeck};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Discover,
    Matches,
    Dashboard,
    VideoRoom,
    Profile,
}

#[derive(Clone)]
pub struct AppPorts {
    pub profiles: Arc<dyn ProfileStore>,
    pub matches: Arc<dyn MatchStore>,
    pub swipes: Arc<dyn SwipeStore>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("You cannot connect with yourself")]
    SelfConnection,
    #[error("No user with that ID")]
    UnknownProfile,
    #[error("Could not connect: {0}")]
    Failed(#[from] PortError),
}

pub struct AppSession {
    me: Profile,
    deck: SwipeDeck,
    matches: Vec<Match>,
    ports: AppPorts,
}

impl AppSession {
    pub fn new(me: Profile, ports: AppPorts) -> Self {
        Self {
            deck: SwipeDeck::new(me.id, ports.swipes.clone()),
            me,
            matches: Vec::new(),
            ports,
        }
    }

    pub fn me(&self) -> &Profile {
        &self.me
    }

    pub fn deck(&self) -> &SwipeDeck {
        &self.deck
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub async fn refresh_for(&mut self, screen: Screen) {
        let result = match screen {
            Screen::Discover => self.refresh_candidates().await,
            Screen::Matches | Screen::Dashboard => self.refresh_matches().await,
            Screen::VideoRoom | Screen::Profile => Ok(()),
        };
        if let Err(e) = result {
            error!("Refresh for {:?} failed, keeping previous data: {}", screen, e);
        }
    }

    async fn refresh_candidates(&mut self) -> PortResult<()> {
        let me = self.me.id;
        let mut excluding: HashSet<Uuid> =
            self.ports.swipes.swiped_ids(me).await?.into_iter().collect();
        excluding.extend(
            self.ports
                .matches
                .list_matches_for(me)
                .await?
                .iter()
                .map(|m| m.partner_of(me)),
        );
        excluding.insert(me);

        let candidates = self.ports.profiles.list_candidates(&excluding).await?;
        info!("Loaded {} discovery candidates for {}", candidates.len(), me);
        self.deck.load(candidates);
        Ok(())
    }

    async fn refresh_matches(&mut self) -> PortResult<()> {
        let records = self.ports.matches.list_matches_for(self.me.id).await?;
        let mut matches = Vec::with_capacity(records.len());
        for record in records {
            if let Some(found) = self.resolve(record).await {
                matches.push(found);
            }
        }
        self.matches = matches;
        Ok(())
    }

    /// Attaches the partner profile. A match whose partner cannot be loaded is skipped.
    async fn resolve(&self, record: MatchRecord) -> Option<Match> {
        let partner_id = record.partner_of(self.me.id);
        match self.ports.profiles.fetch_profile(partner_id).await {
            Ok(partner) => Some(Match { record, partner }),
            Err(e) => {
                warn!(
                    "Skipping match {}: partner {} unavailable: {}",
                    record.id, partner_id, e
                );
                None
            }
        }
    }

    pub async fn swipe(&mut self, direction: SwipeDirection) -> Result<Profile, DeckError> {
        self.deck.swipe(direction).await
    }

    /// Connects directly with a user by id, reusing an existing match if there is one.
    pub async fn connect_by_id(&mut self, other: Uuid) -> Result<Match, ConnectError> {
        let me = self.me.id;
        if other == me {
            return Err(ConnectError::SelfConnection);
        }
        let partner = match self.ports.profiles.fetch_profile(other).await {
            Ok(profile) => profile,
            Err(PortError::NotFound(_)) => return Err(ConnectError::UnknownProfile),
            Err(e) => return Err(e.into()),
        };

        let record = match self.ports.matches.find_existing_match(me, other).await? {
            Some(existing) => existing,
            None => {
                let created = self.ports.matches.create_match(me, other).await?;
                info!("{} connected with {} by id", me, other);
                created
            }
        };

        if let Err(e) = self.refresh_matches().await {
            error!("Could not refresh matches after connecting: {}", e);
        }
        Ok(Match { record, partner })
    }

    /// Saves profile edits and keeps the in-memory copy in step.
    pub async fn update_profile(&mut self, fields: &ProfileUpdate) -> PortResult<&Profile> {
        self.me = self.ports.profiles.update_profile(self.me.id, fields).await?;
        Ok(&self.me)
    }

    pub fn find_match(&self, partner_id: Uuid) -> Option<&Match> {
        self.matches.iter().find(|m| m.partner.id == partner_id)
    }
}
