//! crates/kova_core/src/swipe_deck.rs
//!
//! The discovery card stack. The head card is removed as soon as a swipe is
//! issued and put back if the swipe could not be recorded.

use crate::domain::{Profile, SwipeDirection};
use crate::ports::{PortError, SwipeStore};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    #[error("No more profiles to show")]
    Empty,
    #[error("Could not record swipe: {0}")]
    NotRecorded(#[from] PortError),
}

pub struct SwipeDeck {
    me: Uuid,
    queue: VecDeque<Profile>,
    store: Arc<dyn SwipeStore>,
}

impl SwipeDeck {
    pub fn new(me: Uuid, store: Arc<dyn SwipeStore>) -> Self {
        Self {
            me,
            queue: VecDeque::new(),
            store,
        }
    }

    /// Replaces the queue with freshly loaded candidates. The user's own profile is dropped.
    pub fn load(&mut self, candidates: Vec<Profile>) {
        let me = self.me;
        self.queue = candidates.into_iter().filter(|p| p.id != me).collect();
    }

    pub fn current(&self) -> Option<&Profile> {
        self.queue.front()
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Profile> {
        self.queue.iter()
    }

    /// Swipes on the head card and returns it.
    ///
    /// Matches are not created here; reciprocal right swipes become matches in storage.
    pub async fn swipe(&mut self, direction: SwipeDirection) -> Result<Profile, DeckError> {
        let candidate = self.queue.pop_front().ok_or(DeckError::Empty)?;
        match self
            .store
            .record_swipe(self.me, candidate.id, direction)
            .await
        {
            Ok(()) => {
                info!(
                    "{} swiped {} on {}",
                    self.me,
                    direction.as_str(),
                    candidate.id
                );
                Ok(candidate)
            }
            Err(e) => {
                warn!("Swipe on {} failed, restoring card: {}", candidate.id, e);
                self.queue.push_front(candidate);
                Err(DeckError::NotRecorded(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{profile, MemoryBackend};
    use std::sync::atomic::Ordering;

    fn deck_with(names: &[&str]) -> (SwipeDeck, Arc<MemoryBackend>, Vec<Profile>) {
        let me = Uuid::new_v4();
        let backend = Arc::new(MemoryBackend::default());
        let profiles: Vec<_> = names.iter().map(|n| profile(n)).collect();
        let mut deck = SwipeDeck::new(me, backend.clone());
        deck.load(profiles.clone());
        (deck, backend, profiles)
    }

    #[tokio::test]
    async fn swipe_advances_and_records() {
        let (mut deck, backend, profiles) = deck_with(&["Ada", "Grace"]);
        let swiped = deck.swipe(SwipeDirection::Right).await.unwrap();
        assert_eq!(swiped.id, profiles[0].id);
        assert_eq!(deck.current().map(|p| p.id), Some(profiles[1].id));

        let swipes = backend.swipes.lock().unwrap();
        assert_eq!(swipes.len(), 1);
        assert_eq!(swipes[0].1, profiles[0].id);
        assert_eq!(swipes[0].2, SwipeDirection::Right);
    }

    #[tokio::test]
    async fn failed_swipe_restores_the_card() {
        let (mut deck, backend, profiles) = deck_with(&["Ada", "Grace"]);
        backend.fail_swipes.store(true, Ordering::SeqCst);
        assert!(matches!(
            deck.swipe(SwipeDirection::Left).await,
            Err(DeckError::NotRecorded(_))
        ));
        assert_eq!(deck.remaining(), 2);
        assert_eq!(deck.current().map(|p| p.id), Some(profiles[0].id));
    }

    #[tokio::test]
    async fn empty_deck_cannot_be_swiped() {
        let (mut deck, _, _) = deck_with(&[]);
        assert!(matches!(
            deck.swipe(SwipeDirection::Right).await,
            Err(DeckError::Empty)
        ));
    }

    #[test]
    fn own_profile_is_never_dealt() {
        let me = Uuid::new_v4();
        let mut own = profile("Me");
        own.id = me;
        let mut deck = SwipeDeck::new(me, Arc::new(MemoryBackend::default()));
        deck.load(vec![own, profile("Ada")]);
        assert_eq!(deck.remaining(), 1);
        assert!(deck.candidates().all(|p| p.id != me));
    }
}
