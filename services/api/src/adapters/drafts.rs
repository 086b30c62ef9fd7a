//! services/api/src/adapters/drafts.rs
//!
//! Registration drafts kept as JSON per browser, the server-side stand-in for the
//! tab's session storage. Drafts are lost on restart, and drafts nobody has saved
//! to for a while are swept by `evict_older_than`.

use kova_core::ports::{DraftStore, PortError, PortResult};
use kova_core::registration::RegistrationDraft;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::warn;
use uuid::Uuid;

struct Slot {
    json: String,
    saved_at: Instant,
}

type Slots = Arc<Mutex<HashMap<Uuid, Slot>>>;

/// All drafts, keyed by the browser's wizard id.
#[derive(Clone, Default)]
pub struct DraftVault {
    slots: Slots,
}

impl DraftVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store one wizard writes through.
    pub fn store_for(&self, wizard_id: Uuid) -> Arc<dyn DraftStore> {
        Arc::new(VaultDraftStore {
            wizard_id,
            slots: self.slots.clone(),
        })
    }

    /// Drops drafts last saved before `cutoff`. Returns how many went.
    pub fn evict_older_than(&self, cutoff: Instant) -> usize {
        let Ok(mut slots) = self.slots.lock() else {
            return 0;
        };
        let before = slots.len();
        slots.retain(|_, slot| slot.saved_at >= cutoff);
        before - slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct VaultDraftStore {
    wizard_id: Uuid,
    slots: Slots,
}

impl DraftStore for VaultDraftStore {
    fn load(&self) -> Option<RegistrationDraft> {
        let raw = self.slots.lock().ok()?.get(&self.wizard_id)?.json.clone();
        match serde_json::from_str(&raw) {
            Ok(draft) => Some(draft),
            Err(e) => {
                warn!("Discarding unreadable draft {}: {}", self.wizard_id, e);
                None
            }
        }
    }

    fn save(&self, draft: &RegistrationDraft) -> PortResult<()> {
        let json = serde_json::to_string(draft).map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.slots
            .lock()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .insert(
                self.wizard_id,
                Slot {
                    json,
                    saved_at: Instant::now(),
                },
            );
        Ok(())
    }

    fn clear(&self) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.remove(&self.wizard_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn drafts_are_isolated_per_wizard() {
        let vault = DraftVault::new();
        let a = vault.store_for(Uuid::new_v4());
        let b = vault.store_for(Uuid::new_v4());

        let draft = RegistrationDraft {
            name: "Ada".into(),
            password: "secret1".into(),
            ..Default::default()
        };
        a.save(&draft).unwrap();

        let loaded = a.load().unwrap();
        assert_eq!(loaded.name, "Ada");
        assert!(loaded.password.is_empty());
        assert!(b.load().is_none());

        a.clear();
        assert!(a.load().is_none());
        assert!(vault.is_empty());
    }

    #[test]
    fn corrupt_drafts_are_discarded() {
        let vault = DraftVault::new();
        let id = Uuid::new_v4();
        vault.slots.lock().unwrap().insert(
            id,
            Slot {
                json: "{not json".into(),
                saved_at: Instant::now(),
            },
        );
        assert!(vault.store_for(id).load().is_none());
    }

    #[test]
    fn stale_drafts_are_swept() {
        let vault = DraftVault::new();
        let store = vault.store_for(Uuid::new_v4());
        let before_save = Instant::now();
        store.save(&RegistrationDraft::default()).unwrap();

        assert_eq!(vault.evict_older_than(before_save), 0);
        assert_eq!(vault.len(), 1);
        assert_eq!(vault.evict_older_than(Instant::now() + Duration::from_secs(1)), 1);
        assert!(store.load().is_none());
    }
}
