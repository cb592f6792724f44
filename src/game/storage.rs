//! Local persistent storage, one JSON entry per identity.
//!
//! Key format: `<prefix>` in guest mode (or before anyone signs in),
//! `<prefix>-<uid>` once an identity is active. In the browser the backend
//! is `window.localStorage`; tests use `MemoryStorage`.
//!
//! Reads never fail from the caller's point of view: a missing, unreadable
//! or malformed entry just means "no saved data". Writes go through the
//! anti-clobber guard, which refuses to save a fresh-looking state while
//! the signed-in user's real progress may still be on its way.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Result, SyncError};
use crate::game::snapshot::{self, RawSnapshot};
use crate::game::state::GameState;

/// Synchronous key-value backend.
pub trait LocalStore {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory backend. Clones share the same map, so a test can keep one
/// handle for inspection while the store owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Rc<RefCell<HashMap<String, String>>>,
    fail_writes: Rc<Cell<bool>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a full or blocked storage area.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }
}

impl LocalStore for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.get() {
            return Err(SyncError::Storage("quota exceeded".into()));
        }
        self.items.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Storage key for an identity (or the shared guest key).
pub fn storage_key(prefix: &str, uid: Option<&str>) -> String {
    match uid {
        Some(uid) => format!("{}-{}", prefix, uid),
        None => prefix.to_string(),
    }
}

/// What happened to a persist request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Blocked by the anti-clobber guard.
    Suppressed,
    /// The backend refused the write; in-memory state is untouched.
    Failed,
}

/// Game-state persistence on top of a `LocalStore` backend.
#[derive(Clone)]
pub struct GameStorage {
    backend: Rc<dyn LocalStore>,
    prefix: String,
}

impl GameStorage {
    pub fn new(backend: Rc<dyn LocalStore>, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
        }
    }

    pub fn key_for(&self, uid: Option<&str>) -> String {
        storage_key(&self.prefix, uid)
    }

    /// Read the saved snapshot for an identity. Any failure is logged and
    /// reported as "nothing saved".
    pub fn load(&self, uid: Option<&str>) -> Option<RawSnapshot> {
        let key = self.key_for(uid);
        let raw = match self.backend.get_item(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(%key, error = %e, "local read failed, using defaults");
                return None;
            }
        };
        match snapshot::decode_local_entry(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!(%key, error = %e, "ignoring unreadable local entry");
                None
            }
        }
    }

    /// Persist `state` under the identity's key.
    ///
    /// With an identity known but reconciliation still open, a state that
    /// looks like a fresh game is not written: it would overwrite saved
    /// progress with defaults.
    pub fn persist(&self, uid: Option<&str>, state: &GameState, reconciled: bool) -> WriteOutcome {
        let key = self.key_for(uid);
        if uid.is_some() && !reconciled && state.looks_default() {
            tracing::debug!(%key, "suppressed default-looking write before reconciliation");
            return WriteOutcome::Suppressed;
        }
        let encoded = match snapshot::encode_local_entry(state) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(%key, error = %e, "could not encode game state");
                return WriteOutcome::Failed;
            }
        };
        match self.backend.set_item(&key, &encoded) {
            Ok(()) => WriteOutcome::Written,
            Err(e) => {
                tracing::warn!(%key, error = %e, "local write failed");
                WriteOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "cto-simulator-game";

    fn storage() -> (MemoryStorage, GameStorage) {
        let mem = MemoryStorage::new();
        let storage = GameStorage::new(Rc::new(mem.clone()), PREFIX);
        (mem, storage)
    }

    #[test]
    fn keys_are_scoped_by_uid() {
        assert_eq!(storage_key(PREFIX, None), "cto-simulator-game");
        assert_eq!(storage_key(PREFIX, Some("abc")), "cto-simulator-game-abc");
    }

    #[test]
    fn persist_then_load() {
        let (_, storage) = storage();
        let mut state = GameState::default();
        state.add_xp(40);
        assert_eq!(storage.persist(Some("u1"), &state, true), WriteOutcome::Written);
        let loaded = storage.load(Some("u1")).unwrap();
        assert_eq!(loaded["totalXp"], 40);
        assert!(storage.load(Some("u2")).is_none());
        assert!(storage.load(None).is_none());
    }

    #[test]
    fn malformed_entry_reads_as_missing() {
        let (mem, storage) = storage();
        mem.set_item("cto-simulator-game-u1", "{not json").unwrap();
        assert!(storage.load(Some("u1")).is_none());
        mem.set_item("cto-simulator-game-u1", "[1,2,3]").unwrap();
        assert!(storage.load(Some("u1")).is_none());
    }

    #[test]
    fn default_state_is_not_written_before_reconciliation() {
        let (mem, storage) = storage();
        let mut saved = GameState::default();
        saved.add_xp(250);
        storage.persist(Some("u1"), &saved, true);

        let outcome = storage.persist(Some("u1"), &GameState::default(), false);
        assert_eq!(outcome, WriteOutcome::Suppressed);
        assert!(mem.raw("cto-simulator-game-u1").unwrap().contains("250"));
    }

    #[test]
    fn default_state_is_written_in_guest_mode_and_after_reconciliation() {
        let (_, storage) = storage();
        assert_eq!(storage.persist(None, &GameState::default(), false), WriteOutcome::Written);
        assert_eq!(storage.persist(Some("u1"), &GameState::default(), true), WriteOutcome::Written);
    }

    #[test]
    fn failed_write_is_reported_not_raised() {
        let (mem, storage) = storage();
        mem.set_fail_writes(true);
        let mut state = GameState::default();
        state.add_xp(1);
        assert_eq!(storage.persist(None, &state, true), WriteOutcome::Failed);
    }
}
