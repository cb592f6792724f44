//! Remote per-user document store.
//!
//! The browser implementation talks to the hosted document database through
//! JS callbacks (see `web.rs`). `MemoryRemote` is an in-process stand-in
//! that can answer, fail, hang forever, or hold reads until released.

use async_trait::async_trait;
use futures::channel::oneshot;
use futures::future;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Result, SyncError};
use crate::game::snapshot::RemoteDocument;

#[async_trait(?Send)]
pub trait RemoteStore {
    /// Fetch the whole user document, `Ok(None)` if it does not exist.
    async fn load(&self, uid: &str) -> Result<Option<Value>>;

    /// Merge `document` into the user's document.
    async fn save(&self, uid: &str, document: &RemoteDocument) -> Result<()>;
}

/// How `MemoryRemote` answers reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadBehavior {
    Answer,
    Fail,
    /// Never resolves, like a request swallowed by a content blocker.
    Hang,
    /// Waits until `release_reads` is called, then answers.
    Hold,
}

struct MemoryRemoteInner {
    documents: HashMap<String, Value>,
    reads: ReadBehavior,
    fail_saves: bool,
    held: Vec<oneshot::Sender<()>>,
    saves: Vec<(String, Value)>,
}

#[derive(Clone)]
pub struct MemoryRemote {
    inner: Rc<RefCell<MemoryRemoteInner>>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(MemoryRemoteInner {
                documents: HashMap::new(),
                reads: ReadBehavior::Answer,
                fail_saves: false,
                held: Vec::new(),
                saves: Vec::new(),
            })),
        }
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_document(&self, uid: &str, document: Value) {
        self.inner.borrow_mut().documents.insert(uid.to_string(), document);
    }

    pub fn document(&self, uid: &str) -> Option<Value> {
        self.inner.borrow().documents.get(uid).cloned()
    }

    pub fn set_read_behavior(&self, reads: ReadBehavior) {
        self.inner.borrow_mut().reads = reads;
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.inner.borrow_mut().fail_saves = fail;
    }

    /// Let every held read continue.
    pub fn release_reads(&self) {
        let held: Vec<_> = self.inner.borrow_mut().held.drain(..).collect();
        for tx in held {
            let _ = tx.send(());
        }
    }

    /// Every save attempted so far, in call order, as `(uid, document)`.
    pub fn saves(&self) -> Vec<(String, Value)> {
        self.inner.borrow().saves.clone()
    }
}

#[async_trait(?Send)]
impl RemoteStore for MemoryRemote {
    async fn load(&self, uid: &str) -> Result<Option<Value>> {
        let behavior = self.inner.borrow().reads;
        match behavior {
            ReadBehavior::Answer => {}
            ReadBehavior::Fail => return Err(SyncError::Remote("network blocked".into())),
            ReadBehavior::Hang => future::pending::<()>().await,
            ReadBehavior::Hold => {
                let (tx, rx) = oneshot::channel();
                self.inner.borrow_mut().held.push(tx);
                rx.await
                    .map_err(|_| SyncError::Remote("read abandoned".into()))?;
            }
        }
        Ok(self.inner.borrow().documents.get(uid).cloned())
    }

    async fn save(&self, uid: &str, document: &RemoteDocument) -> Result<()> {
        let value = serde_json::to_value(document)?;
        let mut inner = self.inner.borrow_mut();
        inner.saves.push((uid.to_string(), value.clone()));
        if inner.fail_saves {
            return Err(SyncError::Remote("permission denied".into()));
        }
        let entry = inner
            .documents
            .entry(uid.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        merge_into(entry, value);
        Ok(())
    }
}

/// Shallow document merge: top-level fields of `patch` replace those of
/// `target`, everything else on `target` survives.
pub fn merge_into(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(fields)) => {
            for (k, v) in fields {
                existing.insert(k, v);
            }
        }
        (target, patch) => *target = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::GameState;
    use futures::executor::block_on;
    use serde_json::json;

    #[test]
    fn load_returns_stored_document() {
        let remote = MemoryRemote::new();
        remote.insert_document("u1", json!({"gameState": {"totalXp": 80}}));
        let doc = block_on(remote.load("u1")).unwrap().unwrap();
        assert_eq!(doc["gameState"]["totalXp"], 80);
        assert!(block_on(remote.load("u2")).unwrap().is_none());
    }

    #[test]
    fn failing_reads_return_error() {
        let remote = MemoryRemote::new();
        remote.set_read_behavior(ReadBehavior::Fail);
        assert!(matches!(block_on(remote.load("u1")), Err(SyncError::Remote(_))));
    }

    #[test]
    fn save_merges_with_existing_document() {
        let remote = MemoryRemote::new();
        remote.insert_document("u1", json!({"displayName": "Ada", "gameState": {"totalXp": 1}}));
        let doc = RemoteDocument::new(GameState::default(), 0);
        block_on(remote.save("u1", &doc)).unwrap();

        let stored = remote.document("u1").unwrap();
        assert_eq!(stored["displayName"], "Ada");
        assert_eq!(stored["gameState"]["totalXp"], 0);
        assert_eq!(stored["updatedAt"], "1970-01-01T00:00:00.000Z");
        assert_eq!(remote.saves().len(), 1);
    }

    #[test]
    fn failed_save_is_recorded_but_not_applied() {
        let remote = MemoryRemote::new();
        remote.set_fail_saves(true);
        let doc = RemoteDocument::new(GameState::default(), 0);
        assert!(block_on(remote.save("u1", &doc)).is_err());
        assert!(remote.document("u1").is_none());
        assert_eq!(remote.saves().len(), 1);
    }
}
