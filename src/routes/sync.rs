//! `/api/sync/*` routes: read-only view of the sync pipeline.

use crate::game::store::GameStore;
use crate::routes::util::to_json;

// ── GET /api/sync/status ───────────────────────────────────────────

/// Phase, active uid, guest mode and whether a remote push is waiting.
pub fn handle_status_get(store: &GameStore, _query: &str) -> String {
    to_json(&store.status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::game::clock::ManualClock;
    use crate::game::identity::IdentityCell;
    use crate::game::remote::MemoryRemote;
    use crate::game::storage::MemoryStorage;
    use crate::game::store::StoreParts;
    use futures::executor::LocalPool;
    use std::rc::Rc;

    #[test]
    fn status_reports_anonymous_session() {
        let pool = LocalPool::new();
        let store = GameStore::new(
            SyncConfig::default(),
            StoreParts {
                local: Rc::new(MemoryStorage::new()),
                identity: Rc::new(IdentityCell::new()),
                remote: Some(Rc::new(MemoryRemote::new())),
                clock: Rc::new(ManualClock::new(0)),
                spawner: Rc::new(pool.spawner()),
            },
        );
        let status: serde_json::Value = serde_json::from_str(&handle_status_get(&store, "")).unwrap();
        assert_eq!(status["phase"], "anonymous");
        assert_eq!(status["guestMode"], false);
        assert!(status["uid"].is_null());
        assert_eq!(status["pendingPush"], false);
    }
}
