//! The page's one active game session.
//!
//! `handle_request` and the identity exports need a store without being
//! handed one, so the session lives in a `thread_local!` slot, set by
//! `install` and emptied by `teardown`. The store itself stays an ordinary
//! value; tests build as many as they like.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::AppConfig;
use crate::game::clock::{Clock, Spawner};
use crate::game::identity::{Identity, IdentityCell};
use crate::game::remote::RemoteStore;
use crate::game::storage::LocalStore;
use crate::game::store::{GameStore, StoreParts};

pub struct Session {
    pub store: GameStore,
    /// Written by the page's auth listener through `notify_identity`.
    pub identity: IdentityCell,
    pub config: AppConfig,
}

impl Session {
    /// Wire a store from its backends. Without identity config the remote
    /// is dropped and the store runs in guest mode.
    pub fn new(
        config: AppConfig,
        local: Rc<dyn LocalStore>,
        remote: Option<Rc<dyn RemoteStore>>,
        clock: Rc<dyn Clock>,
        spawner: Rc<dyn Spawner>,
    ) -> Self {
        let remote = if config.guest_mode() { None } else { remote };
        let identity = IdentityCell::new();
        let store = GameStore::new(
            config.sync.clone(),
            StoreParts {
                local,
                identity: Rc::new(identity.clone()),
                remote,
                clock,
                spawner,
            },
        );
        Self {
            store,
            identity,
            config,
        }
    }
}

thread_local! {
    static SESSION: RefCell<Option<Session>> = const { RefCell::new(None) };
}

/// Make `session` the active one. A previous session is torn down first.
pub fn install(session: Session) {
    let previous = SESSION.with(|slot| slot.borrow_mut().replace(session));
    if let Some(previous) = previous {
        previous.store.teardown();
    }
}

/// Tear down and drop the active session. Returns whether there was one.
pub fn teardown() -> bool {
    let previous = SESSION.with(|slot| slot.borrow_mut().take());
    match previous {
        Some(session) => {
            session.store.teardown();
            true
        }
        None => false,
    }
}

/// Handle to the active store, if a session exists.
pub fn store() -> Option<GameStore> {
    SESSION.with(|slot| slot.borrow().as_ref().map(|s| s.store.clone()))
}

pub fn is_active() -> bool {
    SESSION.with(|slot| slot.borrow().is_some())
}

/// Record an identity-provider notification and let the store react.
/// Resolves when the store has finished loading (or detaching). Does
/// nothing without a session.
pub async fn notify_identity(identity: Option<Identity>) {
    let handles = SESSION.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|s| (s.store.clone(), s.identity.clone()))
    });
    let Some((store, cell)) = handles else {
        tracing::debug!("identity change with no active session");
        return;
    };
    cell.set(identity);
    store.identity_changed().await;
}
