//! `GameStore`, one game session: in-memory state, local persistence,
//! remote reconciliation and the debounced push pipeline.
//!
//! A store is built explicitly from its collaborators (`StoreParts`) and
//! torn down explicitly. Handles are cheap `Rc` clones that all point at the
//! same session.
//!
//! Sign-in flow:
//!
//! ```text
//! Anonymous ──sign-in──▶ Authenticating ──local read──▶ LocalLoaded
//!                                                         │
//!                        remote answer within timeout ────┼──▶ RemoteReconciled
//!                        timeout / failure / no document ─┴──▶ LocalOnly
//! ```
//!
//! Every mutation persists synchronously and then (with an identity active)
//! schedules a trailing-edge push to the remote store.

use futures::future::{self, AbortHandle};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::config::SyncConfig;
use crate::game::clock::{Clock, Spawner};
use crate::game::identity::IdentityAccessor;
use crate::game::levels::{self, LevelId, LevelRecord};
use crate::game::race::with_timeout;
use crate::game::remote::RemoteStore;
use crate::game::scheduler::{PushScheduler, PushTicket};
use crate::game::snapshot::{self, RemoteDocument};
use crate::game::state::{DecisionRecord, GameState, GameSummary};
use crate::game::storage::{GameStorage, LocalStore, WriteOutcome};

/// Where the reset shortcut sends the player.
pub const RESET_NAVIGATION: &str = "/level/1";

/// Data-origin state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// Identity subsystem not configured; unscoped key, no remote traffic.
    Guest,
    Anonymous,
    Authenticating,
    /// Local snapshot applied, remote read still in flight.
    LocalLoaded,
    RemoteReconciled,
    /// Remote read timed out, failed or found nothing; local data stands.
    LocalOnly,
}

impl SyncPhase {
    /// Whether the data for the active identity has settled.
    pub fn is_reconciled(self) -> bool {
        matches!(self, SyncPhase::Guest | SyncPhase::RemoteReconciled | SyncPhase::LocalOnly)
    }
}

/// Everything a level view needs to render itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelView {
    pub id: LevelId,
    pub title: &'static str,
    pub short_title: &'static str,
    pub description: &'static str,
    pub record: LevelRecord,
    pub decisions: DecisionRecord,
    pub reset_token: u64,
    pub is_current: bool,
}

/// Sync diagnostics for the shell UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub phase: SyncPhase,
    pub uid: Option<String>,
    pub guest_mode: bool,
    pub loaded_from_remote: bool,
    pub pending_push: bool,
    pub pending_push_due_ms: Option<u64>,
    pub torn_down: bool,
}

/// Collaborators a store is built from.
pub struct StoreParts {
    pub local: Rc<dyn LocalStore>,
    pub identity: Rc<dyn IdentityAccessor>,
    /// `None` puts the store in guest mode.
    pub remote: Option<Rc<dyn RemoteStore>>,
    pub clock: Rc<dyn Clock>,
    pub spawner: Rc<dyn Spawner>,
}

struct StoreInner {
    state: RefCell<GameState>,
    storage: GameStorage,
    identity: Rc<dyn IdentityAccessor>,
    remote: Option<Rc<dyn RemoteStore>>,
    clock: Rc<dyn Clock>,
    spawner: Rc<dyn Spawner>,
    config: SyncConfig,
    phase: Cell<SyncPhase>,
    /// Bumped on every identity change; a remote answer carrying an older
    /// value belongs to a replaced session.
    generation: Cell<u64>,
    loaded_from_remote: Cell<bool>,
    scheduler: RefCell<PushScheduler>,
    push_timer: RefCell<Option<AbortHandle>>,
    torn_down: Cell<bool>,
}

#[derive(Clone)]
pub struct GameStore {
    inner: Rc<StoreInner>,
}

impl GameStore {
    /// Build a session. The unscoped local entry (guest progress, or the
    /// last anonymous session) is applied right away.
    pub fn new(config: SyncConfig, parts: StoreParts) -> Self {
        let storage = GameStorage::new(parts.local, config.storage_prefix.clone());
        let mut state = GameState::default();
        if let Some(saved) = storage.load(None) {
            snapshot::overlay(&mut state, &saved);
        }
        let phase = if parts.remote.is_some() {
            SyncPhase::Anonymous
        } else {
            SyncPhase::Guest
        };
        tracing::info!(?phase, prefix = %config.storage_prefix, "game store created");

        Self {
            inner: Rc::new(StoreInner {
                state: RefCell::new(state),
                storage,
                identity: parts.identity,
                remote: parts.remote,
                clock: parts.clock,
                spawner: parts.spawner,
                config,
                phase: Cell::new(phase),
                generation: Cell::new(0),
                loaded_from_remote: Cell::new(false),
                scheduler: RefCell::new(PushScheduler::new()),
                push_timer: RefCell::new(None),
                torn_down: Cell::new(false),
            }),
        }
    }

    pub fn guest_mode(&self) -> bool {
        self.inner.remote.is_none()
    }

    pub fn phase(&self) -> SyncPhase {
        self.inner.phase.get()
    }

    /// The identity whose data this session holds, if any.
    fn active_uid(&self) -> Option<String> {
        if self.guest_mode() {
            return None;
        }
        self.inner.identity.uid()
    }

    // ── Mutations ──────────────────────────────────────────────────

    pub fn add_xp(&self, amount: u64) {
        self.mutate(|s| s.add_xp(amount));
    }

    pub fn set_current_level(&self, id: LevelId) {
        self.mutate(|s| s.set_current_level(id));
    }

    pub fn adjust_health(&self, delta: i32) {
        self.mutate(|s| s.adjust_health(delta));
    }

    /// Returns whether this call completed the level (false when it was
    /// already completed or does not exist).
    pub fn complete_level(&self, id: LevelId) -> bool {
        let changed = self.inner.state.borrow_mut().complete_level(id);
        if changed {
            tracing::info!(level = id, "level completed");
            self.after_change();
        }
        changed
    }

    pub fn record_decisions(&self, id: LevelId, partial: DecisionRecord) {
        self.mutate(|s| s.record_decisions(id, partial));
    }

    /// Returns the level's new reset token.
    pub fn reset_level(&self, id: LevelId) -> Option<u64> {
        let now = self.inner.clock.now_ms();
        let token = self.inner.state.borrow_mut().reset_level(id, now);
        if token.is_some() {
            tracing::info!(level = id, "level reset");
            self.after_change();
        }
        token
    }

    pub fn reset_game(&self) {
        tracing::info!("game reset");
        self.mutate(GameState::reset_game);
    }

    pub fn set_tooltips_enabled(&self, enabled: bool) {
        self.mutate(|s| s.tooltips_enabled = enabled);
    }

    pub fn set_sidebar_open(&self, open: bool) {
        self.mutate(|s| s.sidebar_open = open);
    }

    pub fn set_sidebar_visible(&self, visible: bool) {
        self.mutate(|s| s.sidebar_visible = visible);
    }

    /// Global reset shortcut: Ctrl+Shift+R resets the game and returns the
    /// path to navigate to. Any other combination is ignored.
    pub fn handle_shortcut(&self, ctrl: bool, shift: bool, key: &str) -> Option<&'static str> {
        if !(ctrl && shift && key.eq_ignore_ascii_case("r")) {
            return None;
        }
        self.reset_game();
        Some(RESET_NAVIGATION)
    }

    fn mutate(&self, f: impl FnOnce(&mut GameState)) {
        {
            let mut state = self.inner.state.borrow_mut();
            f(&mut *state);
        }
        self.after_change();
    }

    /// Persist locally, then schedule the remote push.
    fn after_change(&self) {
        let uid = self.active_uid();
        let reconciled = self.phase().is_reconciled();
        let state = self.inner.state.borrow().clone();

        if self.inner.storage.persist(uid.as_deref(), &state, reconciled) == WriteOutcome::Suppressed {
            return;
        }
        let Some(uid) = uid else {
            return;
        };
        if self.inner.torn_down.get() {
            return;
        }
        self.schedule_push(&uid, state);
    }

    // ── Remote push pipeline ───────────────────────────────────────

    fn schedule_push(&self, uid: &str, state: GameState) {
        let Some(remote) = self.inner.remote.clone() else {
            return;
        };
        let delay = self.inner.config.save_debounce_ms;
        let now = self.inner.clock.now_ms();
        let ticket = self.inner.scheduler.borrow_mut().schedule(delay, now, uid, state);
        tracing::debug!(%uid, delay_ms = delay, "remote push scheduled");

        let sleep = self.inner.clock.sleep(delay);
        let weak = Rc::downgrade(&self.inner);
        let (task, handle) = future::abortable(async move {
            sleep.await;
            push_due(weak, remote, ticket).await;
        });
        if let Some(previous) = self.inner.push_timer.borrow_mut().replace(handle) {
            previous.abort();
        }
        self.inner.spawner.spawn(Box::pin(async move {
            let _ = task.await;
        }));
    }

    fn cancel_pending_push(&self) {
        if let Some(timer) = self.inner.push_timer.borrow_mut().take() {
            timer.abort();
        }
        if self.inner.scheduler.borrow_mut().cancel_pending() {
            tracing::debug!("pending remote push cancelled");
        }
    }

    // ── Identity changes ───────────────────────────────────────────

    /// React to an identity-provider notification: read the current
    /// identity and load (sign-in) or detach (sign-out). Resolves once the
    /// remote read has settled or been abandoned.
    pub async fn identity_changed(&self) {
        if self.inner.torn_down.get() {
            return;
        }
        if self.guest_mode() {
            tracing::debug!("identity change ignored in guest mode");
            return;
        }
        let generation = self.inner.generation.get() + 1;
        self.inner.generation.set(generation);
        self.inner.loaded_from_remote.set(false);

        let Some(identity) = self.inner.identity.current() else {
            self.cancel_pending_push();
            self.inner.phase.set(SyncPhase::Anonymous);
            tracing::info!("signed out");
            return;
        };
        let uid = identity.uid;
        tracing::info!(%uid, "signed in, loading progress");
        self.inner.phase.set(SyncPhase::Authenticating);
        self.cancel_pending_push();

        // Fast path: whatever this device saved last, no network wait.
        let mut state = GameState::default();
        if let Some(saved) = self.inner.storage.load(Some(&uid)) {
            snapshot::overlay(&mut state, &saved);
        }
        *self.inner.state.borrow_mut() = state;
        self.inner.phase.set(SyncPhase::LocalLoaded);

        let Some(remote) = self.inner.remote.clone() else {
            return;
        };
        let timeout = self.inner.config.load_timeout_ms;
        let outcome = with_timeout(remote.load(&uid), self.inner.clock.as_ref(), timeout).await;

        if self.inner.generation.get() != generation || self.inner.torn_down.get() {
            tracing::debug!(%uid, "discarding remote answer for a replaced session");
            return;
        }

        let document = match outcome {
            Some(Ok(Some(document))) => document,
            Some(Ok(None)) => {
                tracing::info!(%uid, "no remote progress, keeping local data");
                self.inner.phase.set(SyncPhase::LocalOnly);
                return;
            }
            Some(Err(e)) => {
                tracing::info!(%uid, error = %e, "remote load failed, keeping local data");
                self.inner.phase.set(SyncPhase::LocalOnly);
                return;
            }
            None => {
                tracing::info!(%uid, timeout_ms = timeout, "remote load timed out, keeping local data");
                self.inner.phase.set(SyncPhase::LocalOnly);
                return;
            }
        };
        let Some(remote_state) = snapshot::extract_remote_snapshot(&document) else {
            tracing::info!(%uid, "remote document has no game state, keeping local data");
            self.inner.phase.set(SyncPhase::LocalOnly);
            return;
        };

        // A push queued while local data was showing carries state the
        // remote snapshot replaces.
        self.cancel_pending_push();
        snapshot::overlay(&mut self.inner.state.borrow_mut(), &remote_state);
        self.inner.phase.set(SyncPhase::RemoteReconciled);
        self.inner.loaded_from_remote.set(true);
        tracing::info!(%uid, "remote progress applied");

        let state = self.inner.state.borrow().clone();
        self.inner.storage.persist(Some(&uid), &state, true);
    }

    /// Detach the session: drop any pending push and ignore further
    /// identity changes and remote answers.
    pub fn teardown(&self) {
        if self.inner.torn_down.replace(true) {
            return;
        }
        self.inner.generation.set(self.inner.generation.get() + 1);
        self.cancel_pending_push();
        tracing::info!("game store torn down");
    }

    // ── Queries ────────────────────────────────────────────────────

    pub fn state(&self) -> GameState {
        self.inner.state.borrow().clone()
    }

    pub fn level_reset_token(&self, id: LevelId) -> u64 {
        self.inner.state.borrow().level_reset_token(id)
    }

    pub fn level_view(&self, id: LevelId) -> Option<LevelView> {
        let info = levels::level_info(id)?;
        let state = self.inner.state.borrow();
        Some(LevelView {
            id,
            title: info.title,
            short_title: info.short_title,
            description: info.description,
            record: state.levels.get(&id).cloned().unwrap_or_else(|| LevelRecord::initial(id)),
            decisions: state.decisions_by_level.get(&id).cloned().unwrap_or_default(),
            reset_token: state.level_reset_token(id),
            is_current: state.current_level_id == id,
        })
    }

    pub fn summary(&self) -> GameSummary {
        self.inner.state.borrow().summary()
    }

    /// Where to send a signed-in player after their data loads. One-shot:
    /// clears the loaded-from-remote flag.
    pub fn resume_target(&self) -> Option<String> {
        self.active_uid()?;
        let from_remote = self.inner.loaded_from_remote.replace(false);
        let state = self.inner.state.borrow();
        if from_remote || state.has_progress() {
            Some(format!("/level/{}", state.current_level_id))
        } else {
            None
        }
    }

    pub fn status(&self) -> SyncStatus {
        let scheduler = self.inner.scheduler.borrow();
        let pending = scheduler.pending();
        SyncStatus {
            phase: self.phase(),
            uid: self.active_uid(),
            guest_mode: self.guest_mode(),
            loaded_from_remote: self.inner.loaded_from_remote.get(),
            pending_push: pending.is_some(),
            pending_push_due_ms: pending.map(|p| p.due_at_ms),
            torn_down: self.inner.torn_down.get(),
        }
    }
}

/// Body of a push timer: send the pending snapshot if `ticket` still owns
/// it. Failures are dropped; local storage is the durable copy.
async fn push_due(store: Weak<StoreInner>, remote: Rc<dyn RemoteStore>, ticket: PushTicket) {
    let Some(inner) = store.upgrade() else {
        return;
    };
    if inner.torn_down.get() {
        return;
    }
    let Some(push) = inner.scheduler.borrow_mut().take(ticket) else {
        return;
    };
    inner.push_timer.borrow_mut().take();
    let document = RemoteDocument::new(push.state, inner.clock.now_ms());
    drop(inner);

    match remote.save(&push.uid, &document).await {
        Ok(()) => tracing::debug!(uid = %push.uid, "remote push sent"),
        Err(e) => tracing::debug!(uid = %push.uid, error = %e, "remote push failed, dropped"),
    }
}
