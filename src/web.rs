//! Browser bindings: `localStorage`, the page's document-store callbacks,
//! gloo timers and `spawn_local`, plus the session lifecycle exports.
//!
//! The page owns the identity provider and the document-store SDK. It
//! passes two callbacks at session creation:
//!
//! * `load(uid) -> Promise<object | null>` resolving to the user document
//! * `save(uid, patch) -> Promise<void>` merging `patch` into that document
//!
//! and reports auth changes through `sign_in` / `sign_out`.

use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use gloo_timers::future::TimeoutFuture;
use js_sys::{Function, JSON, Promise};
use serde_json::Value;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use crate::config::AppConfig;
use crate::error::{Result, SyncError};
use crate::game::clock::{Clock, Spawner};
use crate::game::identity::Identity;
use crate::game::remote::RemoteStore;
use crate::game::snapshot::RemoteDocument;
use crate::game::storage::{LocalStore, MemoryStorage};
use crate::logging;
use crate::session::{self, Session};

fn js_error(context: &str, err: JsValue) -> SyncError {
    let detail = err.as_string().unwrap_or_else(|| format!("{err:?}"));
    SyncError::Remote(format!("{context}: {detail}"))
}

// ── localStorage ───────────────────────────────────────────────────

pub struct WebStorage {
    storage: web_sys::Storage,
}

impl WebStorage {
    pub fn open() -> Result<Self> {
        let window = web_sys::window().ok_or_else(|| SyncError::Storage("no window".into()))?;
        match window.local_storage() {
            Ok(Some(storage)) => Ok(Self { storage }),
            Ok(None) => Err(SyncError::Storage("localStorage not available".into())),
            Err(e) => Err(SyncError::Storage(format!("localStorage blocked: {e:?}"))),
        }
    }
}

impl LocalStore for WebStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.storage
            .get_item(key)
            .map_err(|e| SyncError::Storage(format!("read {key}: {e:?}")))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.storage
            .set_item(key, value)
            .map_err(|e| SyncError::Storage(format!("write {key}: {e:?}")))
    }
}

// ── Document store callbacks ───────────────────────────────────────

pub struct JsRemoteStore {
    load: Function,
    save: Function,
}

impl JsRemoteStore {
    pub fn new(load: Function, save: Function) -> Self {
        Self { load, save }
    }
}

/// Await whatever a callback returned; plain values count as resolved.
async fn settle(returned: JsValue) -> std::result::Result<JsValue, JsValue> {
    JsFuture::from(Promise::resolve(&returned)).await
}

#[async_trait(?Send)]
impl RemoteStore for JsRemoteStore {
    async fn load(&self, uid: &str) -> Result<Option<Value>> {
        let returned = self
            .load
            .call1(&JsValue::NULL, &JsValue::from_str(uid))
            .map_err(|e| js_error("load", e))?;
        let document = settle(returned).await.map_err(|e| js_error("load", e))?;
        if document.is_null() || document.is_undefined() {
            return Ok(None);
        }
        let text: String = JSON::stringify(&document)
            .map_err(|e| js_error("load", e))?
            .into();
        Ok(Some(serde_json::from_str(&text)?))
    }

    async fn save(&self, uid: &str, document: &RemoteDocument) -> Result<()> {
        let text = serde_json::to_string(document)?;
        let patch = JSON::parse(&text).map_err(|e| js_error("save", e))?;
        let returned = self
            .save
            .call2(&JsValue::NULL, &JsValue::from_str(uid), &patch)
            .map_err(|e| js_error("save", e))?;
        settle(returned).await.map_err(|e| js_error("save", e))?;
        Ok(())
    }
}

// ── Timers and tasks ───────────────────────────────────────────────

pub struct BrowserClock;

impl Clock for BrowserClock {
    fn now_ms(&self) -> u64 {
        js_sys::Date::now() as u64
    }

    fn sleep(&self, ms: u64) -> LocalBoxFuture<'static, ()> {
        let ms = u32::try_from(ms).unwrap_or(u32::MAX);
        Box::pin(TimeoutFuture::new(ms))
    }
}

pub struct BrowserSpawner;

impl Spawner for BrowserSpawner {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }
}

// ── Exports ────────────────────────────────────────────────────────

/// Start the page's game session. `config_json` is the blob described in
/// `config.rs`; `load`/`save` are the document-store callbacks and may be
/// omitted in guest mode.
#[wasm_bindgen]
pub fn create_session(
    config_json: &str,
    load: Option<Function>,
    save: Option<Function>,
) -> std::result::Result<(), JsValue> {
    let config = AppConfig::from_json(config_json).map_err(|e| JsValue::from_str(&e.to_string()))?;
    logging::init(&config.sync.log_filter);

    let local: Rc<dyn LocalStore> = match WebStorage::open() {
        Ok(storage) => Rc::new(storage),
        Err(e) => {
            tracing::warn!(error = %e, "falling back to in-memory storage");
            Rc::new(MemoryStorage::new())
        }
    };
    let remote: Option<Rc<dyn RemoteStore>> = match (load, save) {
        (Some(load), Some(save)) => Some(Rc::new(JsRemoteStore::new(load, save))),
        _ => {
            if !config.guest_mode() {
                tracing::warn!("identity configured but no document-store callbacks given");
            }
            None
        }
    };

    session::install(Session::new(
        config,
        local,
        remote,
        Rc::new(BrowserClock),
        Rc::new(BrowserSpawner),
    ));
    Ok(())
}

/// Auth listener reported a signed-in user. The promise resolves once the
/// user's progress has loaded (or the remote read gave up).
#[wasm_bindgen]
pub fn sign_in(uid: String, display: Option<String>) -> Promise {
    wasm_bindgen_futures::future_to_promise(async move {
        session::notify_identity(Some(Identity::new(uid, display))).await;
        Ok(JsValue::UNDEFINED)
    })
}

/// Auth listener reported sign-out.
#[wasm_bindgen]
pub fn sign_out() -> Promise {
    wasm_bindgen_futures::future_to_promise(async move {
        session::notify_identity(None).await;
        Ok(JsValue::UNDEFINED)
    })
}
