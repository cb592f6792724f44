//! CTO Simulator in-browser game-state server.
//!
//! Exports `handle_request(method, path, query, body)` for the page's level
//! modules and shell UI. Uses `matchit` for URL routing, the same router
//! engine that powers Axum. Replies are JSON strings.
//!
//! Session lifecycle (`create_session`, `sign_in`, `sign_out`) lives in
//! `web.rs` for the browser build; `teardown_session` and
//! `validate_credentials` are plain exports usable from host tests too.

use serde_json::json;
use wasm_bindgen::prelude::*;

pub mod config;
pub mod error;
pub mod game;
pub mod logging;
pub mod routes;
pub mod session;
#[cfg(target_arch = "wasm32")]
pub mod web;

use crate::game::identity;
use crate::game::store::GameStore;
use crate::routes::util::error_json;

type Handler = fn(&GameStore, &str) -> String;

/// Which request part a handler reads.
enum Input {
    Query,
    Body,
}

fn get(handler: Handler) -> (Handler, Input) {
    (handler, Input::Query)
}

fn post(handler: Handler) -> (Handler, Input) {
    (handler, Input::Body)
}

/// Process an HTTP-like request and return a JSON reply.
///
/// # Arguments
/// * `method`: HTTP method ("GET" or "POST")
/// * `path`: URL path (e.g. "/api/game/level")
/// * `query`: Query string (e.g. "?id=3")
/// * `body`: Form-encoded request body. Empty string for GET requests.
#[wasm_bindgen]
pub fn handle_request(method: &str, path: &str, query: &str, body: &str) -> String {
    let mut router = matchit::Router::new();

    router.insert("/api/game/state", "game_state").ok();
    router.insert("/api/game/level", "game_level").ok();
    router.insert("/api/game/xp", "game_xp").ok();
    router.insert("/api/game/current", "game_current").ok();
    router.insert("/api/game/health", "game_health").ok();
    router.insert("/api/game/complete", "game_complete").ok();
    router.insert("/api/game/decisions", "game_decisions").ok();
    router.insert("/api/game/reset-level", "game_reset_level").ok();
    router.insert("/api/game/reset", "game_reset").ok();
    router.insert("/api/game/prefs", "game_prefs").ok();
    router.insert("/api/game/key", "game_key").ok();
    router.insert("/api/game/summary", "game_summary").ok();
    router.insert("/api/game/resume", "game_resume").ok();
    router.insert("/api/sync/status", "sync_status").ok();

    let (handler, input) = match router.at(path) {
        Ok(matched) => match (*matched.value, method) {
            ("game_state", "GET") => get(routes::game::handle_state_get),
            ("game_level", "GET") => get(routes::game::handle_level_get),
            ("game_summary", "GET") => get(routes::game::handle_summary_get),
            ("game_resume", "GET") => get(routes::game::handle_resume_get),
            ("sync_status", "GET") => get(routes::sync::handle_status_get),

            ("game_xp", "POST") => post(routes::game::handle_xp_post),
            ("game_current", "POST") => post(routes::game::handle_current_post),
            ("game_health", "POST") => post(routes::game::handle_health_post),
            ("game_complete", "POST") => post(routes::game::handle_complete_post),
            ("game_decisions", "POST") => post(routes::game::handle_decisions_post),
            ("game_reset_level", "POST") => post(routes::game::handle_reset_level_post),
            ("game_reset", "POST") => post(routes::game::handle_reset_post),
            ("game_prefs", "POST") => post(routes::game::handle_prefs_post),
            ("game_key", "POST") => post(routes::game::handle_key_post),

            _ => return method_not_allowed(),
        },
        Err(_) => return not_found(),
    };

    let Some(store) = session::store() else {
        return no_session();
    };
    match input {
        Input::Query => handler(&store, query),
        Input::Body => handler(&store, body),
    }
}

fn not_found() -> String {
    error_json(404, "route not found")
}

fn method_not_allowed() -> String {
    error_json(405, "method not allowed")
}

fn no_session() -> String {
    error_json(503, "no active game session")
}

/// Tear down the active session: pending pushes are cancelled and later
/// requests get a 503 reply until a new session is created.
#[wasm_bindgen]
pub fn teardown_session() -> bool {
    session::teardown()
}

/// Check sign-in (or sign-up) form input before it goes to the identity
/// provider. Replies `{"ok": true, "email": "<trimmed>"}` or
/// `{"ok": false, "error": "<message for the user>"}`.
#[wasm_bindgen]
pub fn validate_credentials(email: &str, password: &str, sign_up: bool) -> String {
    let checked = if sign_up {
        identity::validate_sign_up(email, password)
    } else {
        identity::validate_sign_in(email, password)
    };
    match checked {
        Ok(email) => json!({ "ok": true, "email": email }).to_string(),
        Err(e) => json!({ "ok": false, "error": e.to_string() }).to_string(),
    }
}
