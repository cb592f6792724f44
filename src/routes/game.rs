//! `/api/game/*` routes, the level modules' window onto the store.
//!
//! Every handler takes the session's `GameStore` plus the raw query or
//! form body and returns a JSON string. Mutations reply with the updated
//! state fragment the caller most likely needs next.

use serde_json::{Value, json};

use crate::game::levels::{self, LevelId};
use crate::game::state::DecisionRecord;
use crate::game::store::{GameStore, RESET_NAVIGATION};
use crate::routes::util::{
    bad_request, get_bool, get_int, get_param, ok_json, parse_form_body, parse_query, to_json,
};

fn level_param(params: &[(String, String)], key: &str) -> Result<LevelId, String> {
    let raw = get_param(params, key).ok_or_else(|| bad_request(&format!("Missing {key} parameter")))?;
    levels::parse_level_id(raw).ok_or_else(|| bad_request(&format!("Invalid level id: {raw}")))
}

// ── GET /api/game/state ────────────────────────────────────────────

/// Full game state, same shape as the `state` object of a local entry.
pub fn handle_state_get(store: &GameStore, _query: &str) -> String {
    to_json(&store.state())
}

// ── GET /api/game/level?id=N ───────────────────────────────────────

pub fn handle_level_get(store: &GameStore, query: &str) -> String {
    let params = parse_query(query);
    let id = match level_param(&params, "id") {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    match store.level_view(id) {
        Some(view) => to_json(&view),
        None => bad_request("Unknown level"),
    }
}

// ── POST /api/game/xp ──────────────────────────────────────────────

/// Body: `amount={n}` (non-negative).
pub fn handle_xp_post(store: &GameStore, body: &str) -> String {
    let params = parse_form_body(body);
    let amount = match get_int(&params, "amount") {
        Some(n) if n >= 0 => n as u64,
        _ => return bad_request("Missing or invalid amount parameter"),
    };
    store.add_xp(amount);
    ok_json(json!({ "totalXp": store.state().total_xp }))
}

// ── POST /api/game/current ─────────────────────────────────────────

/// Body: `level={n}`. Ids outside 1..=6 are rejected here.
pub fn handle_current_post(store: &GameStore, body: &str) -> String {
    let params = parse_form_body(body);
    let id = match level_param(&params, "level") {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    store.set_current_level(id);
    ok_json(json!({ "currentLevelId": id }))
}

// ── POST /api/game/health ──────────────────────────────────────────

/// Body: `delta={n}`, usually negative after a wrong answer.
pub fn handle_health_post(store: &GameStore, body: &str) -> String {
    let params = parse_form_body(body);
    let delta = match get_int(&params, "delta") {
        Some(n) => n.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
        None => return bad_request("Missing or invalid delta parameter"),
    };
    store.adjust_health(delta);
    ok_json(json!({ "startupHealth": store.state().startup_health }))
}

// ── POST /api/game/complete ────────────────────────────────────────

/// Body: `level={n}`. Repeat completions are accepted and award nothing.
pub fn handle_complete_post(store: &GameStore, body: &str) -> String {
    let params = parse_form_body(body);
    let id = match level_param(&params, "level") {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let awarded = store.complete_level(id);
    let state = store.state();
    let next_unlocked = state.levels.get(&(id + 1)).map(|r| r.unlocked);
    ok_json(json!({
        "awarded": awarded,
        "totalXp": state.total_xp,
        "nextUnlocked": next_unlocked,
    }))
}

// ── POST /api/game/decisions ───────────────────────────────────────

/// Body: `level={n}&decisions={url-encoded JSON object}`.
pub fn handle_decisions_post(store: &GameStore, body: &str) -> String {
    let params = parse_form_body(body);
    let id = match level_param(&params, "level") {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    let raw = get_param(&params, "decisions").unwrap_or("");
    let partial: DecisionRecord = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        _ => return bad_request("decisions must be a JSON object"),
    };
    store.record_decisions(id, partial);
    let decisions = store.state().decisions_by_level.get(&id).cloned().unwrap_or_default();
    ok_json(json!({ "level": id, "decisions": decisions }))
}

// ── POST /api/game/reset-level ─────────────────────────────────────

/// Body: `level={n}`. Replies with the new remount token.
pub fn handle_reset_level_post(store: &GameStore, body: &str) -> String {
    let params = parse_form_body(body);
    let id = match level_param(&params, "level") {
        Ok(id) => id,
        Err(reply) => return reply,
    };
    match store.reset_level(id) {
        Some(token) => ok_json(json!({
            "level": id,
            "resetToken": token,
            "totalXp": store.state().total_xp,
        })),
        None => bad_request("Unknown level"),
    }
}

// ── POST /api/game/reset ───────────────────────────────────────────

pub fn handle_reset_post(store: &GameStore, _body: &str) -> String {
    store.reset_game();
    ok_json(json!({ "navigate": RESET_NAVIGATION }))
}

// ── POST /api/game/prefs ───────────────────────────────────────────

/// Body: any of `tooltips`, `sidebar_open`, `sidebar_visible`.
pub fn handle_prefs_post(store: &GameStore, body: &str) -> String {
    let params = parse_form_body(body);
    let mut touched = false;
    if let Some(on) = get_bool(&params, "tooltips") {
        store.set_tooltips_enabled(on);
        touched = true;
    }
    if let Some(open) = get_bool(&params, "sidebar_open") {
        store.set_sidebar_open(open);
        touched = true;
    }
    if let Some(visible) = get_bool(&params, "sidebar_visible") {
        store.set_sidebar_visible(visible);
        touched = true;
    }
    if !touched {
        return bad_request("No preference given");
    }
    let state = store.state();
    ok_json(json!({
        "tooltipsEnabled": state.tooltips_enabled,
        "sidebarOpen": state.sidebar_open,
        "sidebarVisible": state.sidebar_visible,
    }))
}

// ── POST /api/game/key ─────────────────────────────────────────────

/// Body: `ctrl`, `shift`, `key` from the page's global keydown listener.
pub fn handle_key_post(store: &GameStore, body: &str) -> String {
    let params = parse_form_body(body);
    let ctrl = get_bool(&params, "ctrl").unwrap_or(false);
    let shift = get_bool(&params, "shift").unwrap_or(false);
    let key = get_param(&params, "key").unwrap_or("");
    match store.handle_shortcut(ctrl, shift, key) {
        Some(path) => ok_json(json!({ "handled": true, "navigate": path })),
        None => ok_json(json!({ "handled": false })),
    }
}

// ── GET /api/game/summary ──────────────────────────────────────────

pub fn handle_summary_get(store: &GameStore, _query: &str) -> String {
    to_json(&store.summary())
}

// ── GET /api/game/resume ───────────────────────────────────────────

/// `{"navigate": "/level/N"}` once after a load, `{"navigate": null}`
/// otherwise.
pub fn handle_resume_get(store: &GameStore, _query: &str) -> String {
    json!({ "navigate": store.resume_target() }).to_string()
}
