//! Snapshot codecs for local entries, remote documents, and the tolerant
//! overlay used when applying data written by older (or newer) builds.
//!
//! Local entry (localStorage, one per identity key):
//!
//! ```text
//! { "state": { totalXp, currentLevelId, startupHealth, levels,
//!              decisionsByLevel, levelResetKey, tooltipsEnabled,
//!              sidebarOpen, sidebarVisible } }
//! ```
//!
//! Remote document (one per uid):
//!
//! ```text
//! { "gameState": { ...same as state... }, "updatedAt": "<ISO-8601>" }
//! ```
//!
//! Incoming snapshots are applied field by field over the current state.
//! A field that is missing or has the wrong type keeps its current value,
//! so schema drift never wipes progress.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{Result, SyncError};
use crate::game::levels::{self, FIRST_LEVEL, LAST_LEVEL, LevelId, LevelRecord};
use crate::game::state::{GameState, MAX_HEALTH, MIN_HEALTH};

/// A snapshot as it arrives from storage: an untyped JSON object.
pub type RawSnapshot = Map<String, Value>;

#[derive(Serialize)]
struct LocalEntry<'a> {
    state: &'a GameState,
}

/// Document pushed to the remote store. Written with merge semantics, so
/// other fields on the user's document are left alone.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    pub game_state: GameState,
    pub updated_at: String,
}

impl RemoteDocument {
    pub fn new(game_state: GameState, now_ms: u64) -> Self {
        Self {
            game_state,
            updated_at: iso_timestamp(now_ms),
        }
    }
}

/// Milliseconds since the epoch as an RFC 3339 UTC timestamp.
pub fn iso_timestamp(now_ms: u64) -> String {
    let ms = i64::try_from(now_ms).unwrap_or(i64::MAX);
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ── Local entry codec ──────────────────────────────────────────────

pub fn encode_local_entry(state: &GameState) -> Result<String> {
    Ok(serde_json::to_string(&LocalEntry { state })?)
}

/// Parse a local entry and return its `state` object.
pub fn decode_local_entry(raw: &str) -> Result<RawSnapshot> {
    let value: Value = serde_json::from_str(raw)?;
    match value.get("state") {
        Some(Value::Object(state)) => Ok(state.clone()),
        _ => Err(SyncError::MalformedSnapshot("local entry has no state object".into())),
    }
}

/// Pull the `gameState` object out of a remote document. Anything that is
/// not an object is treated as "no remote data".
pub fn extract_remote_snapshot(document: &Value) -> Option<RawSnapshot> {
    match document.get("gameState") {
        Some(Value::Object(state)) => Some(state.clone()),
        _ => None,
    }
}

// ── Overlay ────────────────────────────────────────────────────────

/// Apply every recognisable field of `snapshot` over `state`, coercing and
/// clamping numbers, then restore the state invariants.
pub fn overlay(state: &mut GameState, snapshot: &RawSnapshot) {
    if let Some(xp) = snapshot.get("totalXp").and_then(coerce_int) {
        state.total_xp = xp.max(0) as u64;
    }
    if let Some(level) = snapshot.get("currentLevelId").and_then(coerce_int) {
        state.current_level_id = level.clamp(FIRST_LEVEL as i64, LAST_LEVEL as i64) as LevelId;
    }
    if let Some(health) = snapshot.get("startupHealth").and_then(coerce_int) {
        state.startup_health = health.clamp(MIN_HEALTH as i64, MAX_HEALTH as i64) as i32;
    }
    if let Some(Value::Object(raw_levels)) = snapshot.get("levels") {
        state.levels = parse_levels(raw_levels);
    }
    if let Some(Value::Object(raw)) = snapshot.get("decisionsByLevel") {
        state.decisions_by_level = raw
            .iter()
            .filter_map(|(key, value)| Some((parse_key(key)?, value.as_object()?.clone())))
            .collect();
    }
    if let Some(Value::Object(raw)) = snapshot.get("levelResetKey") {
        state.level_reset_key = raw
            .iter()
            .filter_map(|(key, value)| Some((parse_key(key)?, coerce_int(value)?.max(0) as u64)))
            .collect();
    }
    if let Some(Value::Bool(b)) = snapshot.get("tooltipsEnabled") {
        state.tooltips_enabled = *b;
    }
    if let Some(Value::Bool(b)) = snapshot.get("sidebarOpen") {
        state.sidebar_open = *b;
    }
    if let Some(Value::Bool(b)) = snapshot.get("sidebarVisible") {
        state.sidebar_visible = *b;
    }
    state.normalize();
}

fn parse_levels(raw: &Map<String, Value>) -> BTreeMap<LevelId, LevelRecord> {
    raw.iter()
        .filter_map(|(key, value)| {
            let id = parse_key(key)?;
            let obj = value.as_object()?;
            let mut record = LevelRecord::initial(id);
            if let Some(Value::Bool(b)) = obj.get("unlocked") {
                record.unlocked = *b;
            }
            if let Some(Value::Bool(b)) = obj.get("completed") {
                record.completed = *b;
            }
            Some((id, record))
        })
        .collect()
}

fn parse_key(key: &str) -> Option<LevelId> {
    levels::parse_level_id(key)
}

/// Integers, floats (truncated) and numeric strings all count as numbers.
fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}
