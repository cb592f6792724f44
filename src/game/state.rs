//! Game state aggregate, the one thing that gets persisted.
//!
//! `GameState` is plain data plus the pure mutation rules the level modules
//! rely on (XP awarding, unlock chaining, health clamping, resets). It knows
//! nothing about storage, identity or timers; `store::GameStore` wraps it
//! with persistence and sync.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::game::levels::{self, FIRST_LEVEL, LAST_LEVEL, LevelId, LevelRecord};

pub const INITIAL_HEALTH: i32 = 100;
pub const MIN_HEALTH: i32 = 0;
pub const MAX_HEALTH: i32 = 100;

/// Open-ended answer-key → answer-value record for one level.
pub type DecisionRecord = Map<String, Value>;

/// Complete game state, serialized as the `state` object of a local entry
/// and the `gameState` field of a remote document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub total_xp: u64,
    /// Level the player is viewing; used to resume after reload.
    pub current_level_id: LevelId,
    /// Cosmetic feedback, always within `MIN_HEALTH..=MAX_HEALTH`.
    pub startup_health: i32,
    pub levels: BTreeMap<LevelId, LevelRecord>,
    pub decisions_by_level: BTreeMap<LevelId, DecisionRecord>,
    /// Remount tokens, bumped by `reset_level`.
    pub level_reset_key: BTreeMap<LevelId, u64>,
    pub tooltips_enabled: bool,
    pub sidebar_open: bool,
    pub sidebar_visible: bool,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            total_xp: 0,
            current_level_id: FIRST_LEVEL,
            startup_health: INITIAL_HEALTH,
            levels: initial_levels(),
            decisions_by_level: BTreeMap::new(),
            level_reset_key: BTreeMap::new(),
            tooltips_enabled: true,
            sidebar_open: true,
            sidebar_visible: true,
        }
    }
}

fn initial_levels() -> BTreeMap<LevelId, LevelRecord> {
    (FIRST_LEVEL..=LAST_LEVEL)
        .map(|id| (id, LevelRecord::initial(id)))
        .collect()
}

/// End-of-game summary shown on the final screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    pub total_xp: u64,
    pub completed_count: usize,
    pub total_levels: usize,
    pub all_complete: bool,
    pub decisions_by_level: BTreeMap<LevelId, DecisionRecord>,
}

impl GameState {
    // ── Mutations ──────────────────────────────────────────────────

    pub fn add_xp(&mut self, amount: u64) {
        self.total_xp = self.total_xp.saturating_add(amount);
    }

    /// Range checking is the caller's job; ids outside the catalog are ignored.
    pub fn set_current_level(&mut self, id: LevelId) {
        if levels::level_info(id).is_some() {
            self.current_level_id = id;
        }
    }

    pub fn adjust_health(&mut self, delta: i32) {
        let next = (self.startup_health as i64 + delta as i64).clamp(MIN_HEALTH as i64, MAX_HEALTH as i64);
        self.startup_health = next as i32;
    }

    /// Mark a level completed, award its bonus and unlock the next level.
    /// Returns false (and changes nothing) if the level is unknown or was
    /// already completed.
    pub fn complete_level(&mut self, id: LevelId) -> bool {
        let Some(record) = self.levels.get_mut(&id) else {
            return false;
        };
        if record.completed {
            return false;
        }
        record.completed = true;
        let bonus = record.completion_xp as u64;
        self.total_xp = self.total_xp.saturating_add(bonus);

        if let Some(next) = self.levels.get_mut(&(id + 1)) {
            next.unlocked = true;
        }
        true
    }

    /// Merge answers into a level's decision record. Existing keys are kept
    /// unless overwritten.
    pub fn record_decisions(&mut self, id: LevelId, partial: DecisionRecord) {
        if levels::level_info(id).is_none() {
            return;
        }
        let record = self.decisions_by_level.entry(id).or_default();
        for (key, value) in partial {
            record.insert(key, value);
        }
    }

    /// Un-complete a level, drop its decisions, refund its bonus if it was
    /// awarded, and issue a new reset token. Later levels keep whatever
    /// unlocked/completed state they had. Returns the new token.
    pub fn reset_level(&mut self, id: LevelId, now_ms: u64) -> Option<u64> {
        let record = self.levels.get_mut(&id)?;
        let was_completed = record.completed;
        record.completed = false;
        let refund = record.completion_xp as u64;

        if was_completed {
            self.total_xp = self.total_xp.saturating_sub(refund);
        }
        self.decisions_by_level.remove(&id);

        let token = self.next_reset_token(id, now_ms);
        self.level_reset_key.insert(id, token);
        Some(token)
    }

    /// Back to factory defaults, keeping only the UI preferences.
    pub fn reset_game(&mut self) {
        *self = GameState {
            tooltips_enabled: self.tooltips_enabled,
            sidebar_open: self.sidebar_open,
            sidebar_visible: self.sidebar_visible,
            ..GameState::default()
        };
    }

    // ── Queries ────────────────────────────────────────────────────

    /// Reset token for a level, 0 when it was never reset.
    pub fn level_reset_token(&self, id: LevelId) -> u64 {
        self.level_reset_key.get(&id).copied().unwrap_or(0)
    }

    /// Timestamp-based, but never equal to or below the previous token.
    fn next_reset_token(&self, id: LevelId, now_ms: u64) -> u64 {
        match self.level_reset_key.get(&id) {
            Some(prev) => now_ms.max(prev + 1),
            None => now_ms.max(1),
        }
    }

    /// Whether this state is indistinguishable from a fresh game as far as
    /// progress is concerned. Used to refuse overwriting saved progress.
    pub fn looks_default(&self) -> bool {
        self.total_xp == 0
            && self.current_level_id == FIRST_LEVEL
            && self.decisions_by_level.values().all(|d| d.is_empty())
    }

    pub fn has_progress(&self) -> bool {
        self.current_level_id > FIRST_LEVEL || self.total_xp > 0
    }

    pub fn summary(&self) -> GameSummary {
        let completed_count = self.levels.values().filter(|l| l.completed).count();
        GameSummary {
            total_xp: self.total_xp,
            completed_count,
            total_levels: levels::LEVELS.len(),
            all_complete: completed_count == levels::LEVELS.len(),
            decisions_by_level: self.decisions_by_level.clone(),
        }
    }

    /// Re-establish invariants after loading foreign data: every catalog
    /// level has a record, level 1 and every successor of a completed level
    /// are unlocked, bonuses come from the catalog and numeric fields are in
    /// range. Nothing is ever re-locked.
    pub fn normalize(&mut self) {
        self.levels.retain(|id, _| levels::level_info(*id).is_some());
        for id in FIRST_LEVEL..=LAST_LEVEL {
            let record = self.levels.entry(id).or_insert_with(|| LevelRecord::initial(id));
            record.completion_xp = levels::completion_xp(id);
        }
        if let Some(first) = self.levels.get_mut(&FIRST_LEVEL) {
            first.unlocked = true;
        }
        for id in FIRST_LEVEL..LAST_LEVEL {
            if self.levels.get(&id).is_some_and(|l| l.completed) {
                if let Some(next) = self.levels.get_mut(&(id + 1)) {
                    next.unlocked = true;
                }
            }
        }
        self.decisions_by_level.retain(|id, _| levels::level_info(*id).is_some());
        self.level_reset_key.retain(|id, _| levels::level_info(*id).is_some());
        self.current_level_id = self.current_level_id.clamp(FIRST_LEVEL, LAST_LEVEL);
        self.startup_health = self.startup_health.clamp(MIN_HEALTH, MAX_HEALTH);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decisions(value: Value) -> DecisionRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn fresh_state_has_only_level_one_unlocked() {
        let s = GameState::default();
        assert_eq!(s.current_level_id, 1);
        assert_eq!(s.total_xp, 0);
        assert_eq!(s.startup_health, 100);
        assert!(s.levels[&1].unlocked);
        for id in 2..=6 {
            assert!(!s.levels[&id].unlocked, "level {id} should start locked");
        }
        assert!(s.looks_default());
    }

    #[test]
    fn completing_level_one_awards_bonus_and_unlocks_two() {
        let mut s = GameState::default();
        assert!(s.complete_level(1));
        assert_eq!(s.total_xp, 100);
        assert!(s.levels[&1].completed);
        assert!(s.levels[&2].unlocked);
    }

    #[test]
    fn completing_twice_awards_once() {
        let mut s = GameState::default();
        s.complete_level(3);
        let after_first = s.total_xp;
        assert!(!s.complete_level(3));
        assert_eq!(s.total_xp, after_first);
    }

    #[test]
    fn completing_last_level_unlocks_nothing_new() {
        let mut s = GameState::default();
        assert!(s.complete_level(6));
        assert_eq!(s.total_xp, 100);
        assert_eq!(s.levels.len(), 6);
    }

    #[test]
    fn completing_unknown_level_is_noop() {
        let mut s = GameState::default();
        assert!(!s.complete_level(9));
        assert_eq!(s, GameState::default());
    }

    #[test]
    fn health_stays_clamped() {
        let mut s = GameState::default();
        s.adjust_health(25);
        assert_eq!(s.startup_health, 100);
        s.adjust_health(-30);
        assert_eq!(s.startup_health, 70);
        s.adjust_health(i32::MIN);
        assert_eq!(s.startup_health, 0);
        s.adjust_health(i32::MAX);
        assert_eq!(s.startup_health, 100);
    }

    #[test]
    fn normalize_unlocks_after_completed_levels() {
        let mut s = GameState::default();
        s.levels.get_mut(&3).unwrap().completed = true;
        s.levels.get_mut(&5).unwrap().unlocked = true;
        s.normalize();

        assert!(s.levels[&4].unlocked);
        assert!(s.levels[&5].unlocked, "existing unlocks are kept");
        assert!(!s.levels[&2].unlocked);
        assert!(!s.levels[&6].unlocked);
    }

    #[test]
    fn decisions_merge_last_write_wins() {
        let mut s = GameState::default();
        s.record_decisions(1, decisions(json!({"startupType": "SaaS", "risk": "low"})));
        s.record_decisions(1, decisions(json!({"risk": "high", "wbs": true})));
        let d = &s.decisions_by_level[&1];
        assert_eq!(d["startupType"], "SaaS");
        assert_eq!(d["risk"], "high");
        assert_eq!(d["wbs"], true);
    }

    #[test]
    fn reset_level_refunds_bonus_and_clears_decisions() {
        let mut s = GameState::default();
        s.add_xp(15);
        s.complete_level(2);
        s.record_decisions(2, decisions(json!({"arch": "monolith"})));
        let token = s.reset_level(2, 1_000).unwrap();

        assert_eq!(s.total_xp, 15);
        assert!(!s.levels[&2].completed);
        assert!(!s.decisions_by_level.contains_key(&2));
        assert_eq!(s.level_reset_token(2), token);
    }

    #[test]
    fn reset_level_refund_floors_at_zero() {
        let mut s = GameState::default();
        s.complete_level(5);
        s.total_xp = 40;
        s.reset_level(5, 1);
        assert_eq!(s.total_xp, 0);
    }

    #[test]
    fn reset_level_keeps_later_unlocks() {
        let mut s = GameState::default();
        s.complete_level(1);
        s.complete_level(2);
        s.reset_level(2, 5);
        assert!(s.levels[&3].unlocked);
    }

    #[test]
    fn reset_tokens_increase_even_with_stalled_clock() {
        let mut s = GameState::default();
        let a = s.reset_level(4, 500).unwrap();
        let b = s.reset_level(4, 500).unwrap();
        let c = s.reset_level(4, 100).unwrap();
        assert!(a < b && b < c);
        assert_eq!(s.level_reset_token(1), 0);
    }

    #[test]
    fn reset_game_keeps_ui_preferences() {
        let mut s = GameState::default();
        s.complete_level(1);
        s.tooltips_enabled = false;
        s.sidebar_visible = false;
        s.reset_level(1, 42);
        s.reset_game();

        assert_eq!(s.total_xp, 0);
        assert!(!s.levels[&2].unlocked);
        assert!(s.level_reset_key.is_empty());
        assert!(!s.tooltips_enabled);
        assert!(!s.sidebar_visible);
        assert!(s.sidebar_open);
    }

    #[test]
    fn empty_decision_records_still_look_default() {
        let mut s = GameState::default();
        s.decisions_by_level.insert(3, DecisionRecord::new());
        assert!(s.looks_default());
        s.record_decisions(3, decisions(json!({"db": "postgres"})));
        assert!(!s.looks_default());
    }

    #[test]
    fn summary_counts_completed_levels() {
        let mut s = GameState::default();
        for id in 1..=6 {
            s.complete_level(id);
        }
        let summary = s.summary();
        assert_eq!(summary.completed_count, 6);
        assert!(summary.all_complete);
        assert_eq!(summary.total_xp, 670);
    }

    #[test]
    fn normalize_repairs_foreign_data() {
        let mut s = GameState::default();
        s.levels.clear();
        s.levels.insert(9, LevelRecord::initial(2));
        s.current_level_id = 12;
        s.startup_health = 400;
        s.normalize();

        assert_eq!(s.levels.len(), 6);
        assert!(s.levels[&1].unlocked);
        assert_eq!(s.current_level_id, 6);
        assert_eq!(s.startup_health, 100);
    }

    #[test]
    fn state_json_uses_camel_case_keys() {
        let json = serde_json::to_value(GameState::default()).unwrap();
        assert!(json.get("totalXp").is_some());
        assert!(json.get("currentLevelId").is_some());
        assert!(json["levels"]["1"]["completionXp"].is_number());
        assert_eq!(json["tooltipsEnabled"], true);
    }
}
