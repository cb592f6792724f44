//! Level catalog: the six fixed levels of the simulator.
//!
//! Level content (questions, correct-answer tables) lives in the level
//! modules on the JS side. This catalog only carries what the store needs:
//! ids, display names and the completion bonus each level awards once.

use serde::{Deserialize, Serialize};

/// Level ids are 1-based, matching the `/level/:id` routes.
pub type LevelId = u8;

pub const FIRST_LEVEL: LevelId = 1;
pub const LAST_LEVEL: LevelId = 6;

/// Static description of one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelInfo {
    pub id: LevelId,
    pub title: &'static str,
    pub short_title: &'static str,
    pub description: &'static str,
    /// Bonus XP awarded the first time the level is completed.
    pub completion_xp: u32,
}

pub const LEVELS: [LevelInfo; 6] = [
    LevelInfo {
        id: 1,
        title: "Project Planning",
        short_title: "Planning",
        description: "Define goals, stakeholders, and WBS.",
        completion_xp: 100,
    },
    LevelInfo {
        id: 2,
        title: "Architecture Decision",
        short_title: "Architecture",
        description: "Choose monolith, microservices, or serverless.",
        completion_xp: 120,
    },
    LevelInfo {
        id: 3,
        title: "Database Design",
        short_title: "Database",
        description: "Relational vs NoSQL, indexing, normalization.",
        completion_xp: 120,
    },
    LevelInfo {
        id: 4,
        title: "Git Conflict Simulation",
        short_title: "Git",
        description: "Resolve merge conflicts and use Git commands.",
        completion_xp: 100,
    },
    LevelInfo {
        id: 5,
        title: "CI/CD Pipeline Builder",
        short_title: "CI/CD",
        description: "Order pipeline stages correctly.",
        completion_xp: 130,
    },
    LevelInfo {
        id: 6,
        title: "Documentation Review",
        short_title: "Docs",
        description: "Complete README and API docs.",
        completion_xp: 100,
    },
];

/// True for ids in `FIRST_LEVEL..=LAST_LEVEL`.
pub fn is_valid_level(id: i64) -> bool {
    (FIRST_LEVEL as i64..=LAST_LEVEL as i64).contains(&id)
}

/// Look up a level in the catalog.
pub fn level_info(id: LevelId) -> Option<&'static LevelInfo> {
    LEVELS.iter().find(|l| l.id == id)
}

/// Completion bonus for a level, 0 for unknown ids.
pub fn completion_xp(id: LevelId) -> u32 {
    level_info(id).map(|l| l.completion_xp).unwrap_or(0)
}

/// Parse a level id from a request parameter.
pub fn parse_level_id(raw: &str) -> Option<LevelId> {
    let n: i64 = raw.trim().parse().ok()?;
    if is_valid_level(n) { Some(n as LevelId) } else { None }
}

/// Per-level progress record, persisted under `levels` in every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelRecord {
    pub unlocked: bool,
    pub completed: bool,
    pub completion_xp: u32,
}

impl LevelRecord {
    /// Fresh record for a level: only level 1 starts unlocked.
    pub fn initial(id: LevelId) -> Self {
        Self {
            unlocked: id == FIRST_LEVEL,
            completed: false,
            completion_xp: completion_xp(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_are_sequential() {
        for (i, level) in LEVELS.iter().enumerate() {
            assert_eq!(level.id as usize, i + 1);
        }
    }

    #[test]
    fn completion_xp_matches_catalog() {
        assert_eq!(completion_xp(1), 100);
        assert_eq!(completion_xp(5), 130);
        assert_eq!(completion_xp(7), 0);
    }

    #[test]
    fn parse_level_id_rejects_out_of_range() {
        assert_eq!(parse_level_id("3"), Some(3));
        assert_eq!(parse_level_id(" 6 "), Some(6));
        assert_eq!(parse_level_id("0"), None);
        assert_eq!(parse_level_id("7"), None);
        assert_eq!(parse_level_id("abc"), None);
    }

    #[test]
    fn only_first_level_starts_unlocked() {
        assert!(LevelRecord::initial(1).unlocked);
        assert!(!LevelRecord::initial(2).unlocked);
        assert_eq!(LevelRecord::initial(3).completion_xp, 120);
    }
}
