//! Game domain: level catalog, game state, snapshots, and the sync
//! machinery that keeps one player's progress consistent across local
//! storage and the remote document store.
//!
//! Everything here is single-threaded and runtime-agnostic. Time, task
//! spawning, storage, identity and the remote store are injected, so the
//! same code runs in the browser and under a `LocalPool` in tests.

pub mod clock;
pub mod identity;
pub mod levels;
pub mod race;
pub mod remote;
pub mod scheduler;
pub mod snapshot;
pub mod state;
pub mod storage;
pub mod store;
