// Browser-side checks for the web bindings.
// Run with `wasm-pack test --headless --firefox`; compiles to nothing on native targets.

#![cfg(target_arch = "wasm32")]

use cto_sim_server::game::clock::Clock;
use cto_sim_server::game::storage::LocalStore;
use cto_sim_server::web::{BrowserClock, WebStorage, create_session};
use cto_sim_server::{handle_request, teardown_session};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn local_storage_round_trip() {
    let storage = WebStorage::open().unwrap();
    storage.set_item("cto-sim-test", "{\"state\":{}}").unwrap();
    assert_eq!(storage.get_item("cto-sim-test").unwrap().as_deref(), Some("{\"state\":{}}"));
}

#[wasm_bindgen_test]
async fn browser_clock_sleeps() {
    let clock = BrowserClock;
    let start = clock.now_ms();
    clock.sleep(20).await;
    assert!(clock.now_ms() >= start + 15);
}

#[wasm_bindgen_test]
fn guest_session_serves_requests() {
    create_session("", None, None).unwrap();
    handle_request("POST", "/api/game/reset", "", "");
    let reply = handle_request("POST", "/api/game/xp", "", "amount=10");
    assert!(reply.contains("\"totalXp\":10"));
    let status = handle_request("GET", "/api/sync/status", "", "");
    assert!(status.contains("\"guest\""));
    assert!(teardown_session());
}
