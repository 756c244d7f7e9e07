//! Session table: tokens, TTL eviction, sweeper lifecycle.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parley_server::session::SessionTable;

#[test]
fn tokens_are_unique_hex_strings() {
    let table = SessionTable::new(Duration::from_secs(900));
    let mut seen = HashSet::new();
    for _ in 0..100 {
        let token = table.create("alice");
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(seen.insert(token));
    }
    assert_eq!(table.len(), 100);
}

#[test]
fn lookup_returns_live_session_only() {
    let table = SessionTable::new(Duration::from_secs(900));
    let token = table.create("alice");

    let session = table.lookup(&token).expect("fresh session");
    assert_eq!(session.username, "alice");
    assert_eq!(session.room, None);

    assert!(table.lookup("deadbeef").is_none());
}

#[test]
fn set_room_is_visible_on_next_lookup() {
    let table = SessionTable::new(Duration::from_secs(900));
    let token = table.create("alice");

    table.set_room(&token, Some("general".to_string()));
    assert_eq!(
        table.lookup(&token).unwrap().room.as_deref(),
        Some("general")
    );

    table.set_room(&token, None);
    assert_eq!(table.lookup(&token).unwrap().room, None);
}

#[tokio::test]
async fn stale_lookup_evicts_and_reports_not_found() {
    let table = SessionTable::new(Duration::from_millis(30));
    let token = table.create("alice");

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(table.lookup(&token).is_none());
    // Evicted as a side effect, not merely hidden.
    assert_eq!(table.len(), 0);
}

#[tokio::test]
async fn touch_extends_a_session() {
    let table = SessionTable::new(Duration::from_millis(200));
    let token = table.create("alice");

    tokio::time::sleep(Duration::from_millis(120)).await;
    table.touch(&token);
    tokio::time::sleep(Duration::from_millis(120)).await;

    // 240ms since create but only 120ms since the touch.
    assert!(table.lookup(&token).is_some());
}

#[tokio::test]
async fn sweep_evicts_only_expired_sessions() {
    let table = SessionTable::new(Duration::from_millis(60));
    let old = table.create("alice");
    tokio::time::sleep(Duration::from_millis(100)).await;
    let fresh = table.create("bob");

    assert_eq!(table.sweep(), 1);
    assert!(table.lookup(&old).is_none());
    assert!(table.lookup(&fresh).is_some());
}

#[tokio::test]
async fn sweeper_task_evicts_in_background() {
    let table = Arc::new(SessionTable::new(Duration::from_millis(30)));
    table.create("alice");
    table.create("bob");

    table.start_sweeper(Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(150)).await;

    // No lookups happened; the background sweep did the eviction.
    assert!(table.is_empty());
    table.stop_sweeper();
}
