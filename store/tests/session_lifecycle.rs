use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tablesess_core::{SessionConfig, WriteMode};
use tablesess_store::{
    generate_session_id, FixedClock, InMemoryTableService, SessionData, SessionStore,
    SessionStoreError, SessionStoreRef, TableSessionStore,
};

fn build(mode: WriteMode, clock: Arc<FixedClock>) -> (Arc<InMemoryTableService>, SessionStoreRef) {
    let service = Arc::new(InMemoryTableService::new());
    let store = TableSessionStore::new(service.clone(), "phpsess", "sessions")
        .with_write_mode(mode)
        .with_clock(clock);
    let store: SessionStoreRef = Arc::new(store);
    (service, store)
}

#[tokio::test]
async fn host_request_cycle() {
    let clock = Arc::new(FixedClock::new(1_000));
    let (_, store) = build(WriteMode::Upsert, clock);

    // First request: nothing stored yet
    store.open().await.unwrap();
    let mut session = store.read("abc").await.unwrap();
    assert!(session.is_empty());
    session.set("x", 1);
    store.write("abc", &session).await.unwrap();
    store.close().await.unwrap();

    // Second request sees the state
    store.open().await.unwrap();
    let session = store.read("abc").await.unwrap();
    assert_eq!(session.get("x"), Some(&json!(1)));
    store.close().await.unwrap();

    // Logout
    store.destroy("abc").await.unwrap();
    assert!(store.read("abc").await.unwrap().is_empty());
}

#[tokio::test]
async fn write_modes_agree() {
    let mut payload = SessionData::new();
    payload.set("user", "alice");
    payload.set("cart", json!([1, 2, 3]));

    for mode in [WriteMode::Upsert, WriteMode::FetchThenUpdate] {
        let clock = Arc::new(FixedClock::new(500));
        let (service, store) = build(mode, clock);
        store.open().await.unwrap();

        store.write("s1", &payload).await.unwrap();
        store.write("s1", &payload).await.unwrap();

        assert_eq!(store.read("s1").await.unwrap(), payload, "{:?}", mode);
        assert_eq!(service.row_count("phpsess"), 1, "{:?}", mode);
    }
}

#[tokio::test]
async fn gc_removes_only_expired_sessions() {
    let clock = Arc::new(FixedClock::new(100));
    let (_, store) = build(WriteMode::Upsert, clock.clone());
    store.open().await.unwrap();

    let mut payload = SessionData::new();
    payload.set("x", 1);

    store.write("stale", &payload).await.unwrap();
    clock.set(9_000);
    store.write("fresh", &payload).await.unwrap();
    clock.set(9_600);
    store.write("newest", &payload).await.unwrap();
    clock.set(10_000);

    let report = store.gc(Duration::from_secs(500)).await.unwrap();
    assert_eq!(report.cutoff, 9_500);
    assert_eq!(report.matched, 2);
    assert_eq!(report.deleted, 2);
    assert_eq!(report.failed, 0);

    assert!(store.read("stale").await.unwrap().is_empty());
    assert!(store.read("fresh").await.unwrap().is_empty());
    assert_eq!(store.read("newest").await.unwrap(), payload);

    // Nothing left to collect
    let report = store.gc(Duration::from_secs(500)).await.unwrap();
    assert_eq!(report.matched, 0);
}

#[tokio::test]
async fn generated_ids_round_trip() {
    let clock = Arc::new(FixedClock::new(0));
    let (_, store) = build(WriteMode::Upsert, clock);
    store.open().await.unwrap();

    let id = generate_session_id();
    let mut payload = SessionData::new();
    payload.set("n", 42);
    store.write(&id, &payload).await.unwrap();
    assert_eq!(store.read(&id).await.unwrap(), payload);
}

#[tokio::test]
async fn host_serialized_payloads_round_trip() {
    let clock = Arc::new(FixedClock::new(0));
    let (_, store) = build(WriteMode::Upsert, clock);
    store.open().await.unwrap();

    let blob = SessionData::from("user|s:5:\"alice\";cart|a:0:{}".to_string());
    store.write("php", &blob).await.unwrap();
    assert_eq!(store.read("php").await.unwrap(), blob);

    let list = SessionData::from(json!([1, "two", null]));
    store.write("list", &list).await.unwrap();
    assert_eq!(store.read("list").await.unwrap().into_value(), json!([1, "two", null]));
}

#[tokio::test]
async fn destroy_of_unknown_session_is_not_found() {
    let clock = Arc::new(FixedClock::new(0));
    let (_, store) = build(WriteMode::Upsert, clock);
    store.open().await.unwrap();

    match store.destroy("ghost").await {
        Err(SessionStoreError::NotFound(id)) => assert_eq!(id, "ghost"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn configured_names_are_used() {
    let mut config = SessionConfig::default();
    config.table_name = Some("websess".to_string());
    config.partition_name = Some("tenant-a".to_string());

    let service = Arc::new(InMemoryTableService::new());
    let store = TableSessionStore::from_config(service.clone(), &config);
    store.open().await.unwrap();

    let mut payload = SessionData::new();
    payload.set("x", 1);
    store.write("abc", &payload).await.unwrap();

    assert!(service.table_exists("websess"));
    assert!(!service.table_exists("phpsess"));
    assert!(service.row("websess", "tenant-a", "abc").is_some());
}
