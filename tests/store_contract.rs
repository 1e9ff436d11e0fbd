//! The tracker store contract, run against every backend, including the HTTP
//! client talking to an in-process key-value server.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use dialogue_tracker::events::{Entity, Intent, ACTION_LISTEN_NAME};
use dialogue_tracker::store::{
    HttpKeyValue, InMemoryKeyValue, InMemoryTrackerStore, KeyValueTrackerStore, SqliteKeyValue,
};
use dialogue_tracker::{Domain, Event, StoreError, TrackerStore};

fn domain() -> Arc<Domain> {
    Arc::new(
        Domain::from_toml_str(
            r#"
            topics = ["weather"]

            [[slots]]
            name = "location"
            type = "text"
            "#,
        )
        .unwrap(),
    )
}

async fn check_contract(store: &dyn TrackerStore) {
    // Fresh id: exactly one listen action.
    let mut alice = store.get_or_create("alice").await.unwrap();
    assert_eq!(alice.events().len(), 1);
    assert_eq!(alice.events()[0].action_name(), Some(ACTION_LISTEN_NAME));

    // Absence is not an error.
    assert!(store.retrieve("nobody").await.unwrap().is_none());

    let bob = store.get_or_create("bob").await.unwrap();

    alice
        .update(Event::user_uttered(
            "weather in Lisbon?",
            Some(Intent::new("ask_weather", 0.8125)),
            vec![Entity::new("location", "Lisbon")],
        ))
        .unwrap();
    alice
        .update(Event::slot_set("location", "Lisbon"))
        .unwrap();
    alice.update(Event::topic_set("weather")).unwrap();
    alice
        .update(Event::action_executed("utter_weather"))
        .unwrap();
    alice.update(Event::action_reverted()).unwrap();
    store.save(&alice).await.unwrap();

    // Save then retrieve is value-equal, log and state.
    let loaded = store.retrieve("alice").await.unwrap().unwrap();
    assert_eq!(loaded, alice);
    assert_eq!(loaded.state(), alice.state());
    assert_eq!(
        loaded.latest_event_time().map(f64::to_bits),
        alice.latest_event_time().map(f64::to_bits)
    );

    // Other ids are unaffected.
    assert_eq!(store.retrieve("bob").await.unwrap(), Some(bob));

    // get_or_create does not reset an existing session.
    assert_eq!(store.get_or_create("alice").await.unwrap(), alice);

    let mut keys = store.keys().await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["alice".to_string(), "bob".to_string()]);
}

/// Sessions with different ids saved from concurrent tasks do not interfere.
async fn check_concurrent_sessions(store: Arc<dyn TrackerStore>) {
    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..8 {
        let store = Arc::clone(&store);
        tasks.spawn(async move {
            let sender_id = format!("user-{i}");
            let mut tracker = store.get_or_create(&sender_id).await.unwrap();
            tracker
                .update(Event::slot_set("location", format!("city-{i}")))
                .unwrap();
            store.save(&tracker).await.unwrap();
            tracker
        });
    }

    let mut saved = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        saved.push(joined.unwrap());
    }
    assert_eq!(saved.len(), 8);
    for tracker in saved {
        let loaded = store.retrieve(tracker.sender_id()).await.unwrap();
        assert_eq!(loaded, Some(tracker));
    }
    assert_eq!(store.keys().await.unwrap().len(), 8);
}

#[tokio::test]
async fn in_memory_store_satisfies_contract() {
    check_contract(&InMemoryTrackerStore::new(domain())).await;
}

#[tokio::test]
async fn in_memory_key_value_store_satisfies_contract() {
    check_contract(&KeyValueTrackerStore::new(InMemoryKeyValue::new(), domain())).await;
}

#[tokio::test]
async fn sqlite_store_satisfies_contract() {
    let tmp = TempDir::new().unwrap();
    let kv = SqliteKeyValue::open(&tmp.path().join("trackers.db")).unwrap();
    check_contract(&KeyValueTrackerStore::new(kv, domain()).with_key_prefix("bot:")).await;
}

#[tokio::test]
async fn sqlite_store_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("trackers.db");

    let store = KeyValueTrackerStore::new(SqliteKeyValue::open(&path).unwrap(), domain());
    let mut tracker = store.get_or_create("alice").await.unwrap();
    tracker.update(Event::slot_set("location", "Oslo")).unwrap();
    store.save(&tracker).await.unwrap();
    drop(store);

    let reopened = KeyValueTrackerStore::new(SqliteKeyValue::open(&path).unwrap(), domain());
    assert_eq!(reopened.retrieve("alice").await.unwrap(), Some(tracker));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sessions_do_not_interfere() {
    check_concurrent_sessions(Arc::new(InMemoryTrackerStore::new(domain()))).await;
    check_concurrent_sessions(Arc::new(KeyValueTrackerStore::new(
        InMemoryKeyValue::new(),
        domain(),
    )))
    .await;

    let tmp = TempDir::new().unwrap();
    let kv = SqliteKeyValue::open(&tmp.path().join("trackers.db")).unwrap();
    check_concurrent_sessions(Arc::new(KeyValueTrackerStore::new(kv, domain()))).await;

    let server = spawn_kv_server().await;
    let kv = HttpKeyValue::new(&format!("{}/kv", server.base), Duration::from_secs(5));
    check_concurrent_sessions(Arc::new(KeyValueTrackerStore::new(kv, domain()))).await;
}

// ── HTTP backend against an in-process key-value server ──

/// Records and the last `ttl` query value seen per key.
#[derive(Clone, Default)]
struct KvServer {
    base: String,
    records: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    ttls: Arc<Mutex<HashMap<String, String>>>,
}

async fn get_record(
    State(server): State<KvServer>,
    Path(key): Path<String>,
) -> Result<Vec<u8>, StatusCode> {
    server.records.lock().get(&key).cloned().ok_or(StatusCode::NOT_FOUND)
}

async fn put_record(
    State(server): State<KvServer>,
    Path(key): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> StatusCode {
    if let Some(ttl) = params.get("ttl") {
        server.ttls.lock().insert(key.clone(), ttl.clone());
    }
    server.records.lock().insert(key, body.to_vec());
    StatusCode::NO_CONTENT
}

async fn delete_record(State(server): State<KvServer>, Path(key): Path<String>) -> StatusCode {
    match server.records.lock().remove(&key) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

async fn list_keys(
    State(server): State<KvServer>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Json<Vec<String>> {
    let prefix = params.get("prefix").cloned().unwrap_or_default();
    let mut keys: Vec<String> = server
        .records
        .lock()
        .keys()
        .filter(|key| key.starts_with(&prefix))
        .cloned()
        .collect();
    keys.sort();
    Json(keys)
}

async fn stall() -> StatusCode {
    tokio::time::sleep(Duration::from_secs(30)).await;
    StatusCode::OK
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Serve a key-value API under `/kv`, plus `/slow` and `/broken` prefixes
/// for failure cases.
async fn spawn_kv_server() -> KvServer {
    let mut server = KvServer::default();
    let app = Router::new()
        .route("/kv", get(list_keys))
        .route(
            "/kv/{key}",
            get(get_record).put(put_record).delete(delete_record),
        )
        .route("/slow/{key}", get(stall).put(stall))
        .route("/broken/{key}", get(broken).put(broken))
        .with_state(server.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    server.base = format!("http://{addr}");
    server
}

#[tokio::test]
async fn http_store_satisfies_contract() {
    let base = spawn_kv_server().await.base;
    let kv = HttpKeyValue::new(&format!("{base}/kv"), Duration::from_secs(5));
    check_contract(&KeyValueTrackerStore::new(kv, domain())).await;
}

#[tokio::test]
async fn http_delete_is_idempotent() {
    use dialogue_tracker::store::KeyValueBackend;

    let base = spawn_kv_server().await.base;
    let kv = HttpKeyValue::new(&format!("{base}/kv"), Duration::from_secs(5));
    kv.set("tracker:a", b"{}".to_vec(), None).await.unwrap();
    kv.delete("tracker:a").await.unwrap();
    kv.delete("tracker:a").await.unwrap();
    assert_eq!(kv.get("tracker:a").await.unwrap(), None);
}

#[tokio::test]
async fn http_server_error_is_unavailable() {
    let base = spawn_kv_server().await.base;
    let kv = HttpKeyValue::new(&format!("{base}/broken"), Duration::from_secs(5));
    let store = KeyValueTrackerStore::new(kv, domain());

    assert!(matches!(
        store.retrieve("alice").await,
        Err(StoreError::Unavailable { .. })
    ));
    assert!(store.get_or_create("alice").await.is_err());
}

#[tokio::test]
async fn slow_http_server_times_out() {
    let base = spawn_kv_server().await.base;
    let kv = HttpKeyValue::new(&format!("{base}/slow"), Duration::from_secs(60));
    let store = KeyValueTrackerStore::new(kv, domain()).with_timeout(Duration::from_millis(200));

    assert!(matches!(
        store.retrieve("alice").await,
        Err(StoreError::Timeout {
            operation: "retrieve",
            ..
        })
    ));
}

#[tokio::test]
async fn http_sub_second_expiry_rounds_up() {
    let server = spawn_kv_server().await;
    let kv = HttpKeyValue::new(&format!("{}/kv", server.base), Duration::from_secs(5));
    let store = KeyValueTrackerStore::new(kv, domain())
        .with_record_expiry(Some(Duration::from_millis(500)));
    store.get_or_create("alice").await.unwrap();

    assert_eq!(
        server.ttls.lock().get("tracker:alice").map(String::as_str),
        Some("1")
    );
}
