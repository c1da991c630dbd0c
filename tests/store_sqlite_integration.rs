//! Integration tests for SqliteStore.
//!
//! Uses file-backed SQLite under a tempdir so each test gets an isolated
//! database, plus one in-memory smoke test.

use serde_json::{json, Value};
use tempfile::TempDir;

use fieldstore::config::DatabaseConfig;
use fieldstore::error::StoreError;
use fieldstore::store::{Dump, HistoryEntry, Observation, SqliteStore};

async fn temp_store(dir: &TempDir) -> SqliteStore {
    let path = dir.path().join("records.db");
    // Use bare path so absolute path is preserved (sqlite:// strips leading slash on Unix)
    let config = DatabaseConfig::for_test(&path.to_string_lossy());
    SqliteStore::new(&config).await.expect("SqliteStore::new")
}

#[tokio::test]
async fn test_in_memory_store_opens_and_migrates() {
    let config = DatabaseConfig::for_test("sqlite://");
    let store = SqliteStore::new(&config).await.expect("SqliteStore::new");
    store.run_migrations().await.expect("run_migrations is idempotent");
}

#[tokio::test]
async fn test_put_then_get_returns_single_record() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = temp_store(&dir).await;

    let obs = Observation::new("t1", "2024-01-01", "C1")
        .with_field("result", json!("positive"));
    store.put_observation(&obs).await.expect("put_observation");

    let found = store
        .observations_by_tech_date("t1", "2024-01-01")
        .await
        .expect("observations_by_tech_date");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].key, "t1|2024-01-01|C1");
    assert_eq!(found[0], obs);
}

#[tokio::test]
async fn test_put_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = temp_store(&dir).await;

    let obs = Observation::new("t1", "2024-01-01", "C1");
    store.put_observation(&obs).await.expect("first put");
    store.put_observation(&obs).await.expect("second put");

    let found = store
        .observations_by_tech_date("t1", "2024-01-01")
        .await
        .expect("get");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0], obs);
}

#[tokio::test]
async fn test_put_overwrites_same_key() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = temp_store(&dir).await;

    let first = Observation::new("t1", "2024-01-01", "C1").with_field("cfu", json!(10));
    let second = Observation::new("t1", "2024-01-01", "C1").with_field("cfu", json!(250));
    store.put_observation(&first).await.expect("put first");
    store.put_observation(&second).await.expect("put second");

    let found = store
        .observations_by_tech_date("t1", "2024-01-01")
        .await
        .expect("get");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].extra["cfu"], json!(250));
}

#[tokio::test]
async fn test_put_rejects_inconsistent_key() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = temp_store(&dir).await;

    let mut obs = Observation::new("t1", "2024-01-01", "C1");
    obs.key = "someone-else|2024-01-01|C1".to_string();

    let err = store.put_observation(&obs).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidRecord(_)), "got {err:?}");

    let found = store
        .observations_by_tech_date("t1", "2024-01-01")
        .await
        .expect("get");
    assert!(found.is_empty());
}

#[tokio::test]
async fn test_delete_by_tech_date_removes_all_matches() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = temp_store(&dir).await;

    for code in ["C1", "C2", "C3"] {
        store
            .put_observation(&Observation::new("t1", "2024-01-01", code))
            .await
            .expect("put");
    }
    // Different date, must survive the delete
    let other = Observation::new("t1", "2024-01-02", "C1");
    store.put_observation(&other).await.expect("put other");

    store
        .delete_observations_by_tech_date("t1", "2024-01-01")
        .await
        .expect("delete");

    let gone = store
        .observations_by_tech_date("t1", "2024-01-01")
        .await
        .expect("get deleted");
    assert!(gone.is_empty());

    let kept = store
        .observations_by_tech_date("t1", "2024-01-02")
        .await
        .expect("get kept");
    assert_eq!(kept, vec![other]);
}

#[tokio::test]
async fn test_delete_with_no_matches_is_noop() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = temp_store(&dir).await;

    store
        .delete_observations_by_tech_date("nobody", "2024-01-01")
        .await
        .expect("delete on empty set");
}

#[tokio::test]
async fn test_history_ids_strictly_increase() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = temp_store(&dir).await;

    let mut last = 0;
    for i in 0..5 {
        let id = store
            .add_history_entry(&HistoryEntry::new("t1", "2024-01-01", i))
            .await
            .expect("add_history_entry");
        assert!(id > last, "id {id} not greater than {last}");
        last = id;
    }
}

#[tokio::test]
async fn test_history_by_tech_newest_first_truncated() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = temp_store(&dir).await;

    for ts in [10, 30, 20] {
        store
            .add_history_entry(&HistoryEntry::new("t1", "2024-01-01", ts))
            .await
            .expect("add");
    }
    // Another technician, must not show up
    store
        .add_history_entry(&HistoryEntry::new("t2", "2024-01-01", 99))
        .await
        .expect("add other tech");

    let entries = store.history_by_tech("t1", Some(2)).await.expect("history_by_tech");
    let ts: Vec<i64> = entries.iter().map(|e| e.ts).collect();
    assert_eq!(ts, vec![30, 20]);
}

#[tokio::test]
async fn test_history_missing_timestamp_sorts_last() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = temp_store(&dir).await;

    // ts 0 stands in for "no timestamp recorded"
    store
        .add_history_entry(&HistoryEntry::new("t1", "2024-01-01", 0))
        .await
        .expect("add untimestamped");
    store
        .add_history_entry(&HistoryEntry::new("t1", "2024-01-01", 50))
        .await
        .expect("add timestamped");

    let entries = store.history_by_tech("t1", None).await.expect("history_by_tech");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].ts, 50);
    assert_eq!(entries[1].ts, 0);
}

#[tokio::test]
async fn test_export_all_snapshots_both_collections() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = temp_store(&dir).await;

    let obs = Observation::new("t1", "2024-01-01", "C1");
    store.put_observation(&obs).await.expect("put");
    let id = store
        .add_history_entry(&HistoryEntry::new("t1", "2024-01-01", 123))
        .await
        .expect("add");

    let dump = store.export_all().await.expect("export_all");
    assert_eq!(dump.ot, vec![obs]);
    assert_eq!(dump.history.len(), 1);
    assert_eq!(dump.history[0].id, Some(id));
    assert_eq!(dump.history[0].ts, 123);
}

#[tokio::test]
async fn test_import_renumbers_history_ids() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = temp_store(&dir).await;

    let mut stale = HistoryEntry::new("t1", "2024-01-01", 42);
    stale.id = Some(999);
    let dump = Dump {
        ot: Vec::new(),
        history: vec![stale],
    };
    store.import_all(&dump).await.expect("import_all");

    let entries = store.history_by_tech("t1", None).await.expect("history_by_tech");
    assert_eq!(entries.len(), 1);
    let id = entries[0].id.expect("store-assigned id");
    assert_ne!(id, 999);
    assert_eq!(entries[0].ts, 42);
}

#[tokio::test]
async fn test_import_overwrites_colliding_ot_keys() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = temp_store(&dir).await;

    let original = Observation::new("t1", "2024-01-01", "C1").with_field("cfu", json!(10));
    store.put_observation(&original).await.expect("put original");

    let replacement = Observation::new("t1", "2024-01-01", "C1").with_field("cfu", json!(500));
    let dump = Dump {
        ot: vec![replacement],
        history: Vec::new(),
    };
    store.import_all(&dump).await.expect("import_all");

    let found = store
        .observations_by_tech_date("t1", "2024-01-01")
        .await
        .expect("get");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].extra["cfu"], json!(500));
}

#[tokio::test]
async fn test_import_first_error_leaves_prior_writes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = temp_store(&dir).await;

    // History imports first, then observations; the bad key fails the ot
    // pass after the history entry has already landed.
    let mut bad = Observation::new("t1", "2024-01-01", "C1");
    bad.key = "t2|2024-01-01|C1".to_string();
    let dump = Dump {
        ot: vec![bad],
        history: vec![HistoryEntry::new("t1", "2024-01-01", 42)],
    };

    let err = store.import_all(&dump).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidRecord(_)), "got {err:?}");

    // Prior history write stands; nothing from the failed ot pass landed
    let entries = store.history_by_tech("t1", None).await.expect("history_by_tech");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].ts, 42);

    let obs = store
        .observations_by_tech_date("t1", "2024-01-01")
        .await
        .expect("get");
    assert!(obs.is_empty());
}

#[tokio::test]
async fn test_import_empty_dump_is_noop() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = temp_store(&dir).await;

    store.import_all(&Dump::default()).await.expect("import empty");
    let dump = store.export_all().await.expect("export_all");
    assert!(dump.ot.is_empty());
    assert!(dump.history.is_empty());
}

#[tokio::test]
async fn test_import_dump_with_unknown_fields() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = temp_store(&dir).await;

    // Shape of a dump exported by the original app: extra fields everywhere,
    // a stale history id, and a history entry without ts.
    let json = r#"{
        "ot": [
            {"key":"t1|2024-01-01|C1","tech":"t1","date":"2024-01-01","code":"C1",
             "site":"Cooling tower 3","cfu":120}
        ],
        "history": [
            {"id":7,"tech":"t1","date":"2024-01-01","ts":1704100000000,"action":"save"},
            {"tech":"t1","date":"2024-01-01","action":"export"}
        ]
    }"#;
    let dump: Dump = serde_json::from_str(json).expect("parse dump");
    store.import_all(&dump).await.expect("import_all");

    let obs = store
        .observations_by_tech_date("t1", "2024-01-01")
        .await
        .expect("get");
    assert_eq!(obs.len(), 1);
    assert_eq!(obs[0].extra["site"], Value::String("Cooling tower 3".into()));
    assert_eq!(obs[0].extra["cfu"], json!(120));

    let entries = store.history_by_tech("t1", None).await.expect("history");
    assert_eq!(entries.len(), 2);
    // Timestamped entry first, untimestamped (ts 0) last
    assert_eq!(entries[0].extra["action"], Value::String("save".into()));
    assert_ne!(entries[0].id, Some(7));
    assert_eq!(entries[1].ts, 0);
}
