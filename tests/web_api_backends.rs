//! Web API over the persistent backends.
//!
//! The same requests against the disk and SQLite stores, including a
//! restart on the same data.

use axum::http::StatusCode;
use axum_test::TestServer;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cloudbox::config::ServerConfig;
use cloudbox::web::{create_router, AppState};
use cloudbox::{Backend, DiskStore, FileStore, SqliteStore, StorageQuota};
use serde_json::{json, Value};
use std::sync::Arc;

fn create_test_server<S: Backend>(store: Arc<S>) -> TestServer {
    let state = AppState::new(store, StorageQuota::default());
    TestServer::new(create_router(state, None, &ServerConfig::default()))
        .expect("Failed to create test server")
}

/// Folder with one file inside; returns the file id.
async fn populate(server: &TestServer) -> i64 {
    server
        .post("/api/files")
        .json(&json!({ "name": "Docs", "isFolder": true }))
        .await
        .assert_status(StatusCode::CREATED);

    let file = server
        .post("/api/files")
        .json(&json!({
            "name": "notes.md",
            "content": STANDARD.encode("# notes"),
            "parentId": 1
        }))
        .await;
    file.assert_status(StatusCode::CREATED);
    file.json::<Value>()["id"].as_i64().unwrap()
}

async fn assert_restored(server: &TestServer, file_id: i64) {
    let root = server.get("/api/files").await.json::<Value>();
    assert_eq!(root.as_array().unwrap().len(), 1);
    assert_eq!(root[0]["name"], "Docs");

    let file = server
        .get(&format!("/api/files/{file_id}"))
        .await
        .json::<Value>();
    assert_eq!(file["parentId"], 1);
    assert_eq!(file["mimeType"], "text/markdown");
    assert_eq!(STANDARD.decode(file["content"].as_str().unwrap()).unwrap(), b"# notes");

    let storage = server.get("/api/storage").await.json::<Value>();
    assert_eq!(storage["used"], 7);
}

#[tokio::test]
async fn test_disk_backend_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    let store = Arc::new(DiskStore::open(dir.path()).await.unwrap());
    let file_id = populate(&create_test_server(Arc::clone(&store))).await;
    store.close().await.unwrap();

    let store = Arc::new(DiskStore::open(dir.path()).await.unwrap());
    let server = create_test_server(Arc::clone(&store));
    assert_restored(&server, file_id).await;

    // Ids keep counting after a restart
    let next = server
        .post("/api/files")
        .json(&json!({ "name": "later.txt", "content": "" }))
        .await
        .json::<Value>();
    assert_eq!(next["id"], 3);
}

#[tokio::test]
async fn test_sqlite_backend_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("cloudbox.db");

    let store = Arc::new(SqliteStore::open(&db_path).await.unwrap());
    let file_id = populate(&create_test_server(Arc::clone(&store))).await;
    store.close().await.unwrap();

    let store = Arc::new(SqliteStore::open(&db_path).await.unwrap());
    let server = create_test_server(Arc::clone(&store));
    assert_restored(&server, file_id).await;

    server.delete("/api/files/1").await.assert_status_ok();
    assert_eq!(server.get("/api/storage").await.json::<Value>()["used"], 0);
}

#[tokio::test]
async fn test_sqlite_search_beyond_largest_size() {
    let server = create_test_server(Arc::new(SqliteStore::open_in_memory().await.unwrap()));
    populate(&server).await;

    let results = server
        .get("/api/files/search")
        .add_query_param("minSize", u64::MAX)
        .await;
    results.assert_status_ok();
    assert!(results.json::<Value>().as_array().unwrap().is_empty());

    let results = server
        .get("/api/files/search")
        .add_query_param("maxSize", u64::MAX)
        .await
        .json::<Value>();
    assert_eq!(results.as_array().unwrap().len(), 1);
}
