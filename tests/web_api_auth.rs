//! Web API Authentication Tests
//!
//! Integration tests for accounts, sessions and protected file routes.

use axum::http::{header::AUTHORIZATION, StatusCode};
use axum_test::TestServer;
use cloudbox::config::ServerConfig;
use cloudbox::web::middleware::{JwtState, RateLimitState};
use cloudbox::web::{create_router, AppState};
use cloudbox::{MemoryStore, StorageQuota};
use serde_json::{json, Value};
use std::sync::Arc;

const TEST_SECRET: &str = "test-secret-key-for-testing-only";

/// Create a test server with authentication enabled.
fn create_test_server() -> TestServer {
    create_test_server_with_limit(100)
}

fn create_test_server_with_limit(login_rate_limit: u32) -> TestServer {
    let state = AppState::new(Arc::new(MemoryStore::new()), StorageQuota::default())
        .with_auth(Arc::new(JwtState::new(TEST_SECRET, 900)));
    let rate_limit = Arc::new(RateLimitState::new(login_rate_limit));

    let router = create_router(state, Some(rate_limit), &ServerConfig::default());
    TestServer::new(router).expect("Failed to create test server")
}

/// Register a user and return the response body.
async fn register_user(server: &TestServer, username: &str, password: &str) -> Value {
    let response = server
        .post("/api/register")
        .json(&json!({ "username": username, "password": password }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()
}

async fn login_user(server: &TestServer, username: &str, password: &str) -> axum_test::TestResponse {
    server
        .post("/api/login")
        .json(&json!({ "username": username, "password": password }))
        .await
}

fn token_of(body: &Value) -> String {
    body["token"].as_str().expect("token").to_string()
}

// ============================================================================
// Registration and login
// ============================================================================

#[tokio::test]
async fn test_register_success() {
    let server = create_test_server();

    let body = register_user(&server, "alice", "password123").await;

    assert!(body["token"].is_string());
    assert_eq!(body["expiresIn"], 900);
    assert_eq!(body["user"]["id"], 1);
    assert_eq!(body["user"]["username"], "alice");
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
async fn test_register_duplicate_username() {
    let server = create_test_server();
    register_user(&server, "alice", "password123").await;

    let response = server
        .post("/api/register")
        .json(&json!({ "username": "ALICE", "password": "password456" }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_register_validation() {
    let server = create_test_server();

    let response = server
        .post("/api/register")
        .json(&json!({ "username": "a b", "password": "short" }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body = response.json::<Value>();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["details"]["username"].is_array());
    assert!(body["error"]["details"]["password"].is_array());
}

#[tokio::test]
async fn test_login_success() {
    let server = create_test_server();
    register_user(&server, "alice", "password123").await;

    let response = login_user(&server, "Alice", "password123").await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert!(body["token"].is_string());
    assert_eq!(body["user"]["username"], "alice");
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let server = create_test_server();
    register_user(&server, "alice", "password123").await;

    let wrong_password = login_user(&server, "alice", "wrongpassword").await;
    wrong_password.assert_status(StatusCode::UNAUTHORIZED);

    let unknown_user = login_user(&server, "nobody", "password123").await;
    unknown_user.assert_status(StatusCode::UNAUTHORIZED);

    assert_eq!(
        wrong_password.json::<Value>()["error"]["message"],
        unknown_user.json::<Value>()["error"]["message"]
    );
}

// ============================================================================
// Sessions
// ============================================================================

#[tokio::test]
async fn test_current_user() {
    let server = create_test_server();
    let token = token_of(&register_user(&server, "alice", "password123").await);

    let response = server
        .get("/api/user")
        .add_header(AUTHORIZATION, format!("Bearer {}", token))
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["username"], "alice");

    server
        .get("/api/user")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let server = create_test_server();
    let token = token_of(&register_user(&server, "alice", "password123").await);

    let response = server
        .post("/api/logout")
        .add_header(AUTHORIZATION, format!("Bearer {}", token))
        .await;
    response.assert_status_ok();
    response.assert_json(&json!({ "success": true }));

    server
        .get("/api/files")
        .add_header(AUTHORIZATION, format!("Bearer {}", token))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // A fresh login works again
    let body = login_user(&server, "alice", "password123").await.json::<Value>();
    server
        .get("/api/files")
        .add_header(AUTHORIZATION, format!("Bearer {}", token_of(&body)))
        .await
        .assert_status_ok();
}

// ============================================================================
// Protected file routes
// ============================================================================

#[tokio::test]
async fn test_file_routes_require_token() {
    let server = create_test_server();

    for path in ["/api/files", "/api/files/1", "/api/files/search", "/api/storage"] {
        let response = server.get(path).await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["error"]["code"], "UNAUTHORIZED");
    }

    server
        .get("/api/files")
        .add_header(AUTHORIZATION, "Bearer not-a-jwt")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // Health stays public
    server.get("/health").await.assert_status_ok();
}

#[tokio::test]
async fn test_uploads_record_owner() {
    let server = create_test_server();
    let alice = register_user(&server, "alice", "password123").await;
    let token = token_of(&alice);

    let created = server
        .post("/api/files")
        .add_header(AUTHORIZATION, format!("Bearer {}", token))
        .json(&json!({ "name": "notes.txt", "content": "aGk=", "isFolder": false }))
        .await;

    created.assert_status(StatusCode::CREATED);
    assert_eq!(created.json::<Value>()["ownerId"], alice["user"]["id"]);

    let storage = server
        .get("/api/storage")
        .add_header(AUTHORIZATION, format!("Bearer {}", token))
        .await
        .json::<Value>();
    assert_eq!(storage["used"], 2);
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test]
async fn test_login_rate_limit() {
    let server = create_test_server_with_limit(3);

    for _ in 0..3 {
        login_user(&server, "nobody", "password123")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    let limited = login_user(&server, "nobody", "password123").await;
    limited.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.json::<Value>()["error"]["code"], "TOO_MANY_REQUESTS");

    // Only the credential endpoints are limited
    let other = server.get("/api/files").await;
    other.assert_status(StatusCode::UNAUTHORIZED);
}
