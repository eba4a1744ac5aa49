//! HTTP route tests
//!
//! Drive the router directly with `tower::ServiceExt::oneshot`, no socket.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::Router;
use http::{Method, Request, StatusCode};
use ledgerkv::config::{Config, LogBackend, WalSyncStrategy};
use ledgerkv::engine::Engine;
use ledgerkv::network::{create_router, ApiError, SharedEngine};
use ledgerkv::LedgerError;
use tempfile::TempDir;
use tower::ServiceExt;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_app() -> (TempDir, SharedEngine, Router) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .build();
    let engine = Arc::new(Engine::open(config).unwrap());
    let router = create_router(Arc::clone(&engine));
    (temp_dir, engine, router)
}

async fn send(router: &Router, method: Method, uri: &str, body: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

// =============================================================================
// Key Route Tests
// =============================================================================

#[tokio::test]
async fn test_put_then_get() {
    let (_temp, _engine, router) = setup_temp_app();

    let (status, _) = send(&router, Method::PUT, "/v1/key/greeting", "hello world").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&router, Method::GET, "/v1/key/greeting", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "hello world");
}

#[tokio::test]
async fn test_get_missing_key_is_404() {
    let (_temp, _engine, router) = setup_temp_app();

    let (status, body) = send(&router, Method::GET, "/v1/key/nothing", "").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "no such key");
}

#[tokio::test]
async fn test_put_overwrites() {
    let (_temp, engine, router) = setup_temp_app();

    send(&router, Method::PUT, "/v1/key/k", "one").await;
    let (status, _) = send(&router, Method::PUT, "/v1/key/k", "two").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(engine.get("k").unwrap(), "two");
}

#[tokio::test]
async fn test_delete_existing_and_missing() {
    let (_temp, _engine, router) = setup_temp_app();
    send(&router, Method::PUT, "/v1/key/doomed", "x").await;

    let (status, _) = send(&router, Method::DELETE, "/v1/key/doomed", "").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&router, Method::GET, "/v1/key/doomed", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&router, Method::DELETE, "/v1/key/doomed", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_put_invalid_value_is_400() {
    let (_temp, engine, router) = setup_temp_app();

    let (status, _) = send(&router, Method::PUT, "/v1/key/k", "two\nlines").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(engine.key_count(), 0);
}

#[tokio::test]
async fn test_put_non_utf8_body_is_400() {
    let (_temp, _engine, router) = setup_temp_app();

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/v1/key/bin")
        .body(Body::from(vec![0xff, 0xfe, 0xfd]))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_all_pairs() {
    let (_temp, _engine, router) = setup_temp_app();
    send(&router, Method::PUT, "/v1/key/b", "2").await;
    send(&router, Method::PUT, "/v1/key/a", "1").await;

    let (status, body) = send(&router, Method::GET, "/v1/key", "").await;
    assert_eq!(status, StatusCode::OK);

    let pairs: BTreeMap<String, String> = serde_json::from_str(&body).unwrap();
    let expected: BTreeMap<String, String> = [("a", "1"), ("b", "2")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert_eq!(pairs, expected);
}

#[tokio::test]
async fn test_writes_reach_the_log() {
    let (_temp, engine, router) = setup_temp_app();
    send(&router, Method::PUT, "/v1/key/a", "1").await;
    send(&router, Method::PUT, "/v1/key/b", "2").await;
    send(&router, Method::DELETE, "/v1/key/a", "").await;

    engine.close().unwrap();

    assert_eq!(engine.last_sequence(), 3);
}

#[tokio::test]
async fn test_put_succeeds_when_background_write_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .log_backend(LogBackend::Sqlite)
        .build();
    let engine = Arc::new(Engine::open(config.clone()).unwrap());
    let router = create_router(Arc::clone(&engine));

    let conn = rusqlite::Connection::open(config.log_path()).unwrap();
    conn.execute_batch("DROP TABLE transactions").unwrap();
    drop(conn);

    let (status, _) = send(&router, Method::PUT, "/v1/key/k", "v").await;
    assert_eq!(status, StatusCode::CREATED);

    engine.close().unwrap();
    let (_, body) = send(&router, Method::GET, "/health", "").await;
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["write_failures"], 1);

    let (status, body) = send(&router, Method::GET, "/v1/key/k", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "v");
}

// =============================================================================
// Health Route Tests
// =============================================================================

#[tokio::test]
async fn test_health() {
    let (_temp, _engine, router) = setup_temp_app();

    let (status, body) = send(&router, Method::GET, "/health", "").await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["write_failures"], 0);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (_temp, _engine, router) = setup_temp_app();

    let (status, _) = send(&router, Method::GET, "/v2/nope", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Error Mapping Tests
// =============================================================================

#[test]
fn test_api_error_status() {
    assert_eq!(ApiError(LedgerError::KeyNotFound).status(), StatusCode::NOT_FOUND);
    assert_eq!(
        ApiError(LedgerError::InvalidKey("bad".to_string())).status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        ApiError(LedgerError::DurableWrite("disk".to_string())).status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(
        ApiError(LedgerError::LogState("closed".to_string())).status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
