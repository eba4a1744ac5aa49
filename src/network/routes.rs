//! Route definitions and handlers

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;

use crate::engine::Engine;
use crate::error::{LedgerError, Result};

use super::ApiError;

/// Engine handle shared by all handlers
pub type SharedEngine = Arc<Engine>;

/// Build the router with all routes and shared state
pub fn create_router(engine: SharedEngine) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/key", get(get_all))
        .route(
            "/v1/key/{key}",
            get(get_key).put(put_key).delete(delete_key),
        )
        .with_state(engine)
}

async fn health(State(engine): State<SharedEngine>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "last_sequence": engine.last_sequence(),
        "write_failures": engine.write_failures(),
    }))
}

async fn get_all(State(engine): State<SharedEngine>) -> Json<BTreeMap<String, String>> {
    Json(engine.get_all().into_iter().collect())
}

async fn get_key(
    State(engine): State<SharedEngine>,
    Path(key): Path<String>,
) -> std::result::Result<String, ApiError> {
    Ok(engine.get(&key)?)
}

async fn put_key(
    State(engine): State<SharedEngine>,
    Path(key): Path<String>,
    body: Bytes,
) -> std::result::Result<StatusCode, ApiError> {
    let value = String::from_utf8(body.to_vec())
        .map_err(|_| LedgerError::InvalidKey("value must be valid UTF-8".to_string()))?;

    tracing::debug!(key = %key, bytes = value.len(), "PUT");
    run_blocking(move || engine.put(&key, &value)).await?;
    Ok(StatusCode::CREATED)
}

async fn delete_key(
    State(engine): State<SharedEngine>,
    Path(key): Path<String>,
) -> std::result::Result<StatusCode, ApiError> {
    tracing::debug!(key = %key, "DELETE");
    run_blocking(move || engine.delete(&key)).await?;
    Ok(StatusCode::OK)
}

/// Run an engine mutation off the async workers
async fn run_blocking<F>(f: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LedgerError::Network(format!("mutation task failed: {}", e)))?
}
