//! HTTP RPC intake
//!
//! Thin JSON front end over the dispatcher. `POST /snapshot` and
//! `POST /validate` block until the task resolves (worker result or
//! dispatch timeout) and relay the outcome verbatim; there is no request
//! queueing here beyond what the dispatcher itself does.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use snapfarm_dispatch::Dispatcher;
use snapfarm_ipc::{TaskKind, TaskRequest};

/// Build the RPC router
pub fn router(dispatcher: Dispatcher) -> Router {
    Router::new()
        .route("/snapshot", post(snapshot))
        .route("/validate", post(validate))
        .route("/health", get(health))
        .with_state(dispatcher)
}

/// `POST /snapshot` — render and store a page capture
async fn snapshot(
    State(dispatcher): State<Dispatcher>,
    Json(request): Json<TaskRequest>,
) -> Json<Value> {
    info!(url = %request.url, "snapshot requested");
    let report = dispatcher.dispatch(TaskKind::Snapshot, request).await;

    let data = report
        .data
        .and_then(|d| serde_json::to_value(d).ok())
        .unwrap_or_else(|| json!({}));
    Json(json!({
        "status": report.status,
        "data": data,
    }))
}

/// `POST /validate` — check whether a page loads
async fn validate(
    State(dispatcher): State<Dispatcher>,
    Json(request): Json<TaskRequest>,
) -> Json<Value> {
    info!(url = %request.url, "validate requested");
    let report = dispatcher.dispatch(TaskKind::Validate, request).await;
    Json(json!({ "status": report.status }))
}

/// `GET /health` — liveness probe
async fn health(State(dispatcher): State<Dispatcher>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "workers": dispatcher.context().pool_size(),
    }))
}
