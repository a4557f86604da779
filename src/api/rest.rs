use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;

use crate::domain::monitor_service::{MonitorResults, MonitorService, PollSummary};
use crate::domain::node::Node;
use crate::domain::types::{DaemonHealth, LabelView, NodeDetail};
use crate::monitors::ColumnDescriptor;

/// Shared application state for all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub monitors: Arc<MonitorService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/nodes", get(nodes))
        .route("/api/v1/nodes/{name}", get(node))
        .route("/api/v1/nodes/{name}/labels", get(labels))
        .route("/api/v1/nodes/{name}/enabled", put(set_enabled))
        .route("/api/v1/columns", get(columns))
        .route("/api/v1/monitors/{id}", get(monitor_results))
        .route("/api/v1/monitors/{id}/poll", post(poll_monitor))
        .route("/api/v1/poll", post(poll_all))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<DaemonHealth> {
    Json(state.monitors.health().await)
}

async fn nodes(State(state): State<AppState>) -> Json<Vec<Node>> {
    Json(state.monitors.registry().list().await)
}

async fn node(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<NodeDetail>, (StatusCode, String)> {
    state
        .monitors
        .node_detail(&name)
        .await
        .map(Json)
        .ok_or_else(|| not_found_node(&name))
}

#[derive(Debug, Deserialize)]
pub struct LabelQuery {
    /// Negative shows every label.
    #[serde(default = "default_max")]
    pub max: i32,
    #[serde(default = "default_dynamic")]
    pub dynamic: bool,
}

fn default_max() -> i32 {
    -1
}

fn default_dynamic() -> bool {
    true
}

async fn labels(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<LabelQuery>,
) -> Result<Json<LabelView>, (StatusCode, String)> {
    let node = state
        .monitors
        .registry()
        .get(&name)
        .await
        .ok_or_else(|| not_found_node(&name))?;
    Ok(Json(LabelView::new(&node, query.dynamic, query.max)))
}

#[derive(Debug, Deserialize)]
pub struct EnabledBody {
    pub enabled: bool,
}

/// Administrative toggle. Disabling takes the node offline; re-enabling a
/// node that still holds a channel brings it back online.
async fn set_enabled(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<EnabledBody>,
) -> Result<Json<Node>, (StatusCode, String)> {
    let registry = state.monitors.registry();
    registry
        .set_enabled(&name, body.enabled)
        .await
        .map_err(|_| not_found_node(&name))?;
    registry
        .get(&name)
        .await
        .map(Json)
        .ok_or_else(|| not_found_node(&name))
}

async fn columns(State(state): State<AppState>) -> Json<Vec<ColumnDescriptor>> {
    Json(state.monitors.columns())
}

/// Serve the latest results from memory. Never triggers a poll.
/// Returns 503 until the monitor's first cycle has completed.
async fn monitor_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MonitorResults>, (StatusCode, String)> {
    if state.monitors.monitor(&id).is_none() {
        return Err((StatusCode::NOT_FOUND, format!("unknown monitor '{}'", id)));
    }
    state.monitors.results(&id).await.map(Json).ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "results not yet available (first poll in progress)".to_string(),
        )
    })
}

async fn poll_monitor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PollSummary>, (StatusCode, String)> {
    state
        .monitors
        .poll(&id)
        .await
        .map(Json)
        .map_err(|e| (StatusCode::NOT_FOUND, e.to_string()))
}

async fn poll_all(State(state): State<AppState>) -> Json<Vec<PollSummary>> {
    Json(state.monitors.poll_all().await)
}

fn not_found_node(name: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("unknown node '{}'", name))
}
