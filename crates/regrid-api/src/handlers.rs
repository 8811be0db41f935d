//! REST API handlers.
//!
//! Ingestion handlers validate the reported identity, apply the node
//! selector, and forward into the watch feeds; reads serve cache
//! snapshots and engine counters as JSON.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::debug;

use regrid_state::{NodeCondition, NodeRecord, ResourceKey, WorkloadSet};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

// ── Node reports ───────────────────────────────────────────────

/// Body of a node status report.
#[derive(Debug, serde::Deserialize)]
pub struct NodeReport {
    #[serde(default)]
    pub labels: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub conditions: Vec<NodeCondition>,
}

/// PUT /api/v1/nodes/:name
pub async fn put_node(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(report): Json<NodeReport>,
) -> impl IntoResponse {
    let key = match ResourceKey::cluster_scoped(&name) {
        Ok(key) => key,
        Err(e) => return error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response(),
    };

    if !state.node_selector.matches(&report.labels) {
        debug!(%key, "node report outside selector, not forwarded");
        return ApiResponse::ok("filtered").into_response();
    }

    let record = NodeRecord {
        name,
        labels: report.labels,
        conditions: report.conditions,
    };
    state.node_feed.applied(key, record);
    ApiResponse::ok("accepted").into_response()
}

/// DELETE /api/v1/nodes/:name
pub async fn delete_node(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let key = match ResourceKey::cluster_scoped(&name) {
        Ok(key) => key,
        Err(e) => return error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response(),
    };
    state.node_feed.removed(key);
    ApiResponse::ok("removed").into_response()
}

/// GET /api/v1/nodes
pub async fn list_nodes(State(state): State<ApiState>) -> impl IntoResponse {
    let mut nodes: Vec<NodeRecord> = state
        .engine
        .node_cache()
        .list()
        .into_iter()
        .map(|(_, n)| n)
        .collect();
    nodes.sort_by(|a, b| a.name.cmp(&b.name));
    ApiResponse::ok(nodes)
}

// ── Workload set reports ───────────────────────────────────────

/// Body of a workload set status report.
#[derive(Debug, serde::Deserialize)]
pub struct WorkloadSetReport {
    #[serde(default)]
    pub labels: std::collections::HashMap<String, String>,
    pub desired_replicas: u32,
    pub ready_replicas: u32,
}

/// PUT /api/v1/workloadsets/:namespace/:name
pub async fn put_workload_set(
    State(state): State<ApiState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(report): Json<WorkloadSetReport>,
) -> impl IntoResponse {
    let key = match ResourceKey::namespaced(&namespace, &name) {
        Ok(key) => key,
        Err(e) => return error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response(),
    };

    let record = WorkloadSet {
        namespace,
        name,
        labels: report.labels,
        desired_replicas: report.desired_replicas,
        ready_replicas: report.ready_replicas,
    };
    state.workload_set_feed.applied(key, record);
    ApiResponse::ok("accepted").into_response()
}

/// DELETE /api/v1/workloadsets/:namespace/:name
pub async fn delete_workload_set(
    State(state): State<ApiState>,
    Path((namespace, name)): Path<(String, String)>,
) -> impl IntoResponse {
    let key = match ResourceKey::namespaced(&namespace, &name) {
        Ok(key) => key,
        Err(e) => return error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response(),
    };
    state.workload_set_feed.removed(key);
    ApiResponse::ok("removed").into_response()
}

/// GET /api/v1/workloadsets
pub async fn list_workload_sets(State(state): State<ApiState>) -> impl IntoResponse {
    let mut sets: Vec<WorkloadSet> = state
        .engine
        .workload_set_cache()
        .list()
        .into_iter()
        .map(|(_, ws)| ws)
        .collect();
    sets.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
    ApiResponse::ok(sets)
}

// ── Engine status ──────────────────────────────────────────────

/// Body of the status endpoint.
#[derive(Debug, serde::Serialize)]
pub struct StatusBody {
    pub nodes_synced: bool,
    pub workload_sets_synced: bool,
    pub queue_depth: usize,
    pub stats: regrid_core::StatsSnapshot,
}

/// GET /api/v1/status
pub async fn status(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(StatusBody {
        nodes_synced: state.engine.nodes_synced(),
        workload_sets_synced: state.engine.workload_sets_synced(),
        queue_depth: state.engine.queue_depth(),
        stats: state.engine.stats(),
    })
}

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    "ok"
}
