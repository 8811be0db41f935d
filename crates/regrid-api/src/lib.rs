//! regrid-api — REST surface for the Regrid daemon.
//!
//! Two halves share one router: status-report ingestion (the push feed
//! through which node agents and workload controllers inform the
//! watchers, standing in for a cluster list/watch client) and read-only
//! observability over the engine.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | PUT | `/api/v1/nodes/{name}` | Report node status |
//! | DELETE | `/api/v1/nodes/{name}` | Remove a node |
//! | PUT | `/api/v1/workloadsets/{namespace}/{name}` | Report workload set status |
//! | DELETE | `/api/v1/workloadsets/{namespace}/{name}` | Remove a workload set |
//! | GET | `/api/v1/nodes` | Cached node snapshots |
//! | GET | `/api/v1/workloadsets` | Cached workload set snapshots |
//! | GET | `/api/v1/status` | Sync flags, queue depth, counters |
//! | GET | `/healthz` | Liveness |

pub mod handlers;

use axum::Router;
use axum::routing::{get, put};

use regrid_core::EngineHandle;
use regrid_state::{LabelSelector, NodeRecord, WorkloadSet};
use regrid_watch::WatchFeeder;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub engine: EngineHandle,
    pub node_feed: WatchFeeder<NodeRecord>,
    pub workload_set_feed: WatchFeeder<WorkloadSet>,
    /// Reports from nodes outside this selector are not forwarded.
    pub node_selector: LabelSelector,
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/nodes", get(handlers::list_nodes))
        .route(
            "/nodes/{name}",
            put(handlers::put_node).delete(handlers::delete_node),
        )
        .route("/workloadsets", get(handlers::list_workload_sets))
        .route(
            "/workloadsets/{namespace}/{name}",
            put(handlers::put_workload_set).delete(handlers::delete_workload_set),
        )
        .route("/status", get(handlers::status))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
}
