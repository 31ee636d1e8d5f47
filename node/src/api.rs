//! # HTTP Status API
//!
//! Builds the axum router that exposes a meshring node's ambient HTTP
//! surface, additive to the raw-TCP wire protocol which remains the
//! primary interface.
//!
//! ## Endpoints
//!
//! | Method | Path      | Description               |
//! |--------|-----------|---------------------------|
//! | GET    | `/health` | Liveness probe             |
//! | GET    | `/status` | Role, identity, counts     |

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::metrics::SharedMetrics;
use meshring_protocol::identity::NodeId;

/// Which role a running node is playing, for the `/status` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Seed,
    Peer,
}

/// Shared application state available to all request handlers. Cheap to
/// clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub role: NodeRole,
    pub self_id: NodeId,
    /// Membership-set size (seed) or known-peer-list size (peer).
    pub membership_count: Arc<AtomicU64>,
    /// Neighbor-set size (peer only; zero on seeds).
    pub neighbor_count: Arc<AtomicU64>,
    pub started_at: Instant,
    pub metrics: SharedMetrics,
}

/// Builds the full axum [`Router`], ready to be served on the configured
/// status port.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Response payload for `GET /status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub role: NodeRole,
    pub node_id: String,
    pub membership_count: u64,
    pub neighbor_count: u64,
    pub uptime_seconds: u64,
}

/// `GET /health` — 200 if the node is alive. Intentionally does not check
/// internal subsystem health — that belongs in `/status`.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — role, identity, membership/neighbor counts, uptime.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let resp = StatusResponse {
        role: state.role,
        node_id: state.self_id.canonical(),
        membership_count: state.membership_count.load(Ordering::Relaxed),
        neighbor_count: state.neighbor_count.load(Ordering::Relaxed),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    };
    Json(resp)
}
