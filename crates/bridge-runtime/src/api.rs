//! # HTTP Surface
//!
//! Requesting-network facing routes:
//!
//! - `POST /v1/relay` - run one round for an authorized caller
//! - `GET /health` - registry and epoch status
//! - `GET /metrics` - Prometheus text

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bridge_validator::{BridgeError, CallerId, EpochLedger, PeerRegistry, RelayApi, RelayOutcome};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::error;

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Provider subnet.
    pub netuid: u16,
    /// Relay entry point.
    pub relay: Arc<dyn RelayApi>,
    /// Peer registry, for health.
    pub registry: Arc<PeerRegistry>,
    /// Epoch ledger, for health.
    pub ledger: Arc<EpochLedger>,
}

/// Body of `POST /v1/relay`.
#[derive(Debug, Deserialize)]
pub struct RelayRequest {
    /// Requesting identity.
    pub caller: CallerId,
    /// Opaque task payload.
    pub payload: Value,
    /// Caller budget; clamped by the relay.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/relay", post(handle_relay))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_relay(
    State(state): State<AppState>,
    Json(request): Json<RelayRequest>,
) -> Response {
    let budget = request.timeout_ms.map(Duration::from_millis);
    match state
        .relay
        .handle(request.caller, request.payload, budget)
        .await
    {
        Ok(RelayOutcome::Answered(top)) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "peer": top.peer(),
                "score": top.score,
                "latency_ms": top.latency().as_millis() as u64,
                "payload": top.payload(),
            })),
        )
            .into_response(),
        Ok(RelayOutcome::NoResponse) => {
            (StatusCode::OK, Json(json!({ "status": "empty" }))).into_response()
        }
        Ok(RelayOutcome::TimedOut) => {
            (StatusCode::GATEWAY_TIMEOUT, Json(json!({ "status": "timeout" }))).into_response()
        }
        Err(BridgeError::PermissionDenied { reason, .. }) => (
            StatusCode::FORBIDDEN,
            Json(json!({ "status": "permission_denied", "reason": reason })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "[relay] Request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "reason": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.registry.current();
    Json(json!({
        "status": if state.registry.has_loaded() { "ok" } else { "starting" },
        "netuid": state.netuid,
        "peers": snapshot.len(),
        "snapshot_age_secs": state.registry.staleness(),
        "open_epoch": state.ledger.open_epoch(),
        "last_committed_epoch": state.ledger.last_committed_epoch(),
        "commit_pending": state.ledger.has_pending(),
    }))
}

async fn metrics() -> Response {
    match bridge_telemetry::gather_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
