use axum::Json;
use axum::extract::State;
use procgate_gateway::{CredentialStatus, MetricsSnapshot};
use serde::Serialize;

use super::AppState;

/// Audit writer counters.
#[derive(Debug, Serialize)]
pub struct AuditStats {
    pub written: u64,
    pub dropped: u64,
    pub failed: u64,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub gateway: MetricsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditStats>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub credential: CredentialStatus,
    pub metrics: MetricsResponse,
}

fn build_metrics_response(state: &AppState) -> MetricsResponse {
    let audit = state.gateway.audit().map(|emitter| AuditStats {
        written: emitter.written(),
        dropped: emitter.dropped(),
        failed: emitter.failed(),
    });
    MetricsResponse {
        gateway: state.gateway.metrics().snapshot(),
        audit,
    }
}

/// `GET /health` -- service status, cached credential state, and metrics.
///
/// Always 200 while the process serves requests; a cold or stale credential
/// shows up in `credential`, not in the status code.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let credential = state.gateway.credentials().snapshot().await;
    Json(HealthResponse {
        status: "ok",
        credential,
        metrics: build_metrics_response(&state),
    })
}

/// `GET /metrics` -- gateway counters as JSON.
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(build_metrics_response(&state))
}
