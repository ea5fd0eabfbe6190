pub mod bounties;
pub mod health;
pub mod inbound;
pub mod proxy;
pub mod request_id;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::middleware;
use axum::response::Response;
use axum::routing::{any, get};
use procgate_gateway::{Gateway, LegacyResponse};
use tower_http::trace::TraceLayer;

pub use self::inbound::Inbound;
pub use self::request_id::{REQUEST_ID_HEADER, RequestId};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The gateway instance.
    pub gateway: Arc<Gateway>,
    /// Inbound prefix routed to generic pass-through, e.g. `/api/v1/internal`.
    pub passthrough_prefix: String,
}

/// Build the Axum router with the bounty routes, pass-through, and health.
pub fn router(state: AppState) -> Router {
    let prefix = state.passthrough_prefix.trim_end_matches('/').to_owned();
    let passthrough = format!("{prefix}/{{*path}}");
    let passthrough_root = format!("{prefix}/");

    Router::new()
        // Health & metrics
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
        // Translated operations
        .route("/api/v1/bounties", get(bounties::list))
        .route("/api/v1/bounties/{id}", get(bounties::detail))
        // Everything else under the prefix goes through as-is
        .route(&prefix, any(proxy::forward))
        .route(&passthrough_root, any(proxy::forward))
        .route(&passthrough, any(proxy::forward))
        .layer(middleware::from_fn(request_id::request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Turn a legacy response into ours without touching the body.
pub(crate) fn relay(legacy: LegacyResponse) -> Response {
    let mut response = Response::new(Body::from(legacy.body));
    *response.status_mut() = legacy.status;
    *response.headers_mut() = legacy.headers;
    response
}
