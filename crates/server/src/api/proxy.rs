use axum::body::Bytes;
use axum::extract::State;
use axum::response::Response;
use procgate_gateway::Operation;

use super::{AppState, Inbound, relay};
use crate::error::ServerError;

/// `ANY {prefix}/{*path}` -- generic pass-through.
///
/// The prefix is stripped from the raw path; the rest, the query string and
/// the body go to the legacy system unchanged. The bare prefix maps to `/`.
pub async fn forward(
    State(state): State<AppState>,
    inbound: Inbound,
    body: Bytes,
) -> Result<Response, ServerError> {
    let prefix = state.passthrough_prefix.trim_end_matches('/');
    let legacy_path = match inbound.path.strip_prefix(prefix) {
        Some("") => "/".to_owned(),
        Some(rest) => rest.to_owned(),
        None => inbound.path.clone(),
    };

    let operation = Operation::Passthrough {
        method: inbound.method.clone(),
        path: legacy_path,
        query: inbound.query.clone(),
        body,
    };
    let req = inbound.into_forward(operation);
    Ok(relay(state.gateway.forward(req).await?))
}
