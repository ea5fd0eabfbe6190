use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use procgate_gateway::{ListQuery, Operation};
use tracing::debug;

use super::{AppState, Inbound, relay};
use crate::error::ServerError;

type QueryPairs = Vec<(String, String)>;

/// `GET /api/v1/bounties` -- list the inquiries visible to the caller.
///
/// A repeated filter keeps its first value.
pub async fn list(
    State(state): State<AppState>,
    inbound: Inbound,
    pairs: Result<Query<QueryPairs>, QueryRejection>,
) -> Result<Response, ServerError> {
    let pairs = pairs.map_or_else(
        |e| {
            debug!(request_id = %inbound.request_id, error = %e, "unreadable list query, ignoring filters");
            QueryPairs::new()
        },
        |Query(pairs)| pairs,
    );
    let req = inbound.into_forward(Operation::ListBounties(ListQuery::from_pairs(pairs)));
    Ok(relay(state.gateway.forward(req).await?))
}

/// `GET /api/v1/bounties/{id}` -- one inquiry with its lines.
pub async fn detail(
    State(state): State<AppState>,
    inbound: Inbound,
    id: Result<Path<String>, PathRejection>,
) -> Result<Response, ServerError> {
    // Undecodable ids go out as the raw segment; the legacy system answers.
    let id = match id {
        Ok(Path(id)) => id,
        Err(_) => raw_id(&inbound.path).to_owned(),
    };
    let req = inbound.into_forward(Operation::GetBounty { id });
    Ok(relay(state.gateway.forward(req).await?))
}

fn raw_id(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
}
