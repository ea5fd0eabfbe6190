use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method};
use procgate_gateway::{ForwardRequest, Operation};

use super::request_id::RequestId;

/// Everything about an inbound request the gateway needs besides the
/// operation itself.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub request_id: String,
    pub method: Method,
    /// Raw (still percent-encoded) path.
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub client_ip: Option<String>,
}

impl Inbound {
    pub fn into_forward(self, operation: Operation) -> ForwardRequest {
        let req = ForwardRequest::new(self.request_id, operation, self.method, self.path)
            .headers(self.headers);
        match self.client_ip {
            Some(ip) => req.client_ip(ip),
            None => req,
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Inbound {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .map_or_else(|| uuid::Uuid::now_v7().to_string(), |id| id.0.clone());

        Ok(Self {
            request_id,
            method: parts.method.clone(),
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            client_ip: client_ip(parts),
            headers: parts.headers.clone(),
        })
    }
}

/// First `x-forwarded-for` hop, else the socket peer.
fn client_ip(parts: &Parts) -> Option<String> {
    let forwarded = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return Some(ip.to_owned());
    }
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}
