use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procgate_core::{AuthMethod, Caller};

/// Coarse classification of how an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The legacy system answered; its status was relayed (even if 4xx/5xx).
    Relayed,
    /// The caller's credential was missing or invalid; nothing was forwarded.
    Unauthorized,
    /// No internal credential could be obtained.
    ExchangeFailed,
    /// The legacy system was unreachable or timed out.
    UpstreamUnavailable,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relayed => "relayed",
            Self::Unauthorized => "unauthorized",
            Self::ExchangeFailed => "exchange_failed",
            Self::UpstreamUnavailable => "upstream_unavailable",
        }
    }
}

/// One gateway invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique identifier for this audit record (UUID v7).
    pub id: String,
    /// Correlates with the `x-request-id` response header.
    pub request_id: String,

    // -- Caller identity --
    /// Caller name from validated external claims (empty otherwise).
    #[serde(default)]
    pub caller_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub auth_method: AuthMethod,

    // -- Invocation --
    /// Operation name, e.g. `bounty.list` or `proxy.get`.
    pub operation: String,
    pub method: String,
    pub path: String,
    /// Status returned to the caller.
    pub status: u16,
    pub outcome: Outcome,
    #[serde(default)]
    pub client_ip: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub duration_ms: u64,
    /// Free-form context: procedure name, internal error text.
    pub detail: serde_json::Value,

    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Start a record for `operation` attributed to `caller`, with a fresh
    /// id and the current timestamp.
    pub fn new(
        request_id: impl Into<String>,
        caller: &Caller,
        operation: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            request_id: request_id.into(),
            caller_id: caller.id.clone(),
            user_id: caller.user_id.clone(),
            auth_method: caller.auth_method,
            operation: operation.into(),
            method: method.into(),
            path: path.into(),
            status: 0,
            outcome: Outcome::Relayed,
            client_ip: None,
            user_agent: None,
            duration_ms: 0,
            detail: serde_json::Value::Null,
            recorded_at: Utc::now(),
        }
    }
}
