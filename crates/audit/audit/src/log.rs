use async_trait::async_trait;
use tracing::info;

use crate::error::AuditError;
use crate::record::AuditRecord;
use crate::store::AuditStore;

/// Writes audit records as structured `tracing` events on the
/// `procgate::audit` target.
///
/// Used when no database backend is configured; the log pipeline becomes the
/// audit trail.
#[derive(Debug, Default)]
pub struct LogAuditStore;

impl LogAuditStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditStore for LogAuditStore {
    async fn record(&self, entry: AuditRecord) -> Result<(), AuditError> {
        let detail = serde_json::to_string(&entry.detail)
            .map_err(|e| AuditError::Serialization(e.to_string()))?;
        info!(
            target: "procgate::audit",
            id = %entry.id,
            request_id = %entry.request_id,
            caller_id = %entry.caller_id,
            user_id = entry.user_id.as_deref().unwrap_or(""),
            auth_method = %entry.auth_method,
            operation = %entry.operation,
            method = %entry.method,
            path = %entry.path,
            status = entry.status,
            outcome = entry.outcome.as_str(),
            client_ip = entry.client_ip.as_deref().unwrap_or(""),
            user_agent = entry.user_agent.as_deref().unwrap_or(""),
            duration_ms = entry.duration_ms,
            detail = %detail,
            "audit"
        );
        Ok(())
    }
}
