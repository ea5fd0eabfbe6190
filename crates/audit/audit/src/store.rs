use async_trait::async_trait;

use crate::error::AuditError;
use crate::record::AuditRecord;

/// Trait for audit record storage backends.
///
/// The gateway only ever writes; records are consumed by operators through
/// the backend itself. Implementations must be `Send + Sync` to be shared
/// with the emitter's background task.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist an audit record.
    async fn record(&self, entry: AuditRecord) -> Result<(), AuditError>;
}
