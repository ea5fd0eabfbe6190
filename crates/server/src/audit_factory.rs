use std::sync::Arc;

use procgate_audit::{AuditEmitter, AuditStore, LogAuditStore};
use procgate_audit_memory::MemoryAuditStore;
#[cfg(feature = "postgres")]
use procgate_audit_postgres::{PostgresAuditConfig, PostgresAuditStore};

use crate::config::AuditConfig;
use crate::error::ServerError;

/// Create an audit store from the given configuration.
#[allow(clippy::unused_async)]
pub async fn create_audit_store(config: &AuditConfig) -> Result<Arc<dyn AuditStore>, ServerError> {
    let store: Arc<dyn AuditStore> = match config.backend.as_str() {
        "log" => Arc::new(LogAuditStore::new()),
        "memory" => Arc::new(MemoryAuditStore::new()),
        #[cfg(feature = "postgres")]
        "postgres" => {
            let url = config.url.as_deref().ok_or_else(|| {
                ServerError::Config("audit postgres backend requires [audit] url".into())
            })?;

            let pg_config = PostgresAuditConfig::new(url).with_prefix(&config.prefix);

            let store = PostgresAuditStore::new(&pg_config)
                .await
                .map_err(|e| ServerError::Config(format!("audit postgres: {e}")))?;

            Arc::new(store)
        }
        other => {
            return Err(ServerError::Config(format!(
                "unsupported audit backend: {other}"
            )));
        }
    };

    Ok(store)
}

/// Create the store and start its background writer, or `None` when audit
/// is disabled.
pub async fn create_audit_emitter(
    config: &AuditConfig,
) -> Result<Option<Arc<AuditEmitter>>, ServerError> {
    if !config.enabled {
        return Ok(None);
    }
    let store = create_audit_store(config).await?;
    Ok(Some(Arc::new(AuditEmitter::spawn(
        store,
        config.queue_capacity,
    ))))
}
