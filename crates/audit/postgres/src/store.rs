use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use procgate_audit::error::AuditError;
use procgate_audit::record::AuditRecord;
use procgate_audit::store::AuditStore;

use crate::config::PostgresAuditConfig;
use crate::migrations;

/// Postgres-backed audit store using `sqlx`.
pub struct PostgresAuditStore {
    pool: PgPool,
    table: String,
}

impl PostgresAuditStore {
    /// Create a new store, connecting to Postgres and running migrations.
    pub async fn new(config: &PostgresAuditConfig) -> Result<Self, AuditError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;

        Self::from_pool(pool, &config.prefix).await
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: PgPool, prefix: &str) -> Result<Self, AuditError> {
        migrations::run_migrations(&pool, prefix)
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;

        let table = format!("{prefix}audit");
        info!(%table, "postgres audit store ready");
        Ok(Self { pool, table })
    }
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    async fn record(&self, entry: AuditRecord) -> Result<(), AuditError> {
        let sql = format!(
            r"
            INSERT INTO {} (
                id, request_id, caller_id, user_id, auth_method,
                operation, method, path, status, outcome,
                client_ip, user_agent, duration_ms, detail, recorded_at
            ) VALUES (
                $1, $2, $3, $4, $5,
                $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15
            )
            ",
            self.table
        );

        #[allow(clippy::cast_possible_wrap)]
        let duration = entry.duration_ms as i64;

        sqlx::query(&sql)
            .bind(&entry.id)
            .bind(&entry.request_id)
            .bind(&entry.caller_id)
            .bind(&entry.user_id)
            .bind(entry.auth_method.as_str())
            .bind(&entry.operation)
            .bind(&entry.method)
            .bind(&entry.path)
            .bind(i32::from(entry.status))
            .bind(entry.outcome.as_str())
            .bind(&entry.client_ip)
            .bind(&entry.user_agent)
            .bind(duration)
            .bind(&entry.detail)
            .bind(entry.recorded_at)
            .execute(&self.pool)
            .await
            .map_err(|e| AuditError::Storage(e.to_string()))?;

        Ok(())
    }
}
