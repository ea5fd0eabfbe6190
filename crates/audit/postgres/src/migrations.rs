use sqlx::PgPool;

/// Create the audit table and its indexes if they do not already exist.
pub async fn run_migrations(pool: &PgPool, prefix: &str) -> Result<(), sqlx::Error> {
    let table = format!("{prefix}audit");

    let create_table = format!(
        "
        CREATE TABLE IF NOT EXISTS {table} (
            id           TEXT PRIMARY KEY,
            request_id   TEXT NOT NULL,
            caller_id    TEXT NOT NULL DEFAULT '',
            user_id      TEXT,
            auth_method  TEXT NOT NULL,
            operation    TEXT NOT NULL,
            method       TEXT NOT NULL,
            path         TEXT NOT NULL,
            status       INTEGER NOT NULL,
            outcome      TEXT NOT NULL,
            client_ip    TEXT,
            user_agent   TEXT,
            duration_ms  BIGINT NOT NULL,
            detail       JSONB NOT NULL DEFAULT 'null'::jsonb,
            recorded_at  TIMESTAMPTZ NOT NULL
        )
        "
    );

    sqlx::query(&create_table).execute(pool).await?;

    let indexes = [
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{prefix}audit_time ON {table} (recorded_at DESC)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{prefix}audit_caller ON {table} (caller_id, recorded_at DESC)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{prefix}audit_operation ON {table} (operation, recorded_at DESC)"
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_{prefix}audit_request ON {table} (request_id)"),
    ];

    for idx in &indexes {
        sqlx::query(idx).execute(pool).await?;
    }

    Ok(())
}
