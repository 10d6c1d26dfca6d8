//! Per-tenant SQLite schema

use sqlx::SqlitePool;

use longcare_core::{EntityKind, Error, Result};

/// Create the live-record and history tables for every governed entity kind.
///
/// Runs when a tenant is provisioned; every statement is idempotent.
pub(crate) async fn initialize_tenant_schema(pool: &SqlitePool) -> Result<()> {
    for kind in EntityKind::ALL {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                deleted_at TIMESTAMP,
                created_by TEXT,
                updated_by TEXT,
                PRIMARY KEY (tenant_id, id)
            )
            "#,
            table = kind.table()
        ))
        .execute(pool)
        .await
        .map_err(|e| Error::Connectivity(format!("Failed to create {} table: {}", kind.table(), e)))?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_live ON {table}(tenant_id, deleted_at, created_at DESC)",
            table = kind.table()
        ))
        .execute(pool)
        .await
        .map_err(|e| Error::Connectivity(format!("Failed to index {} table: {}", kind.table(), e)))?;

        // The (tenant, record, version) primary key doubles as the guard
        // against two concurrent mutations committing the same version slot.
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {history} (
                tenant_id TEXT NOT NULL,
                record_id TEXT NOT NULL,
                version_number INTEGER NOT NULL,
                previous_data TEXT NOT NULL,
                new_data TEXT NOT NULL,
                changed_fields TEXT NOT NULL,
                change_type TEXT NOT NULL,
                change_reason TEXT NOT NULL,
                changed_by TEXT NOT NULL,
                changed_by_name TEXT NOT NULL,
                changed_at TIMESTAMP NOT NULL,
                client_ip TEXT,
                user_agent TEXT,
                PRIMARY KEY (tenant_id, record_id, version_number)
            )
            "#,
            history = kind.history_table()
        ))
        .execute(pool)
        .await
        .map_err(|e| {
            Error::Connectivity(format!(
                "Failed to create {} table: {}",
                kind.history_table(),
                e
            ))
        })?;
    }

    Ok(())
}
