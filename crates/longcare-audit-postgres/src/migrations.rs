//! Per-tenant schema migrations
//!
//! Provides versioned schema migrations with tracking to ensure migrations
//! are applied exactly once and in the correct order, inside each tenant's
//! schema. Connections reaching this module are already pinned to the
//! tenant's `search_path`, so table names stay unqualified.

use sqlx::PgPool;
use tracing::{debug, info};

use longcare_core::{Error, Result};

/// Represents a single database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Unique version number (must be sequential)
    pub version: i32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to execute for this migration
    pub up_sql: &'static str,
}

/// All migrations in order
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Create daily care record tables",
        up_sql: r#"
            CREATE TABLE IF NOT EXISTS daily_records (
                id UUID NOT NULL,
                tenant_id UUID NOT NULL,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                deleted_at TIMESTAMPTZ,
                created_by UUID,
                updated_by UUID,
                PRIMARY KEY (tenant_id, id)
            );

            CREATE TABLE IF NOT EXISTS daily_record_history (
                tenant_id UUID NOT NULL,
                record_id UUID NOT NULL,
                version_number BIGINT NOT NULL,
                previous_data JSONB NOT NULL,
                new_data JSONB NOT NULL,
                changed_fields JSONB NOT NULL,
                change_type TEXT NOT NULL,
                change_reason TEXT NOT NULL,
                changed_by UUID NOT NULL,
                changed_by_name TEXT NOT NULL,
                changed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                client_ip INET,
                user_agent TEXT,
                PRIMARY KEY (tenant_id, record_id, version_number)
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Create medication tables",
        up_sql: r#"
            CREATE TABLE IF NOT EXISTS medications (
                id UUID NOT NULL,
                tenant_id UUID NOT NULL,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                deleted_at TIMESTAMPTZ,
                created_by UUID,
                updated_by UUID,
                PRIMARY KEY (tenant_id, id)
            );

            CREATE TABLE IF NOT EXISTS medication_history (
                tenant_id UUID NOT NULL,
                record_id UUID NOT NULL,
                version_number BIGINT NOT NULL,
                previous_data JSONB NOT NULL,
                new_data JSONB NOT NULL,
                changed_fields JSONB NOT NULL,
                change_type TEXT NOT NULL,
                change_reason TEXT NOT NULL,
                changed_by UUID NOT NULL,
                changed_by_name TEXT NOT NULL,
                changed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                client_ip INET,
                user_agent TEXT,
                PRIMARY KEY (tenant_id, record_id, version_number)
            );
        "#,
    },
    Migration {
        version: 3,
        description: "Create prescription tables",
        up_sql: r#"
            CREATE TABLE IF NOT EXISTS prescriptions (
                id UUID NOT NULL,
                tenant_id UUID NOT NULL,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                deleted_at TIMESTAMPTZ,
                created_by UUID,
                updated_by UUID,
                PRIMARY KEY (tenant_id, id)
            );

            CREATE TABLE IF NOT EXISTS prescription_history (
                tenant_id UUID NOT NULL,
                record_id UUID NOT NULL,
                version_number BIGINT NOT NULL,
                previous_data JSONB NOT NULL,
                new_data JSONB NOT NULL,
                changed_fields JSONB NOT NULL,
                change_type TEXT NOT NULL,
                change_reason TEXT NOT NULL,
                changed_by UUID NOT NULL,
                changed_by_name TEXT NOT NULL,
                changed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                client_ip INET,
                user_agent TEXT,
                PRIMARY KEY (tenant_id, record_id, version_number)
            );
        "#,
    },
    Migration {
        version: 4,
        description: "Index live listings",
        up_sql: r#"
            CREATE INDEX IF NOT EXISTS idx_daily_records_live
            ON daily_records(tenant_id, created_at DESC) WHERE deleted_at IS NULL;

            CREATE INDEX IF NOT EXISTS idx_medications_live
            ON medications(tenant_id, created_at DESC) WHERE deleted_at IS NULL;

            CREATE INDEX IF NOT EXISTS idx_prescriptions_live
            ON prescriptions(tenant_id, created_at DESC) WHERE deleted_at IS NULL;
        "#,
    },
];

/// Apply all pending migrations to a tenant's schema.
pub async fn run_tenant_migrations(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INT PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| Error::Connectivity(format!("Failed to create schema_migrations table: {}", e)))?;

    let applied: Vec<i32> = sqlx::query_scalar("SELECT version FROM schema_migrations")
        .fetch_all(pool)
        .await
        .map_err(|e| Error::Connectivity(format!("Failed to read applied migrations: {}", e)))?;

    for migration in MIGRATIONS {
        if applied.contains(&migration.version) {
            debug!(version = migration.version, "migration already applied");
            continue;
        }

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| Error::Connectivity(format!("Failed to start migration: {}", e)))?;

        sqlx::raw_sql(migration.up_sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::Connectivity(format!(
                    "Migration {} ({}) failed: {}",
                    migration.version, migration.description, e
                ))
            })?;

        sqlx::query("INSERT INTO schema_migrations (version, description) VALUES ($1, $2)")
            .bind(migration.version)
            .bind(migration.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Connectivity(format!("Failed to record migration: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| Error::Connectivity(format!("Failed to commit migration: {}", e)))?;

        info!(
            version = migration.version,
            description = migration.description,
            "migration applied"
        );
    }

    Ok(())
}
