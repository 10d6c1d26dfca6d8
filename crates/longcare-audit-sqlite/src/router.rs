//! Per-tenant SQLite routing
//!
//! Maps a tenant id to its own database file (or in-memory database in test
//! mode). Pools are cached per tenant and reused across requests; an
//! unprovisioned tenant yields a typed error, never a shared fallback
//! database.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sqlx::SqlitePool;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::PathBuf;
use std::sync::Arc;

use longcare_core::{Error, Result, TenantId};

use crate::schema;

/// Routes tenant ids to isolated, cached SQLite pools.
#[derive(Clone)]
pub struct SqliteTenantRouter {
    /// Base directory for tenant database files; `None` = in-memory mode
    base_dir: Option<PathBuf>,
    pools: Arc<DashMap<TenantId, SqlitePool>>,
}

impl SqliteTenantRouter {
    /// File-per-tenant router rooted at `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
            pools: Arc::new(DashMap::new()),
        }
    }

    /// In-memory router for tests: each provisioned tenant gets its own
    /// private in-memory database
    pub fn in_memory() -> Self {
        Self {
            base_dir: None,
            pools: Arc::new(DashMap::new()),
        }
    }

    /// Database file path for a tenant (file mode only)
    pub fn db_path(&self, tenant_id: TenantId) -> Option<PathBuf> {
        self.base_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.db", tenant_id.as_uuid().simple())))
    }

    /// Provision a tenant: create its database and schema. Idempotent.
    pub async fn provision(&self, tenant_id: TenantId) -> Result<SqlitePool> {
        if let Some(pool) = self.pools.get(&tenant_id) {
            return Ok(pool.clone());
        }

        let pool = match &self.base_dir {
            Some(dir) => {
                tokio::fs::create_dir_all(dir).await.map_err(|e| {
                    Error::Connectivity(format!("Failed to create tenant directory: {}", e))
                })?;
                let path = dir.join(format!("{}.db", tenant_id.as_uuid().simple()));
                SqlitePoolOptions::new()
                    .max_connections(4)
                    .connect_with(
                        SqliteConnectOptions::new()
                            .filename(&path)
                            .create_if_missing(true)
                            .journal_mode(SqliteJournalMode::Wal)
                            .synchronous(SqliteSynchronous::Normal),
                    )
                    .await
                    .map_err(|e| {
                        Error::Connectivity(format!("Failed to open tenant database: {}", e))
                    })?
            }
            None => {
                // A single connection keeps the in-memory database alive and
                // serializes writers; idle/lifetime reaping would drop it.
                SqlitePoolOptions::new()
                    .min_connections(1)
                    .max_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_with(SqliteConnectOptions::new().in_memory(true))
                    .await
                    .map_err(|e| {
                        Error::Connectivity(format!("Failed to open in-memory database: {}", e))
                    })?
            }
        };

        schema::initialize_tenant_schema(&pool).await?;

        match self.pools.entry(tenant_id) {
            Entry::Occupied(existing) => {
                // Lost a provisioning race; keep the cached pool
                let cached = existing.get().clone();
                drop(existing);
                pool.close().await;
                Ok(cached)
            }
            Entry::Vacant(vacant) => {
                let pool = vacant.insert(pool).clone();
                tracing::info!(tenant_id = %tenant_id, "tenant database provisioned");
                Ok(pool)
            }
        }
    }

    /// Resolve a tenant id to its cached pool.
    ///
    /// In file mode an existing database file is reopened on first access
    /// after a restart. A tenant with no database is unknown.
    ///
    /// # Errors
    /// - `Error::TenantNotFound` if the tenant was never provisioned
    pub async fn connection(&self, tenant_id: TenantId) -> Result<SqlitePool> {
        if let Some(pool) = self.pools.get(&tenant_id) {
            return Ok(pool.clone());
        }

        match &self.base_dir {
            Some(dir) => {
                let path = dir.join(format!("{}.db", tenant_id.as_uuid().simple()));
                if !path.exists() {
                    return Err(Error::TenantNotFound(format!(
                        "Unknown tenant: {}",
                        tenant_id
                    )));
                }
                // Lazy pool construction is synchronous, so the entry API
                // makes concurrent first access single-flight.
                let pool = self
                    .pools
                    .entry(tenant_id)
                    .or_insert_with(|| {
                        SqlitePoolOptions::new().max_connections(4).connect_lazy_with(
                            SqliteConnectOptions::new()
                                .filename(&path)
                                .create_if_missing(false)
                                .journal_mode(SqliteJournalMode::Wal)
                                .synchronous(SqliteSynchronous::Normal),
                        )
                    })
                    .clone();
                Ok(pool)
            }
            None => Err(Error::TenantNotFound(format!(
                "Unknown tenant: {}",
                tenant_id
            ))),
        }
    }

    /// Number of cached tenant pools
    pub fn cached_tenants(&self) -> usize {
        self.pools.len()
    }

    /// Close every cached tenant pool. Called once at shutdown.
    pub async fn close_all(&self) {
        let tenants: Vec<TenantId> = self.pools.iter().map(|entry| *entry.key()).collect();
        for tenant_id in tenants {
            if let Some((_, pool)) = self.pools.remove(&tenant_id) {
                pool.close().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_unknown_tenant_is_typed_error() {
        let router = SqliteTenantRouter::in_memory();
        let result = router.connection(TenantId::new()).await;
        assert!(matches!(result, Err(Error::TenantNotFound(_))));
    }

    #[tokio::test]
    async fn test_provision_then_connect() {
        let router = SqliteTenantRouter::in_memory();
        let tenant_id = TenantId::new();

        router.provision(tenant_id).await.unwrap();
        router.connection(tenant_id).await.unwrap();
        assert_eq!(router.cached_tenants(), 1);
    }

    #[tokio::test]
    async fn test_provision_is_idempotent() {
        let router = SqliteTenantRouter::in_memory();
        let tenant_id = TenantId::new();

        router.provision(tenant_id).await.unwrap();
        router.provision(tenant_id).await.unwrap();
        assert_eq!(router.cached_tenants(), 1);
    }

    #[tokio::test]
    async fn test_file_mode_reopens_existing_database() {
        let temp_dir = TempDir::new().unwrap();
        let tenant_id = TenantId::new();

        let router = SqliteTenantRouter::new(temp_dir.path());
        router.provision(tenant_id).await.unwrap();
        router.close_all().await;
        assert_eq!(router.cached_tenants(), 0);

        // A fresh router over the same directory finds the tenant
        let reopened = SqliteTenantRouter::new(temp_dir.path());
        reopened.connection(tenant_id).await.unwrap();

        // But an unknown tenant still has no database
        let result = reopened.connection(TenantId::new()).await;
        assert!(matches!(result, Err(Error::TenantNotFound(_))));
    }

    #[tokio::test]
    async fn test_close_all_empties_cache() {
        let router = SqliteTenantRouter::in_memory();
        router.provision(TenantId::new()).await.unwrap();
        router.provision(TenantId::new()).await.unwrap();
        assert_eq!(router.cached_tenants(), 2);

        router.close_all().await;
        assert_eq!(router.cached_tenants(), 0);
    }
}
