//! SqliteGovernedStore - GovernedStore trait implementation over SQLite

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use longcare_core::{
    Actor, AuditConfig, ChangeType, EntityKind, EntityPatch, Error, GovernedEntity, GovernedStore,
    HistoryEntry, RecordHistory, RecordId, Result, StoredRecord, TenantId, context,
};
use longcare_observability::{QueryObserver, QueryShape};

use crate::router::SqliteTenantRouter;

/// SQLite-backed governed record store.
///
/// Pairs every record mutation with its history entry in one transaction.
/// SQLite offers no row-level locks, so the version-number race is handled
/// by the (tenant, record, version) primary key plus a bounded retry of the
/// whole transaction.
#[derive(Clone)]
pub struct SqliteGovernedStore {
    router: SqliteTenantRouter,
    config: AuditConfig,
    observer: QueryObserver,
}

impl SqliteGovernedStore {
    /// Create a store over a tenant router with default configuration
    pub fn new(router: SqliteTenantRouter) -> Self {
        Self {
            router,
            config: AuditConfig::default(),
            observer: QueryObserver::default(),
        }
    }

    /// Replace the audit configuration
    pub fn with_config(mut self, config: AuditConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the query observer
    pub fn with_observer(mut self, observer: QueryObserver) -> Self {
        self.observer = observer;
        self
    }

    /// The tenant router backing this store
    pub fn router(&self) -> &SqliteTenantRouter {
        &self.router
    }

    async fn update_once<E: GovernedEntity>(
        &self,
        pool: &SqlitePool,
        tenant_id: TenantId,
        id: RecordId,
        patch: &E::Patch,
        actor: &Actor,
        reason: &str,
    ) -> Result<StoredRecord<E>> {
        let mut tx = pool.begin().await.map_err(map_sqlx_err)?;

        let row = sqlx::query(&format!(
            "SELECT id, tenant_id, data, created_at, updated_at, deleted_at, created_by, updated_by \
             FROM {} WHERE id = ?1 AND tenant_id = ?2 AND deleted_at IS NULL",
            E::KIND.table()
        ))
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        let row = row.ok_or_else(|| not_found(E::KIND, id))?;
        let mut record: StoredRecord<E> = record_from_row(&row, tenant_id)?;

        let previous_data = serde_json::to_value(&record.entity)?;
        let changed_fields: Vec<String> = patch
            .changed_fields(&record.entity)
            .iter()
            .map(|f| f.to_string())
            .collect();
        let new_data = serde_json::to_value(patch)?;

        let now = Utc::now();
        let version = insert_history_entry(
            &mut tx,
            E::KIND,
            tenant_id,
            id,
            &previous_data,
            &new_data,
            &changed_fields,
            ChangeType::Update,
            reason,
            actor,
            now,
        )
        .await?;

        patch.apply(&mut record.entity);
        sqlx::query(&format!(
            "UPDATE {} SET data = ?1, updated_at = ?2, updated_by = ?3 \
             WHERE id = ?4 AND tenant_id = ?5",
            E::KIND.table()
        ))
        .bind(serde_json::to_string(&record.entity)?)
        .bind(now)
        .bind(actor.id.to_string())
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        tx.commit().await.map_err(map_sqlx_err)?;

        if let Some(metrics) = self.observer.metrics() {
            metrics
                .history_entries_total
                .with_label_values(&[E::KIND.table(), ChangeType::Update.as_str()])
                .inc();
        }
        tracing::debug!(
            tenant_id = %tenant_id,
            record_id = %id,
            version,
            changed = changed_fields.len(),
            "record updated"
        );

        record.updated_at = now;
        record.updated_by = Some(actor.id);
        Ok(record)
    }

    async fn remove_once<E: GovernedEntity>(
        &self,
        pool: &SqlitePool,
        tenant_id: TenantId,
        id: RecordId,
        reason: &str,
        actor: &Actor,
    ) -> Result<()> {
        let mut tx = pool.begin().await.map_err(map_sqlx_err)?;

        let row = sqlx::query(&format!(
            "SELECT id, tenant_id, data, created_at, updated_at, deleted_at, created_by, updated_by \
             FROM {} WHERE id = ?1 AND tenant_id = ?2 AND deleted_at IS NULL",
            E::KIND.table()
        ))
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        let row = row.ok_or_else(|| not_found(E::KIND, id))?;
        let record: StoredRecord<E> = record_from_row(&row, tenant_id)?;

        // The full final snapshot; the patch side records only the marker
        let previous_data = serde_json::to_value(&record.entity)?;
        let new_data = serde_json::json!({ "deleted": true });
        let changed_fields = vec!["deleted_at".to_string()];

        let now = Utc::now();
        let version = insert_history_entry(
            &mut tx,
            E::KIND,
            tenant_id,
            id,
            &previous_data,
            &new_data,
            &changed_fields,
            ChangeType::Delete,
            reason,
            actor,
            now,
        )
        .await?;

        sqlx::query(&format!(
            "UPDATE {} SET deleted_at = ?1, updated_at = ?1, updated_by = ?2 \
             WHERE id = ?3 AND tenant_id = ?4",
            E::KIND.table()
        ))
        .bind(now)
        .bind(actor.id.to_string())
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        tx.commit().await.map_err(map_sqlx_err)?;

        if let Some(metrics) = self.observer.metrics() {
            metrics
                .history_entries_total
                .with_label_values(&[E::KIND.table(), ChangeType::Delete.as_str()])
                .inc();
        }
        tracing::debug!(
            tenant_id = %tenant_id,
            record_id = %id,
            version,
            "record soft-deleted"
        );

        Ok(())
    }
}

#[async_trait]
impl GovernedStore for SqliteGovernedStore {
    async fn create<E: GovernedEntity>(
        &self,
        tenant_id: TenantId,
        entity: E,
        actor: &Actor,
    ) -> Result<StoredRecord<E>> {
        let pool = self.router.connection(tenant_id).await?;
        let shape = QueryShape::new().with_filter(&["tenant_id"]);

        self.observer
            .observe(E::KIND.table(), "create", shape, async {
                let id = RecordId::new();
                let now = Utc::now();
                let data = serde_json::to_string(&entity)?;

                let mut tx = pool.begin().await.map_err(map_sqlx_err)?;

                sqlx::query(&format!(
                    "INSERT INTO {} (id, tenant_id, data, created_at, updated_at, created_by, updated_by) \
                     VALUES (?1, ?2, ?3, ?4, ?4, ?5, ?5)",
                    E::KIND.table()
                ))
                .bind(id.to_string())
                .bind(tenant_id.to_string())
                .bind(&data)
                .bind(now)
                .bind(actor.id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;

                if self.config.record_creations {
                    // CREATE entries carry an empty reason; the justification
                    // mandate applies to updates and deletions
                    insert_history_entry(
                        &mut tx,
                        E::KIND,
                        tenant_id,
                        id,
                        &serde_json::Value::Null,
                        &serde_json::to_value(&entity)?,
                        &[],
                        ChangeType::Create,
                        "",
                        actor,
                        now,
                    )
                    .await?;
                }

                tx.commit().await.map_err(map_sqlx_err)?;

                Ok(StoredRecord {
                    id,
                    tenant_id,
                    entity,
                    created_at: now,
                    updated_at: now,
                    deleted_at: None,
                    created_by: Some(actor.id),
                    updated_by: Some(actor.id),
                })
            })
            .await
    }

    async fn get<E: GovernedEntity>(
        &self,
        tenant_id: TenantId,
        id: RecordId,
    ) -> Result<StoredRecord<E>> {
        let pool = self.router.connection(tenant_id).await?;
        let shape = QueryShape::new().with_filter(&["id", "tenant_id", "deleted_at"]);

        self.observer
            .observe(E::KIND.table(), "get", shape, async {
                let row = sqlx::query(&format!(
                    "SELECT id, tenant_id, data, created_at, updated_at, deleted_at, created_by, updated_by \
                     FROM {} WHERE id = ?1 AND tenant_id = ?2 AND deleted_at IS NULL",
                    E::KIND.table()
                ))
                .bind(id.to_string())
                .bind(tenant_id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(map_sqlx_err)?;

                let row = row.ok_or_else(|| not_found(E::KIND, id))?;
                record_from_row(&row, tenant_id)
            })
            .await
    }

    async fn list<E: GovernedEntity>(
        &self,
        tenant_id: TenantId,
        include_deleted: bool,
    ) -> Result<Vec<StoredRecord<E>>> {
        let pool = self.router.connection(tenant_id).await?;
        let shape = QueryShape::new()
            .with_filter(if include_deleted {
                &["tenant_id"][..]
            } else {
                &["tenant_id", "deleted_at"][..]
            })
            .with_sort("created_at DESC");

        self.observer
            .observe(E::KIND.table(), "list", shape, async {
                let deleted_clause = if include_deleted {
                    ""
                } else {
                    "AND deleted_at IS NULL "
                };
                let rows = sqlx::query(&format!(
                    "SELECT id, tenant_id, data, created_at, updated_at, deleted_at, created_by, updated_by \
                     FROM {} WHERE tenant_id = ?1 {}ORDER BY created_at DESC, id",
                    E::KIND.table(),
                    deleted_clause
                ))
                .bind(tenant_id.to_string())
                .fetch_all(&pool)
                .await
                .map_err(map_sqlx_err)?;

                rows.iter()
                    .map(|row| record_from_row(row, tenant_id))
                    .collect()
            })
            .await
    }

    async fn update<E: GovernedEntity>(
        &self,
        tenant_id: TenantId,
        id: RecordId,
        patch: E::Patch,
        actor: &Actor,
        reason: &str,
    ) -> Result<StoredRecord<E>> {
        // Both validations run before any transaction opens
        self.config.validate_reason(reason)?;
        patch.validate()?;

        let pool = self.router.connection(tenant_id).await?;
        let shape = QueryShape::new().with_filter(&["id", "tenant_id", "deleted_at"]);

        self.observer
            .observe(E::KIND.table(), "update", shape, async {
                let mut attempt: u32 = 0;
                loop {
                    let outcome = tokio::time::timeout(
                        self.config.mutation_timeout,
                        self.update_once::<E>(&pool, tenant_id, id, &patch, actor, reason),
                    )
                    .await;

                    match outcome {
                        Ok(Ok(record)) => return Ok(record),
                        Ok(Err(err @ Error::ConcurrencyConflict(_)))
                            if attempt < self.config.max_version_retries =>
                        {
                            attempt += 1;
                            if let Some(metrics) = self.observer.metrics() {
                                metrics
                                    .version_conflicts_total
                                    .with_label_values(&[E::KIND.table()])
                                    .inc();
                            }
                            tracing::warn!(
                                tenant_id = %tenant_id,
                                record_id = %id,
                                attempt,
                                error = %err,
                                "version slot contention; retrying mutation"
                            );
                            tokio::time::sleep(std::time::Duration::from_millis(
                                10 * attempt as u64,
                            ))
                            .await;
                        }
                        Ok(Err(err)) => return Err(err),
                        Err(_) => return Err(Error::Timeout(self.config.mutation_timeout)),
                    }
                }
            })
            .await
    }

    async fn remove<E: GovernedEntity>(
        &self,
        tenant_id: TenantId,
        id: RecordId,
        reason: &str,
        actor: &Actor,
    ) -> Result<()> {
        self.config.validate_reason(reason)?;

        let pool = self.router.connection(tenant_id).await?;
        let shape = QueryShape::new().with_filter(&["id", "tenant_id", "deleted_at"]);

        self.observer
            .observe(E::KIND.table(), "remove", shape, async {
                let mut attempt: u32 = 0;
                loop {
                    let outcome = tokio::time::timeout(
                        self.config.mutation_timeout,
                        self.remove_once::<E>(&pool, tenant_id, id, reason, actor),
                    )
                    .await;

                    match outcome {
                        Ok(Ok(())) => return Ok(()),
                        Ok(Err(err @ Error::ConcurrencyConflict(_)))
                            if attempt < self.config.max_version_retries =>
                        {
                            attempt += 1;
                            if let Some(metrics) = self.observer.metrics() {
                                metrics
                                    .version_conflicts_total
                                    .with_label_values(&[E::KIND.table()])
                                    .inc();
                            }
                            tracing::warn!(
                                tenant_id = %tenant_id,
                                record_id = %id,
                                attempt,
                                error = %err,
                                "version slot contention; retrying removal"
                            );
                            tokio::time::sleep(std::time::Duration::from_millis(
                                10 * attempt as u64,
                            ))
                            .await;
                        }
                        Ok(Err(err)) => return Err(err),
                        Err(_) => return Err(Error::Timeout(self.config.mutation_timeout)),
                    }
                }
            })
            .await
    }

    async fn history(
        &self,
        tenant_id: TenantId,
        kind: EntityKind,
        id: RecordId,
    ) -> Result<RecordHistory> {
        let pool = self.router.connection(tenant_id).await?;
        let shape = QueryShape::new()
            .with_filter(&["tenant_id", "record_id"])
            .with_sort("version_number DESC");

        self.observer
            .observe(kind.table(), "history", shape, async {
                // Existence check ignores soft-delete state: deleted records
                // still expose their trail
                let exists = sqlx::query(&format!(
                    "SELECT 1 FROM {} WHERE id = ?1 AND tenant_id = ?2",
                    kind.table()
                ))
                .bind(id.to_string())
                .bind(tenant_id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(map_sqlx_err)?;

                if exists.is_none() {
                    return Err(not_found(kind, id));
                }

                let rows = sqlx::query(&format!(
                    "SELECT tenant_id, record_id, version_number, previous_data, new_data, \
                     changed_fields, change_type, change_reason, changed_by, changed_by_name, \
                     changed_at, client_ip, user_agent \
                     FROM {} WHERE tenant_id = ?1 AND record_id = ?2 \
                     ORDER BY version_number DESC",
                    kind.history_table()
                ))
                .bind(tenant_id.to_string())
                .bind(id.to_string())
                .fetch_all(&pool)
                .await
                .map_err(map_sqlx_err)?;

                let entries = rows
                    .iter()
                    .map(history_entry_from_row)
                    .collect::<Result<Vec<_>>>()?;

                Ok(RecordHistory {
                    total: entries.len(),
                    entries,
                })
            })
            .await
    }

    async fn version_snapshot(
        &self,
        tenant_id: TenantId,
        kind: EntityKind,
        id: RecordId,
        version: i64,
    ) -> Result<serde_json::Value> {
        let pool = self.router.connection(tenant_id).await?;
        let shape = QueryShape::new().with_filter(&["tenant_id", "record_id", "version_number"]);

        self.observer
            .observe(kind.table(), "version_snapshot", shape, async {
                let current: Option<String> = sqlx::query_scalar(&format!(
                    "SELECT data FROM {} WHERE id = ?1 AND tenant_id = ?2",
                    kind.table()
                ))
                .bind(id.to_string())
                .bind(tenant_id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(map_sqlx_err)?;

                let current = current.ok_or_else(|| not_found(kind, id))?;

                let requested = sqlx::query(&format!(
                    "SELECT 1 FROM {} WHERE tenant_id = ?1 AND record_id = ?2 AND version_number = ?3",
                    kind.history_table()
                ))
                .bind(tenant_id.to_string())
                .bind(id.to_string())
                .bind(version)
                .fetch_optional(&pool)
                .await
                .map_err(map_sqlx_err)?;

                if requested.is_none() {
                    return Err(Error::NotFound(format!(
                        "Version {} of {} {} not found",
                        version,
                        kind.table(),
                        id
                    )));
                }

                // Full snapshots make this a direct lookup: the state as of
                // version N is the pre-mutation snapshot of version N + 1,
                // or the current row for the newest version
                let successor: Option<String> = sqlx::query_scalar(&format!(
                    "SELECT previous_data FROM {} \
                     WHERE tenant_id = ?1 AND record_id = ?2 AND version_number = ?3",
                    kind.history_table()
                ))
                .bind(tenant_id.to_string())
                .bind(id.to_string())
                .bind(version + 1)
                .fetch_optional(&pool)
                .await
                .map_err(map_sqlx_err)?;

                let snapshot = successor.unwrap_or(current);
                Ok(serde_json::from_str(&snapshot)?)
            })
            .await
    }
}

/// Assign the next version number and insert the paired history entry.
///
/// Runs inside the caller's transaction: the max-read and the insert commit
/// or roll back together with the record mutation.
#[allow(clippy::too_many_arguments)]
async fn insert_history_entry(
    tx: &mut Transaction<'_, Sqlite>,
    kind: EntityKind,
    tenant_id: TenantId,
    id: RecordId,
    previous_data: &serde_json::Value,
    new_data: &serde_json::Value,
    changed_fields: &[String],
    change_type: ChangeType,
    reason: &str,
    actor: &Actor,
    changed_at: DateTime<Utc>,
) -> Result<i64> {
    let max: Option<i64> = sqlx::query_scalar(&format!(
        "SELECT MAX(version_number) FROM {} WHERE tenant_id = ?1 AND record_id = ?2",
        kind.history_table()
    ))
    .bind(tenant_id.to_string())
    .bind(id.to_string())
    .fetch_one(&mut **tx)
    .await
    .map_err(map_sqlx_err)?;

    let version = max.unwrap_or(0) + 1;
    let ctx = context::current();

    sqlx::query(&format!(
        "INSERT INTO {} (tenant_id, record_id, version_number, previous_data, new_data, \
         changed_fields, change_type, change_reason, changed_by, changed_by_name, changed_at, \
         client_ip, user_agent) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        kind.history_table()
    ))
    .bind(tenant_id.to_string())
    .bind(id.to_string())
    .bind(version)
    .bind(previous_data.to_string())
    .bind(new_data.to_string())
    .bind(serde_json::to_string(changed_fields)?)
    .bind(change_type.as_str())
    .bind(reason)
    .bind(actor.id.to_string())
    .bind(&actor.name)
    .bind(changed_at)
    .bind(ctx.client_ip)
    .bind(ctx.user_agent)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx_err)?;

    Ok(version)
}

fn record_from_row<E: GovernedEntity>(row: &SqliteRow, tenant_id: TenantId) -> Result<StoredRecord<E>> {
    let id: String = read(row, "id")?;
    let data: String = read(row, "data")?;
    let created_by: Option<String> = read(row, "created_by")?;
    let updated_by: Option<String> = read(row, "updated_by")?;

    Ok(StoredRecord {
        id: RecordId::from_string(&id)?,
        tenant_id,
        entity: serde_json::from_str(&data)?,
        created_at: read(row, "created_at")?,
        updated_at: read(row, "updated_at")?,
        deleted_at: read(row, "deleted_at")?,
        created_by: parse_actor_id(created_by)?,
        updated_by: parse_actor_id(updated_by)?,
    })
}

fn history_entry_from_row(row: &SqliteRow) -> Result<HistoryEntry> {
    let tenant_id: String = read(row, "tenant_id")?;
    let record_id: String = read(row, "record_id")?;
    let previous_data: String = read(row, "previous_data")?;
    let new_data: String = read(row, "new_data")?;
    let changed_fields: String = read(row, "changed_fields")?;
    let change_type: String = read(row, "change_type")?;
    let changed_by: String = read(row, "changed_by")?;

    Ok(HistoryEntry {
        tenant_id: TenantId::from_string(&tenant_id)?,
        record_id: RecordId::from_string(&record_id)?,
        version_number: read(row, "version_number")?,
        previous_data: serde_json::from_str(&previous_data)?,
        new_data: serde_json::from_str(&new_data)?,
        changed_fields: serde_json::from_str(&changed_fields)?,
        change_type: change_type.parse()?,
        change_reason: read(row, "change_reason")?,
        changed_by: Uuid::parse_str(&changed_by)
            .map_err(|e| Error::Connectivity(format!("Corrupt actor id in history: {}", e)))?,
        changed_by_name: read(row, "changed_by_name")?,
        changed_at: read(row, "changed_at")?,
        client_ip: read(row, "client_ip")?,
        user_agent: read(row, "user_agent")?,
    })
}

fn read<'r, T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>>(
    row: &'r SqliteRow,
    column: &str,
) -> Result<T> {
    row.try_get(column)
        .map_err(|e| Error::Connectivity(format!("Failed to read column {}: {}", column, e)))
}

fn parse_actor_id(value: Option<String>) -> Result<Option<Uuid>> {
    value
        .as_deref()
        .map(Uuid::parse_str)
        .transpose()
        .map_err(|e| Error::Connectivity(format!("Corrupt actor id: {}", e)))
}

fn not_found(kind: EntityKind, id: RecordId) -> Error {
    Error::NotFound(format!("{} {} not found", kind.table(), id))
}

/// Map a sqlx error, classifying version-slot collisions and writer
/// contention as retryable conflicts.
fn map_sqlx_err(err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db) = &err {
        let unique = matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation);
        let message = db.message();
        if unique || message.contains("locked") || message.contains("busy") {
            return Error::ConcurrencyConflict(err.to_string());
        }
    }
    Error::Connectivity(format!("SQLite error: {}", err))
}
