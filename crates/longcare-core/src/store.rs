//! Governed store trait implemented by the storage backends
//!
//! The `GovernedStore` trait is the single seam through which governed
//! records are read and mutated. Implementations pair every update/delete
//! with its history entry in one atomic transaction.

use async_trait::async_trait;

use crate::record::{Actor, EntityKind, GovernedEntity, RecordHistory, RecordId, StoredRecord};
use crate::tenant::TenantId;
use crate::Result;

/// Tenant-isolated storage for governed records with a versioned audit trail.
///
/// Implementations:
/// - `PostgresGovernedStore`: schema-per-tenant PostgreSQL (production)
/// - `SqliteGovernedStore`: database-file-per-tenant SQLite (embedded
///   deployments and tests)
///
/// Every method takes the tenant ID explicitly; a record that exists under a
/// different tenant is indistinguishable from one that does not exist.
#[async_trait]
pub trait GovernedStore: Send + Sync {
    /// Insert a new governed record.
    ///
    /// Writes a version-1 CREATE history entry only when the store's
    /// `AuditConfig::record_creations` is enabled.
    ///
    /// # Errors
    /// - `Error::TenantNotFound` if the tenant is unknown
    /// - `Error::Connectivity` for store failures
    async fn create<E: GovernedEntity>(
        &self,
        tenant_id: TenantId,
        entity: E,
        actor: &Actor,
    ) -> Result<StoredRecord<E>>;

    /// Fetch one live record by ID.
    ///
    /// # Errors
    /// - `Error::NotFound` if absent, soft-deleted, or owned by another tenant
    async fn get<E: GovernedEntity>(
        &self,
        tenant_id: TenantId,
        id: RecordId,
    ) -> Result<StoredRecord<E>>;

    /// List records of one kind, newest first.
    ///
    /// Soft-deleted records are excluded unless `include_deleted` is set.
    async fn list<E: GovernedEntity>(
        &self,
        tenant_id: TenantId,
        include_deleted: bool,
    ) -> Result<Vec<StoredRecord<E>>>;

    /// Apply a validated patch to a record, pairing the row update with
    /// exactly one UPDATE history entry in the same transaction.
    ///
    /// # Errors
    /// - `Error::Validation` if the reason is too short or the patch is malformed
    /// - `Error::NotFound` if the record is absent, deleted, or wrong-tenant
    /// - `Error::ConcurrencyConflict` if the version race cannot be resolved
    ///   within the configured retry budget
    /// - `Error::Timeout` if the transaction exceeds its bound (safe to retry)
    async fn update<E: GovernedEntity>(
        &self,
        tenant_id: TenantId,
        id: RecordId,
        patch: E::Patch,
        actor: &Actor,
        reason: &str,
    ) -> Result<StoredRecord<E>>;

    /// Soft-delete a record, pairing the `deleted_at` write with exactly one
    /// DELETE history entry in the same transaction. The row is never
    /// physically removed.
    ///
    /// # Errors
    /// Same as [`GovernedStore::update`].
    async fn remove<E: GovernedEntity>(
        &self,
        tenant_id: TenantId,
        id: RecordId,
        reason: &str,
        actor: &Actor,
    ) -> Result<()>;

    /// Full audit history of a record, ordered by version descending.
    ///
    /// The record existence check ignores soft-delete state: deleted records
    /// still expose their history.
    ///
    /// # Errors
    /// - `Error::NotFound` if no record with this ID ever existed under the tenant
    async fn history(
        &self,
        tenant_id: TenantId,
        kind: EntityKind,
        id: RecordId,
    ) -> Result<RecordHistory>;

    /// Full record state as of `version`.
    ///
    /// Because every history entry carries a full pre-mutation snapshot this
    /// is a direct lookup (the snapshot of version + 1, or the current row
    /// for the latest version), never a diff replay.
    ///
    /// # Errors
    /// - `Error::NotFound` if the record or the requested version does not exist
    async fn version_snapshot(
        &self,
        tenant_id: TenantId,
        kind: EntityKind,
        id: RecordId,
        version: i64,
    ) -> Result<serde_json::Value>;
}
