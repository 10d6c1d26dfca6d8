//! Governed record and audit history types
//!
//! A governed record is an entity subject to a mandatory versioned audit
//! trail: every update or deletion is paired, in one transaction, with an
//! immutable history entry carrying a justification and a full pre-mutation
//! snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::tenant::TenantId;
use crate::{Error, Result};

/// Unique identifier for a governed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Create a new random record ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a record ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse a record ID from a string
    pub fn from_string(s: &str) -> Result<Self> {
        let uuid = Uuid::parse_str(s)
            .map_err(|e| Error::Validation(format!("Invalid record ID format: {}", e)))?;
        Ok(Self(uuid))
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_string(s)
    }
}

/// The user performing a mutation.
///
/// The name is denormalized into every history entry so the trail stays
/// readable even after staff accounts are renamed or retired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
}

impl Actor {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// The kinds of governed entity the stores manage.
///
/// Each kind maps to its own live-record table and append-only history
/// table inside the tenant partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    DailyRecord,
    Medication,
    Prescription,
}

impl EntityKind {
    pub const ALL: &'static [EntityKind] = &[
        EntityKind::DailyRecord,
        EntityKind::Medication,
        EntityKind::Prescription,
    ];

    /// Live-record table name
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::DailyRecord => "daily_records",
            EntityKind::Medication => "medications",
            EntityKind::Prescription => "prescriptions",
        }
    }

    /// Append-only history table name
    pub fn history_table(&self) -> &'static str {
        match self {
            EntityKind::DailyRecord => "daily_record_history",
            EntityKind::Medication => "medication_history",
            EntityKind::Prescription => "prescription_history",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// What a history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Create => "CREATE",
            ChangeType::Update => "UPDATE",
            ChangeType::Delete => "DELETE",
        }
    }
}

impl FromStr for ChangeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CREATE" => Ok(ChangeType::Create),
            "UPDATE" => Ok(ChangeType::Update),
            "DELETE" => Ok(ChangeType::Delete),
            other => Err(Error::Validation(format!("Unknown change type: {}", other))),
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit entry for one mutation of one governed record.
///
/// `previous_data` holds the full pre-mutation field snapshot (not just the
/// changed subset) so any past state is a direct lookup. `version_number`
/// starts at 1 and is gapless and strictly increasing per record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub tenant_id: TenantId,
    pub record_id: RecordId,
    pub version_number: i64,
    /// Full field snapshot taken before the mutation was applied
    pub previous_data: serde_json::Value,
    /// The applied patch
    pub new_data: serde_json::Value,
    /// Field names that actually differed under canonical comparison
    pub changed_fields: Vec<String>,
    pub change_type: ChangeType,
    pub change_reason: String,
    pub changed_by: Uuid,
    pub changed_by_name: String,
    pub changed_at: DateTime<Utc>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Full audit history of one record, newest version first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordHistory {
    pub entries: Vec<HistoryEntry>,
    pub total: usize,
}

/// A governed record as stored: the typed entity payload plus the envelope
/// the mutation engine maintains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord<E> {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub entity: E,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker; `None` = live
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

impl<E> StoredRecord<E> {
    /// Whether the record has been soft-deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A typed governed entity.
///
/// The entity's serde representation is its canonical field snapshot: it is
/// what lands in the record row and in `HistoryEntry::previous_data`.
pub trait GovernedEntity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The validated patch type mutations of this entity accept
    type Patch: EntityPatch<Entity = Self>;

    /// Which table pair this entity lives in
    const KIND: EntityKind;
}

/// A validated, per-entity patch: a closed set of permitted field updates.
///
/// Change detection is exhaustive over the patch's variants, with canonical
/// per-field equality (times of day compared as parsed times, timestamps as
/// UTC instants, schedules order-insensitively) rather than a generic
/// serialized comparison.
pub trait EntityPatch: Serialize + Send + Sync + 'static {
    type Entity;

    /// Check patch-specific field constraints. Runs before any transaction
    /// is opened.
    fn validate(&self) -> Result<()>;

    /// Names of the fields this patch would actually change on `current`.
    fn changed_fields(&self, current: &Self::Entity) -> Vec<&'static str>;

    /// Apply the patch to the entity in place.
    fn apply(&self, entity: &mut Self::Entity);
}
