//! Daily care record entity

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use longcare_core::{EntityKind, EntityPatch, Error, GovernedEntity, Result};

use crate::canonical;

/// One entry in a resident's daily care log: a meal, a vital-signs reading,
/// an occurrence, a hygiene routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub resident_id: Uuid,
    pub date: NaiveDate,
    /// Time of day in "HH:MM"
    pub time: String,
    pub category: String,
    pub description: String,
}

impl GovernedEntity for DailyRecord {
    type Patch = DailyRecordPatch;

    const KIND: EntityKind = EntityKind::DailyRecord;
}

/// One permitted field update on a daily record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum DailyRecordChange {
    Time(String),
    Category(String),
    Description(String),
}

impl DailyRecordChange {
    fn field_name(&self) -> &'static str {
        match self {
            DailyRecordChange::Time(_) => "time",
            DailyRecordChange::Category(_) => "category",
            DailyRecordChange::Description(_) => "description",
        }
    }
}

/// A validated set of field updates for one daily record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DailyRecordPatch {
    changes: Vec<DailyRecordChange>,
}

impl DailyRecordPatch {
    pub fn new(changes: Vec<DailyRecordChange>) -> Self {
        Self { changes }
    }

    pub fn changes(&self) -> &[DailyRecordChange] {
        &self.changes
    }
}

impl EntityPatch for DailyRecordPatch {
    type Entity = DailyRecord;

    fn validate(&self) -> Result<()> {
        let mut seen: Vec<&'static str> = Vec::new();
        for change in &self.changes {
            let field = change.field_name();
            if seen.contains(&field) {
                return Err(Error::Validation(format!(
                    "Duplicate field in patch: {}",
                    field
                )));
            }
            seen.push(field);

            if let DailyRecordChange::Time(time) = change {
                canonical::parse_time_of_day(time)?;
            }
        }
        Ok(())
    }

    fn changed_fields(&self, current: &DailyRecord) -> Vec<&'static str> {
        self.changes
            .iter()
            .filter(|change| match change {
                DailyRecordChange::Time(time) => !canonical::same_time_of_day(time, &current.time),
                DailyRecordChange::Category(category) => category != &current.category,
                DailyRecordChange::Description(description) => {
                    description != &current.description
                }
            })
            .map(DailyRecordChange::field_name)
            .collect()
    }

    fn apply(&self, entity: &mut DailyRecord) {
        for change in &self.changes {
            match change {
                DailyRecordChange::Time(time) => entity.time = time.clone(),
                DailyRecordChange::Category(category) => entity.category = category.clone(),
                DailyRecordChange::Description(description) => {
                    entity.description = description.clone()
                }
            }
        }
    }
}
