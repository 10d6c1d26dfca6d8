//! Medication entity

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use longcare_core::{EntityKind, EntityPatch, Error, GovernedEntity, Result};

use crate::canonical;

/// A medication administered to a resident on a fixed schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    pub route: String,
    /// Administration times of day, "HH:MM" each
    pub schedule_times: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl GovernedEntity for Medication {
    type Patch = MedicationPatch;

    const KIND: EntityKind = EntityKind::Medication;
}

/// One permitted field update on a medication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum MedicationChange {
    Name(String),
    Dosage(String),
    Route(String),
    ScheduleTimes(Vec<String>),
    EndDate(Option<NaiveDate>),
}

impl MedicationChange {
    fn field_name(&self) -> &'static str {
        match self {
            MedicationChange::Name(_) => "name",
            MedicationChange::Dosage(_) => "dosage",
            MedicationChange::Route(_) => "route",
            MedicationChange::ScheduleTimes(_) => "schedule_times",
            MedicationChange::EndDate(_) => "end_date",
        }
    }
}

/// A validated set of field updates for one medication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MedicationPatch {
    changes: Vec<MedicationChange>,
}

impl MedicationPatch {
    pub fn new(changes: Vec<MedicationChange>) -> Self {
        Self { changes }
    }

    pub fn changes(&self) -> &[MedicationChange] {
        &self.changes
    }
}

impl EntityPatch for MedicationPatch {
    type Entity = Medication;

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

            match change {
                MedicationChange::ScheduleTimes(times) => {
                    if times.is_empty() {
                        return Err(Error::Validation(
                            "Medication schedule cannot be empty".to_string(),
                        ));
                    }
                    for time in times {
                        canonical::parse_time_of_day(time)?;
                    }
                }
                MedicationChange::Name(name) if name.trim().is_empty() => {
                    return Err(Error::Validation(
                        "Medication name cannot be empty".to_string(),
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn changed_fields(&self, current: &Medication) -> Vec<&'static str> {
        self.changes
            .iter()
            .filter(|change| match change {
                MedicationChange::Name(name) => name != &current.name,
                MedicationChange::Dosage(dosage) => dosage != &current.dosage,
                MedicationChange::Route(route) => route != &current.route,
                MedicationChange::ScheduleTimes(times) => {
                    !canonical::same_schedule(times, &current.schedule_times)
                }
                MedicationChange::EndDate(end_date) => end_date != &current.end_date,
            })
            .map(MedicationChange::field_name)
            .collect()
    }

    fn apply(&self, entity: &mut Medication) {
        for change in &self.changes {
            match change {
                MedicationChange::Name(name) => entity.name = name.clone(),
                MedicationChange::Dosage(dosage) => entity.dosage = dosage.clone(),
                MedicationChange::Route(route) => entity.route = route.clone(),
                MedicationChange::ScheduleTimes(times) => entity.schedule_times = times.clone(),
                MedicationChange::EndDate(end_date) => entity.end_date = *end_date,
            }
        }
    }
}
