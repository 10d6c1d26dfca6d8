//! Prescription entity

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use longcare_core::{EntityKind, EntityPatch, Error, GovernedEntity, Result};

use crate::canonical;

/// A prescription issued by an external clinician.
///
/// `issued_at` is stored in UTC; inputs arrive with whatever offset the
/// clinic's system produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub medication_name: String,
    pub prescriber: String,
    pub instructions: String,
    pub issued_at: DateTime<Utc>,
}

impl GovernedEntity for Prescription {
    type Patch = PrescriptionPatch;

    const KIND: EntityKind = EntityKind::Prescription;
}

/// One permitted field update on a prescription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum PrescriptionChange {
    Prescriber(String),
    Instructions(String),
    IssuedAt(DateTime<FixedOffset>),
}

impl PrescriptionChange {
    fn field_name(&self) -> &'static str {
        match self {
            PrescriptionChange::Prescriber(_) => "prescriber",
            PrescriptionChange::Instructions(_) => "instructions",
            PrescriptionChange::IssuedAt(_) => "issued_at",
        }
    }
}

/// A validated set of field updates for one prescription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrescriptionPatch {
    changes: Vec<PrescriptionChange>,
}

impl PrescriptionPatch {
    pub fn new(changes: Vec<PrescriptionChange>) -> Self {
        Self { changes }
    }

    pub fn changes(&self) -> &[PrescriptionChange] {
        &self.changes
    }
}

impl EntityPatch for PrescriptionPatch {
    type Entity = Prescription;

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

            if let PrescriptionChange::Prescriber(prescriber) = change
                && prescriber.trim().is_empty()
            {
                return Err(Error::Validation(
                    "Prescriber cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn changed_fields(&self, current: &Prescription) -> Vec<&'static str> {
        self.changes
            .iter()
            .filter(|change| match change {
                PrescriptionChange::Prescriber(prescriber) => prescriber != &current.prescriber,
                PrescriptionChange::Instructions(instructions) => {
                    instructions != &current.instructions
                }
                PrescriptionChange::IssuedAt(issued_at) => {
                    !canonical::same_instant(issued_at, &current.issued_at)
                }
            })
            .map(PrescriptionChange::field_name)
            .collect()
    }

    fn apply(&self, entity: &mut Prescription) {
        for change in &self.changes {
            match change {
                PrescriptionChange::Prescriber(prescriber) => {
                    entity.prescriber = prescriber.clone()
                }
                PrescriptionChange::Instructions(instructions) => {
                    entity.instructions = instructions.clone()
                }
                PrescriptionChange::IssuedAt(issued_at) => {
                    entity.issued_at = issued_at.with_timezone(&Utc)
                }
            }
        }
    }
}
