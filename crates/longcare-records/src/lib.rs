//! Governed entity catalog
//!
//! The typed entities the mutation engine governs, together with their patch
//! types. A patch is a closed list of permitted field updates, so change
//! detection is exhaustive over the enum and uses canonical per-field
//! equality instead of comparing serialized blobs.

pub mod canonical;
mod daily_record;
mod medication;
mod prescription;

pub use daily_record::{DailyRecord, DailyRecordChange, DailyRecordPatch};
pub use medication::{Medication, MedicationChange, MedicationPatch};
pub use prescription::{Prescription, PrescriptionChange, PrescriptionPatch};
