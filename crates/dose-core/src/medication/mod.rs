//! Medication data model and occurrence generation.

pub mod generator;
pub mod occurrence;

pub use generator::{MedicationDefinition, Recurrence};
pub use occurrence::{
    MedicationOccurrence, MedicationType, OccurrenceId, SeriesKey, LIFETIME_RESCHEDULE_DAYS,
};
