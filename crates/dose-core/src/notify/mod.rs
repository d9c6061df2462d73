//! Notification dispatch boundary.
//!
//! The engine asks a dispatcher to show a reminder at an occurrence's
//! `medication_time`; delivery mechanics belong to the host platform.

pub mod alarms;

pub use alarms::AlarmTable;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::medication::{MedicationOccurrence, OccurrenceId};

/// URI scheme of the medication detail deep link.
pub const DEEP_LINK_SCHEME: &str = "doseapp";

/// Schedules and cancels platform reminders, addressed by occurrence id.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Arrange for a reminder at `occurrence.medication_time`.
    ///
    /// Scheduling an id that is already pending replaces it.
    async fn schedule(&self, occurrence: &MedicationOccurrence) -> Result<(), DispatchError>;

    /// Drop the pending reminder for `id`, if any.
    async fn cancel(&self, id: OccurrenceId) -> Result<(), DispatchError>;
}

/// What the user sees when a reminder fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Equal to the occurrence id.
    pub id: OccurrenceId,
    pub fire_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
    /// Opens the medication detail view when clicked.
    pub deep_link: String,
}

impl Notification {
    /// # Errors
    /// Returns [`DispatchError::Unpersisted`] when the occurrence has no id yet.
    pub fn for_occurrence(occurrence: &MedicationOccurrence) -> Result<Self, DispatchError> {
        if !occurrence.is_persisted() {
            return Err(DispatchError::Unpersisted {
                name: occurrence.name.clone(),
            });
        }
        Ok(Self {
            id: occurrence.id,
            fire_at: occurrence.medication_time,
            title: "Medication reminder".into(),
            body: format!("It's time to take {}.", occurrence.name),
            deep_link: format!("{DEEP_LINK_SCHEME}://medication/{}", occurrence.id),
        })
    }
}
