//! Delete requests: one past dose, or everything still ahead in the series.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::events::{EventBus, ReminderEvent};
use crate::medication::{MedicationOccurrence, OccurrenceId};
use crate::notify::NotificationDispatcher;
use crate::storage::MedicationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// A past dose was removed on its own.
    Single { id: OccurrenceId },
    /// Every dose of the series due from now on was removed.
    Future { removed: usize },
}

impl DeleteOutcome {
    pub fn removed(&self) -> usize {
        match self {
            DeleteOutcome::Single { .. } => 1,
            DeleteOutcome::Future { removed } => *removed,
        }
    }
}

pub struct DeletionResolver {
    store: Arc<dyn MedicationStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    events: EventBus,
}

impl DeletionResolver {
    pub fn new(
        store: Arc<dyn MedicationStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            dispatcher,
            events,
        }
    }

    /// # Errors
    /// Returns the store's error if the delete fails.
    pub async fn delete_medication(
        &self,
        occurrence: &MedicationOccurrence,
    ) -> Result<DeleteOutcome, StoreError> {
        self.delete_medication_at(occurrence, Utc::now()).await
    }

    /// Past doses (strictly before `now`) are deleted alone so history stays
    /// intact; anything else cascades to the rest of the series.
    ///
    /// # Errors
    /// Returns the store's error if the delete fails.
    pub async fn delete_medication_at(
        &self,
        occurrence: &MedicationOccurrence,
        now: DateTime<Utc>,
    ) -> Result<DeleteOutcome, StoreError> {
        if occurrence.medication_time < now {
            self.store.delete(occurrence.id).await?;
            tracing::debug!(id = occurrence.id, name = %occurrence.name, "deleted past dose");
            self.events.emit(ReminderEvent::DosesDeleted {
                removed: 1,
                cascade: false,
                at: now,
            });
            return Ok(DeleteOutcome::Single { id: occurrence.id });
        }

        let removed = self.delete_future_medication_doses_at(occurrence, now).await?;
        Ok(DeleteOutcome::Future { removed })
    }

    /// # Errors
    /// Returns the store's error if the delete fails.
    pub async fn delete_future_medication_doses(
        &self,
        occurrence: &MedicationOccurrence,
    ) -> Result<usize, StoreError> {
        self.delete_future_medication_doses_at(occurrence, Utc::now())
            .await
    }

    /// Remove every dose of `occurrence`'s series due at or after `now`, and
    /// cancel their pending reminders. Returns the number removed.
    ///
    /// # Errors
    /// Returns the store's error if the delete fails. Cancel failures are
    /// only logged.
    pub async fn delete_future_medication_doses_at(
        &self,
        occurrence: &MedicationOccurrence,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let removed = self
            .store
            .delete_future_occurrences(&occurrence.series_key(), now)
            .await?;

        for id in &removed {
            if let Err(e) = self.dispatcher.cancel(*id).await {
                tracing::warn!(id, "failed to cancel notification: {e}");
            }
        }

        tracing::debug!(
            name = %occurrence.name,
            removed = removed.len(),
            "deleted future doses"
        );
        self.events.emit(ReminderEvent::DosesDeleted {
            removed: removed.len(),
            cascade: true,
            at: now,
        });
        Ok(removed.len())
    }
}
