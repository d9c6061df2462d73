//! Confirmation path: persist a batch, then schedule its reminders.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, StoreError};
use crate::events::{EventBus, ReminderEvent};
use crate::medication::MedicationOccurrence;
use crate::notify::NotificationDispatcher;
use crate::storage::MedicationStore;

/// Result of one confirm call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmReport {
    /// Every occurrence as stored, in generation order.
    pub persisted: Vec<MedicationOccurrence>,
    pub scheduled: usize,
    /// Persisted but past the scheduling cap.
    pub unscheduled: usize,
    pub dispatch_failures: usize,
}

pub struct SchedulingCoordinator {
    store: Arc<dyn MedicationStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    events: EventBus,
    max_notifications: usize,
}

impl SchedulingCoordinator {
    pub fn new(
        store: Arc<dyn MedicationStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        events: EventBus,
        max_notifications: usize,
    ) -> Self {
        Self {
            store,
            dispatcher,
            events,
            max_notifications,
        }
    }

    /// Persist `occurrences` and schedule reminders for the first
    /// `max_notifications` of them.
    ///
    /// Notification failures are logged and counted; only a persistence
    /// failure makes the call fail.
    ///
    /// # Errors
    /// Returns the store's error if the batch could not be persisted.
    pub async fn confirm(
        &self,
        occurrences: Vec<MedicationOccurrence>,
    ) -> Result<ConfirmReport, StoreError> {
        let persisted = self.store.insert(occurrences).await?;

        let limit = persisted.len().min(self.max_notifications);
        if persisted.len() > self.max_notifications {
            tracing::warn!(
                limit = self.max_notifications,
                total = persisted.len(),
                "limiting notification scheduling"
            );
        }

        let mut scheduled = 0;
        let mut dispatch_failures = 0;
        for occurrence in &persisted[..limit] {
            match self.schedule_one(occurrence).await {
                Ok(()) => scheduled += 1,
                Err(e) => {
                    dispatch_failures += 1;
                    tracing::warn!(
                        id = occurrence.id,
                        name = %occurrence.name,
                        "failed to schedule notification: {e}"
                    );
                    self.events.emit(ReminderEvent::NotificationFailed {
                        occurrence_id: occurrence.id,
                        reason: e.to_string(),
                        at: Utc::now(),
                    });
                }
            }
        }

        let report = ConfirmReport {
            unscheduled: persisted.len() - limit,
            persisted,
            scheduled,
            dispatch_failures,
        };
        self.events.emit(ReminderEvent::MedicationSaved {
            persisted: report.persisted.len(),
            scheduled: report.scheduled,
            unscheduled: report.unscheduled,
            dispatch_failures: report.dispatch_failures,
            at: Utc::now(),
        });
        Ok(report)
    }

    async fn schedule_one(&self, occurrence: &MedicationOccurrence) -> Result<(), DispatchError> {
        if !occurrence.is_persisted() {
            return Err(DispatchError::Unpersisted {
                name: occurrence.name.clone(),
            });
        }
        self.dispatcher.schedule(occurrence).await?;
        tracing::debug!(
            id = occurrence.id,
            at = %occurrence.medication_time,
            "notification scheduled"
        );
        Ok(())
    }
}
