//! Caller-facing facade over the coordinator, renewal handler and resolver.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::{ConfirmReport, DeleteOutcome, DeletionResolver, RenewalHandler, SchedulingCoordinator};
use crate::error::{Result, StoreError};
use crate::events::{EventBus, ReminderEvent};
use crate::medication::{MedicationDefinition, MedicationOccurrence, OccurrenceId};
use crate::notify::NotificationDispatcher;
use crate::storage::{EngineConfig, MedicationStore};

/// Reminder engine.
///
/// Cheap to clone; clones share collaborators and the event bus.
#[derive(Clone)]
pub struct ReminderEngine {
    store: Arc<dyn MedicationStore>,
    coordinator: Arc<SchedulingCoordinator>,
    renewal: Arc<RenewalHandler>,
    deletion: Arc<DeletionResolver>,
    events: EventBus,
    runtime: Handle,
    reschedule_days: i64,
}

impl ReminderEngine {
    /// Background work (renewals, [`confirm_in_background`](Self::confirm_in_background))
    /// is spawned on `runtime`.
    pub fn new(
        store: Arc<dyn MedicationStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: &EngineConfig,
        runtime: Handle,
    ) -> Self {
        let events = EventBus::default();
        Self {
            coordinator: Arc::new(SchedulingCoordinator::new(
                Arc::clone(&store),
                Arc::clone(&dispatcher),
                events.clone(),
                config.max_notifications_to_schedule,
            )),
            renewal: Arc::new(RenewalHandler::new(
                Arc::clone(&store),
                Arc::clone(&dispatcher),
                events.clone(),
                config.lifetime_reschedule_days,
                runtime.clone(),
            )),
            deletion: Arc::new(DeletionResolver::new(
                Arc::clone(&store),
                dispatcher,
                events.clone(),
            )),
            store,
            events,
            runtime,
            reschedule_days: config.lifetime_reschedule_days,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReminderEvent> {
        self.events.subscribe()
    }

    /// # Errors
    /// Returns the store's error if the batch could not be persisted.
    pub async fn confirm(
        &self,
        occurrences: Vec<MedicationOccurrence>,
    ) -> Result<ConfirmReport, StoreError> {
        self.coordinator.confirm(occurrences).await
    }

    /// Run [`confirm`](Self::confirm) on the engine's runtime.
    pub fn confirm_in_background(
        &self,
        occurrences: Vec<MedicationOccurrence>,
    ) -> JoinHandle<Result<ConfirmReport, StoreError>> {
        let coordinator = Arc::clone(&self.coordinator);
        self.runtime
            .spawn(async move { coordinator.confirm(occurrences).await })
    }

    /// Expand a definition and confirm the resulting occurrences.
    ///
    /// Lifetime definitions are expanded over the engine's renewal interval so
    /// renewals continue exactly where the initial batch ends.
    ///
    /// # Errors
    /// Returns a validation error for a malformed definition, or the store's
    /// error if persisting fails.
    pub async fn confirm_definition(
        &self,
        definition: &MedicationDefinition,
    ) -> Result<ConfirmReport> {
        let occurrences = definition.expand_with_horizon(self.reschedule_days)?;
        Ok(self.coordinator.confirm(occurrences).await?)
    }

    /// Hook for the host's notification delivery.
    ///
    /// Returns the renewal task for lifetime medications. Awaiting it is
    /// optional; it never yields an error.
    pub fn on_notification_delivered(
        &self,
        occurrence: MedicationOccurrence,
    ) -> Option<JoinHandle<()>> {
        self.renewal.on_delivered(occurrence)
    }

    /// # Errors
    /// Returns the store's error if the delete fails.
    pub async fn delete_medication(
        &self,
        occurrence: &MedicationOccurrence,
    ) -> Result<DeleteOutcome, StoreError> {
        self.deletion.delete_medication(occurrence).await
    }

    /// # Errors
    /// Returns the store's error if the delete fails.
    pub async fn delete_future_medication_doses(
        &self,
        occurrence: &MedicationOccurrence,
    ) -> Result<usize, StoreError> {
        self.deletion.delete_future_medication_doses(occurrence).await
    }

    /// # Errors
    /// Returns [`StoreError::NotFound`] for an unknown id.
    pub async fn mark_taken(&self, id: OccurrenceId, taken: bool) -> Result<(), StoreError> {
        self.store.set_taken(id, taken).await
    }

    /// # Errors
    /// Returns the store's error if the lookup fails.
    pub async fn occurrence(
        &self,
        id: OccurrenceId,
    ) -> Result<Option<MedicationOccurrence>, StoreError> {
        self.store.get(id).await
    }

    /// # Errors
    /// Returns the store's error if the query fails.
    pub async fn occurrences(&self) -> Result<Vec<MedicationOccurrence>, StoreError> {
        self.store.list_all().await
    }
}
