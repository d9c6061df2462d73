//! Lifetime renewal.
//!
//! When a reminder for a lifetime medication fires, the next occurrence is
//! created `lifetime_reschedule_days` later and scheduled. Delivery has no
//! caller to report to, so renewal runs as its own task and only logs failures.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::RenewalError;
use crate::events::{EventBus, ReminderEvent};
use crate::medication::{MedicationOccurrence, SeriesKey};
use crate::notify::NotificationDispatcher;
use crate::storage::MedicationStore;

type RenewalKey = (SeriesKey, DateTime<Utc>);

/// Holds a renewal key for the duration of one renewal.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<RenewalKey>>,
    key: Option<RenewalKey>,
}

impl<'a> InFlight<'a> {
    /// `None` if the same renewal is already running.
    fn claim(set: &'a Mutex<HashSet<RenewalKey>>, key: RenewalKey) -> Option<Self> {
        let mut guard = set.lock().unwrap_or_else(PoisonError::into_inner);
        if !guard.insert(key.clone()) {
            return None;
        }
        Some(Self {
            set,
            key: Some(key),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.set
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        }
    }
}

pub struct RenewalHandler {
    store: Arc<dyn MedicationStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    events: EventBus,
    reschedule_days: i64,
    runtime: Handle,
    in_flight: Mutex<HashSet<RenewalKey>>,
}

impl RenewalHandler {
    pub fn new(
        store: Arc<dyn MedicationStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        events: EventBus,
        reschedule_days: i64,
        runtime: Handle,
    ) -> Self {
        Self {
            store,
            dispatcher,
            events,
            reschedule_days,
            runtime,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Entry point for a delivered reminder.
    ///
    /// Bounded occurrences need no renewal and return `None`. Otherwise the
    /// renewal is spawned as an independent task; its failure is logged and
    /// never reaches the caller.
    pub fn on_delivered(self: &Arc<Self>, fired: MedicationOccurrence) -> Option<JoinHandle<()>> {
        if !fired.is_lifetime() {
            return None;
        }
        let handler = Arc::clone(self);
        Some(self.runtime.spawn(async move {
            match handler.renew(&fired).await {
                Ok(Some(next)) => tracing::info!(
                    name = %fired.name,
                    id = next.id,
                    at = %next.medication_time,
                    "rescheduled lifetime medication"
                ),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        name = %fired.name,
                        id = fired.id,
                        "failed to reschedule lifetime medication: {e}"
                    );
                    handler.events.emit(ReminderEvent::RenewalFailed {
                        previous_id: fired.id,
                        name: fired.name.clone(),
                        reason: e.to_string(),
                        at: Utc::now(),
                    });
                }
            }
        }))
    }

    /// Create, persist, and schedule the occurrence following `fired`.
    ///
    /// Returns `Ok(None)` for bounded series, for a renewal of the same
    /// trigger that is already running, and when the next occurrence is
    /// already stored. Nothing is scheduled or emitted in those cases.
    ///
    /// # Errors
    /// Returns a [`RenewalError`] if persisting or scheduling fails.
    pub async fn renew(
        &self,
        fired: &MedicationOccurrence,
    ) -> Result<Option<MedicationOccurrence>, RenewalError> {
        if !fired.is_lifetime() {
            return Ok(None);
        }
        let Some(_claim) =
            InFlight::claim(&self.in_flight, (fired.series_key(), fired.medication_time))
        else {
            tracing::debug!(name = %fired.name, "renewal already in flight");
            return Ok(None);
        };

        let next = fired
            .next_lifetime_occurrence(self.reschedule_days)
            .ok_or_else(|| RenewalError::TimeOutOfRange(fired.name.clone()))?;

        let existing = self
            .store
            .find(&next.series_key(), next.medication_time)
            .await
            .map_err(|source| RenewalError::Persist {
                name: fired.name.clone(),
                source,
            })?;
        if let Some(existing) = existing {
            tracing::debug!(name = %fired.name, id = existing.id, "renewal already stored");
            return Ok(None);
        }

        let persisted =
            self.store
                .insert(vec![next])
                .await
                .map_err(|source| RenewalError::Persist {
                    name: fired.name.clone(),
                    source,
                })?;
        let saved = persisted
            .into_iter()
            .next()
            .ok_or_else(|| RenewalError::NothingPersisted(fired.name.clone()))?;

        self.dispatcher
            .schedule(&saved)
            .await
            .map_err(|source| RenewalError::Schedule {
                name: fired.name.clone(),
                source,
            })?;

        self.events.emit(ReminderEvent::RenewalCreated {
            previous_id: fired.id,
            occurrence_id: saved.id,
            medication_time: saved.medication_time,
            at: Utc::now(),
        });
        Ok(Some(saved))
    }
}
