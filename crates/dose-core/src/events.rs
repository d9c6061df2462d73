use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::medication::OccurrenceId;

/// Every outcome of the reminder engine produces an Event.
/// Presentation layers subscribe to them; none are required for correctness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReminderEvent {
    /// A confirmed batch was persisted. Emitted exactly once per confirm,
    /// whatever happened to the individual notifications.
    MedicationSaved {
        persisted: usize,
        scheduled: usize,
        unscheduled: usize,
        dispatch_failures: usize,
        at: DateTime<Utc>,
    },
    /// One notification could not be scheduled.
    NotificationFailed {
        occurrence_id: OccurrenceId,
        reason: String,
        at: DateTime<Utc>,
    },
    /// A lifetime series was extended by one occurrence.
    RenewalCreated {
        previous_id: OccurrenceId,
        occurrence_id: OccurrenceId,
        medication_time: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// Renewal of a lifetime series failed; the next reminder will not appear.
    RenewalFailed {
        previous_id: OccurrenceId,
        name: String,
        reason: String,
        at: DateTime<Utc>,
    },
    /// Occurrences were removed by a delete request.
    DosesDeleted {
        removed: usize,
        cascade: bool,
        at: DateTime<Utc>,
    },
}

/// Broadcast fan-out of [`ReminderEvent`]s.
///
/// Lagging or absent subscribers never block the engine.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ReminderEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReminderEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&self, event: ReminderEvent) {
        // Err only means nobody is listening
        if self.tx.send(event).is_err() {
            tracing::trace!("no event subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
