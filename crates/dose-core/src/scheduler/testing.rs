//! Collaborator doubles for scheduler unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::error::{DispatchError, StoreError};
use crate::medication::{MedicationOccurrence, MedicationType, OccurrenceId, SeriesKey};
use crate::notify::NotificationDispatcher;
use crate::storage::MedicationStore;

pub(crate) fn series_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap()
}

/// `n` hourly doses of a bounded series.
pub(crate) fn bounded_batch(n: i64) -> Vec<MedicationOccurrence> {
    (0..n)
        .map(|i| MedicationOccurrence {
            id: 0,
            name: "Amoxicillin".into(),
            dosage: 500,
            frequency: "hourly".into(),
            medication_type: MedicationType::Capsule,
            start_date: series_start(),
            end_date: Some(series_start() + Duration::days(30)),
            medication_time: series_start() + Duration::hours(i),
            taken: false,
        })
        .collect()
}

pub(crate) fn lifetime_dose(medication_time: DateTime<Utc>) -> MedicationOccurrence {
    MedicationOccurrence {
        id: 0,
        name: "Vitamin D".into(),
        dosage: 1,
        frequency: "daily".into(),
        medication_type: MedicationType::Capsule,
        start_date: series_start(),
        end_date: None,
        medication_time,
        taken: false,
    }
}

#[derive(Default)]
pub(crate) struct RecordingDispatcher {
    fail_on: Vec<OccurrenceId>,
    scheduled: Mutex<Vec<OccurrenceId>>,
    cancelled: Mutex<Vec<OccurrenceId>>,
}

impl RecordingDispatcher {
    pub(crate) fn failing_on(ids: &[OccurrenceId]) -> Self {
        Self {
            fail_on: ids.to_vec(),
            ..Self::default()
        }
    }

    pub(crate) fn scheduled_ids(&self) -> Vec<OccurrenceId> {
        self.scheduled.lock().unwrap().clone()
    }

    pub(crate) fn cancelled_ids(&self) -> Vec<OccurrenceId> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn schedule(&self, occurrence: &MedicationOccurrence) -> Result<(), DispatchError> {
        if self.fail_on.contains(&occurrence.id) {
            return Err(DispatchError::Rejected {
                id: occurrence.id,
                reason: "channel disabled".into(),
            });
        }
        self.scheduled.lock().unwrap().push(occurrence.id);
        Ok(())
    }

    async fn cancel(&self, id: OccurrenceId) -> Result<(), DispatchError> {
        if self.fail_on.contains(&id) {
            return Err(DispatchError::Rejected {
                id,
                reason: "channel disabled".into(),
            });
        }
        self.cancelled.lock().unwrap().push(id);
        Ok(())
    }
}

/// Store whose every call fails.
pub(crate) struct FailingStore;

fn offline() -> StoreError {
    StoreError::Unavailable("offline".into())
}

#[async_trait]
impl MedicationStore for FailingStore {
    async fn insert(
        &self,
        _batch: Vec<MedicationOccurrence>,
    ) -> Result<Vec<MedicationOccurrence>, StoreError> {
        Err(offline())
    }

    async fn delete(&self, _id: OccurrenceId) -> Result<(), StoreError> {
        Err(offline())
    }

    async fn delete_future_occurrences(
        &self,
        _series: &SeriesKey,
        _from: DateTime<Utc>,
    ) -> Result<Vec<OccurrenceId>, StoreError> {
        Err(offline())
    }

    async fn find(
        &self,
        _series: &SeriesKey,
        _at: DateTime<Utc>,
    ) -> Result<Option<MedicationOccurrence>, StoreError> {
        Err(offline())
    }

    async fn get(&self, _id: OccurrenceId) -> Result<Option<MedicationOccurrence>, StoreError> {
        Err(offline())
    }

    async fn list_all(&self) -> Result<Vec<MedicationOccurrence>, StoreError> {
        Err(offline())
    }

    async fn set_taken(&self, _id: OccurrenceId, _taken: bool) -> Result<(), StoreError> {
        Err(offline())
    }
}
