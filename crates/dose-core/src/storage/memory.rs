//! In-memory medication store.
//!
//! Same contract as [`SqliteStore`](super::SqliteStore), including the
//! one-occurrence-per-(series, time) rule. Nothing survives the process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::MedicationStore;
use crate::error::StoreError;
use crate::medication::{MedicationOccurrence, OccurrenceId, SeriesKey};

#[derive(Default)]
struct Rows {
    next_id: OccurrenceId,
    occurrences: Vec<MedicationOccurrence>,
}

#[derive(Default)]
pub struct InMemoryStore {
    rows: Mutex<Rows>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MedicationStore for InMemoryStore {
    async fn insert(
        &self,
        batch: Vec<MedicationOccurrence>,
    ) -> Result<Vec<MedicationOccurrence>, StoreError> {
        let mut rows = self.rows.lock().await;
        let mut persisted = Vec::with_capacity(batch.len());
        for mut occurrence in batch {
            let key = occurrence.series_key();
            let existing = rows
                .occurrences
                .iter()
                .find(|o| o.medication_time == occurrence.medication_time && key.matches(o));
            if let Some(existing) = existing {
                persisted.push(existing.clone());
                continue;
            }
            rows.next_id += 1;
            occurrence.id = rows.next_id;
            rows.occurrences.push(occurrence.clone());
            persisted.push(occurrence);
        }
        Ok(persisted)
    }

    async fn delete(&self, id: OccurrenceId) -> Result<(), StoreError> {
        self.rows.lock().await.occurrences.retain(|o| o.id != id);
        Ok(())
    }

    async fn delete_future_occurrences(
        &self,
        series: &SeriesKey,
        from: DateTime<Utc>,
    ) -> Result<Vec<OccurrenceId>, StoreError> {
        let mut rows = self.rows.lock().await;
        let mut removed: Vec<&MedicationOccurrence> = rows
            .occurrences
            .iter()
            .filter(|o| o.medication_time >= from && series.matches(o))
            .collect();
        removed.sort_by_key(|o| (o.medication_time, o.id));
        let ids: Vec<OccurrenceId> = removed.into_iter().map(|o| o.id).collect();
        rows.occurrences.retain(|o| !ids.contains(&o.id));
        Ok(ids)
    }

    async fn find(
        &self,
        series: &SeriesKey,
        at: DateTime<Utc>,
    ) -> Result<Option<MedicationOccurrence>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .occurrences
            .iter()
            .find(|o| o.medication_time == at && series.matches(o))
            .cloned())
    }

    async fn get(&self, id: OccurrenceId) -> Result<Option<MedicationOccurrence>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows.occurrences.iter().find(|o| o.id == id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<MedicationOccurrence>, StoreError> {
        let mut all = self.rows.lock().await.occurrences.clone();
        all.sort_by_key(|o| (o.medication_time, o.id));
        Ok(all)
    }

    async fn set_taken(&self, id: OccurrenceId, taken: bool) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        let occurrence = rows
            .occurrences
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(StoreError::NotFound(id))?;
        occurrence.taken = taken;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medication::MedicationType;
    use chrono::{Duration, TimeZone};

    fn dose(day: i64) -> MedicationOccurrence {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 7, 30, 0).unwrap();
        MedicationOccurrence {
            id: 0,
            name: "Metformin".into(),
            dosage: 500,
            frequency: "daily".into(),
            medication_type: MedicationType::Tablet,
            start_date: start,
            end_date: None,
            medication_time: start + Duration::days(day),
            taken: false,
        }
    }

    #[tokio::test]
    async fn ids_are_nonzero_and_increasing() {
        let store = InMemoryStore::new();
        let saved = store.insert(vec![dose(0), dose(1), dose(2)]).await.unwrap();
        let ids: Vec<_> = saved.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn same_series_and_time_is_not_duplicated() {
        let store = InMemoryStore::new();
        let a = store.insert(vec![dose(4)]).await.unwrap();
        let b = store.insert(vec![dose(4)]).await.unwrap();
        assert_eq!(a[0].id, b[0].id);
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_future_returns_removed_ids_in_time_order() {
        let store = InMemoryStore::new();
        let saved = store.insert(vec![dose(9), dose(0), dose(3)]).await.unwrap();
        let removed = store
            .delete_future_occurrences(&saved[0].series_key(), dose(1).medication_time)
            .await
            .unwrap();
        assert_eq!(removed, vec![saved[2].id, saved[0].id]);
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }
}
