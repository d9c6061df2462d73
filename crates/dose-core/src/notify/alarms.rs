//! SQLite-backed alarm table.
//!
//! A dispatcher for hosts without a platform alarm service: scheduled
//! reminders are rows in `scheduled_notifications`, and the host polls
//! [`AlarmTable::take_due`] to deliver them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{Notification, NotificationDispatcher};
use crate::error::{DispatchError, StoreError};
use crate::medication::{MedicationOccurrence, OccurrenceId};
use crate::storage::database::{row_to_occurrence, run_blocking, SharedConnection};
use crate::storage::{format_instant, parse_instant, SqliteStore};

pub struct AlarmTable {
    conn: SharedConnection,
}

impl AlarmTable {
    /// Alarms live in the same database as the store's occurrences.
    pub fn new(store: &SqliteStore) -> Self {
        Self {
            conn: store.shared_connection(),
        }
    }

    /// All pending alarms ordered by fire time.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn pending(&self) -> Result<Vec<Notification>, StoreError> {
        run_blocking(&self.conn, |conn| {
            let mut stmt = conn.prepare(
                "SELECT occurrence_id, fire_at, title, body, deep_link
                 FROM scheduled_notifications
                 ORDER BY fire_at, occurrence_id",
            )?;
            let rows = stmt.query_map([], |row| {
                let fire_at: String = row.get(1)?;
                Ok(Notification {
                    id: row.get(0)?,
                    fire_at: parse_instant(&fire_at).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?,
                    title: row.get(2)?,
                    body: row.get(3)?,
                    deep_link: row.get(4)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    /// Remove and return every occurrence whose alarm is due at `now`.
    ///
    /// # Errors
    /// Returns an error if the query fails; nothing is removed in that case.
    pub async fn take_due(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<MedicationOccurrence>, StoreError> {
        let now = format_instant(now);
        run_blocking(&self.conn, move |conn| {
            let tx = conn.transaction()?;
            let due = {
                let mut stmt = tx.prepare(
                    "SELECT m.id, m.name, m.dosage, m.frequency, m.medication_type,
                            m.start_date, m.end_date, m.medication_time, m.taken
                     FROM scheduled_notifications n
                     JOIN medications m ON m.id = n.occurrence_id
                     WHERE n.fire_at <= ?1
                     ORDER BY n.fire_at, m.id",
                )?;
                let rows = stmt.query_map(params![now], row_to_occurrence)?;
                rows.collect::<Result<Vec<_>, _>>()?
            };
            tx.execute(
                "DELETE FROM scheduled_notifications WHERE fire_at <= ?1",
                params![now],
            )?;
            tx.commit()?;
            Ok(due)
        })
        .await
    }
}

#[async_trait]
impl NotificationDispatcher for AlarmTable {
    async fn schedule(&self, occurrence: &MedicationOccurrence) -> Result<(), DispatchError> {
        let notification = Notification::for_occurrence(occurrence)?;
        run_blocking(&self.conn, move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO scheduled_notifications
                 (occurrence_id, fire_at, title, body, deep_link)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    notification.id,
                    format_instant(notification.fire_at),
                    notification.title,
                    notification.body,
                    notification.deep_link,
                ],
            )?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn cancel(&self, id: OccurrenceId) -> Result<(), DispatchError> {
        run_blocking(&self.conn, move |conn| {
            conn.execute(
                "DELETE FROM scheduled_notifications WHERE occurrence_id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await?;
        Ok(())
    }
}
