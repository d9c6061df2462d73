//! SQLite-based medication storage.
//!
//! rusqlite is blocking, so every call hops onto tokio's blocking pool and
//! serializes on a shared connection.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{data_dir, format_instant, migrations, parse_instant, Config, MedicationStore};
use crate::error::StoreError;
use crate::medication::{MedicationOccurrence, MedicationType, OccurrenceId, SeriesKey};

pub(crate) type SharedConnection = Arc<Mutex<Connection>>;

const SELECT_COLUMNS: &str = "SELECT id, name, dosage, frequency, medication_type, start_date,
            end_date, medication_time, taken
     FROM medications";

const SERIES_FILTER: &str = "name = ?1 AND dosage = ?2 AND frequency = ?3
     AND start_date = ?4 AND medication_type = ?5";

/// Run `f` against the shared connection on the blocking pool.
pub(crate) async fn run_blocking<T, F>(conn: &SharedConnection, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
{
    let conn = Arc::clone(conn);
    tokio::task::spawn_blocking(move || {
        let mut guard = conn
            .lock()
            .map_err(|_| StoreError::Worker("connection mutex poisoned".into()))?;
        f(&mut guard)
    })
    .await?
}

fn conversion_error(idx: usize, err: chrono::ParseError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

/// Build a MedicationOccurrence from a row selected with `SELECT_COLUMNS`
pub(crate) fn row_to_occurrence(row: &Row) -> Result<MedicationOccurrence, rusqlite::Error> {
    let medication_type: String = row.get(4)?;
    let start_date: String = row.get(5)?;
    let end_date: Option<String> = row.get(6)?;
    let medication_time: String = row.get(7)?;

    Ok(MedicationOccurrence {
        id: row.get(0)?,
        name: row.get(1)?,
        dosage: row.get(2)?,
        frequency: row.get(3)?,
        medication_type: MedicationType::parse(&medication_type),
        start_date: parse_instant(&start_date).map_err(|e| conversion_error(5, e))?,
        end_date: end_date
            .as_deref()
            .map(parse_instant)
            .transpose()
            .map_err(|e| conversion_error(6, e))?,
        medication_time: parse_instant(&medication_time).map_err(|e| conversion_error(7, e))?,
        taken: row.get(8)?,
    })
}

/// SQLite database for medication occurrences.
#[derive(Clone)]
pub struct SqliteStore {
    conn: SharedConnection,
}

impl SqliteStore {
    /// Open the database file named in `config` under [`data_dir`].
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(config: &Config) -> Result<Self, StoreError> {
        let dir = data_dir().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::open_path(&dir.join(&config.storage.database_file))
    }

    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_path(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if migration fails.
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn shared_connection(&self) -> SharedConnection {
        Arc::clone(&self.conn)
    }
}

fn insert_batch(
    conn: &mut Connection,
    batch: Vec<MedicationOccurrence>,
) -> Result<Vec<MedicationOccurrence>, StoreError> {
    let tx = conn.transaction()?;
    let mut persisted = Vec::with_capacity(batch.len());
    {
        let mut insert = tx.prepare(
            "INSERT INTO medications
             (name, dosage, frequency, medication_type, start_date, end_date, medication_time, taken)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(name, dosage, frequency, start_date, medication_type, medication_time)
             DO NOTHING",
        )?;
        let mut existing =
            tx.prepare(&format!("{SELECT_COLUMNS} WHERE {SERIES_FILTER} AND medication_time = ?6"))?;

        for mut occurrence in batch {
            let start_date = format_instant(occurrence.start_date);
            let medication_time = format_instant(occurrence.medication_time);
            let inserted = insert.execute(params![
                occurrence.name,
                occurrence.dosage,
                occurrence.frequency,
                occurrence.medication_type.as_str(),
                start_date,
                occurrence.end_date.map(format_instant),
                medication_time,
                occurrence.taken,
            ])?;

            if inserted == 1 {
                occurrence.id = tx.last_insert_rowid();
                persisted.push(occurrence);
            } else {
                let row = existing.query_row(
                    params![
                        occurrence.name,
                        occurrence.dosage,
                        occurrence.frequency,
                        start_date,
                        occurrence.medication_type.as_str(),
                        medication_time,
                    ],
                    row_to_occurrence,
                )?;
                tracing::debug!(id = row.id, name = %row.name, "occurrence already stored");
                persisted.push(row);
            }
        }
    }
    tx.commit()?;
    Ok(persisted)
}

fn delete_future(
    conn: &mut Connection,
    series: &SeriesKey,
    from: DateTime<Utc>,
) -> Result<Vec<OccurrenceId>, StoreError> {
    let start_date = format_instant(series.start_date);
    let from = format_instant(from);
    let tx = conn.transaction()?;
    let ids = {
        let mut stmt = tx.prepare(&format!(
            "SELECT id FROM medications WHERE {SERIES_FILTER} AND medication_time >= ?6
             ORDER BY medication_time, id"
        ))?;
        let rows = stmt.query_map(
            params![
                series.name,
                series.dosage,
                series.frequency,
                start_date,
                series.medication_type.as_str(),
                from,
            ],
            |row| row.get::<_, OccurrenceId>(0),
        )?;
        rows.collect::<Result<Vec<_>, _>>()?
    };
    tx.execute(
        &format!("DELETE FROM medications WHERE {SERIES_FILTER} AND medication_time >= ?6"),
        params![
            series.name,
            series.dosage,
            series.frequency,
            start_date,
            series.medication_type.as_str(),
            from,
        ],
    )?;
    tx.commit()?;
    Ok(ids)
}

#[async_trait]
impl MedicationStore for SqliteStore {
    async fn insert(
        &self,
        batch: Vec<MedicationOccurrence>,
    ) -> Result<Vec<MedicationOccurrence>, StoreError> {
        run_blocking(&self.conn, move |conn| insert_batch(conn, batch)).await
    }

    async fn delete(&self, id: OccurrenceId) -> Result<(), StoreError> {
        run_blocking(&self.conn, move |conn| {
            conn.execute("DELETE FROM medications WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
    }

    async fn delete_future_occurrences(
        &self,
        series: &SeriesKey,
        from: DateTime<Utc>,
    ) -> Result<Vec<OccurrenceId>, StoreError> {
        let series = series.clone();
        run_blocking(&self.conn, move |conn| delete_future(conn, &series, from)).await
    }

    async fn find(
        &self,
        series: &SeriesKey,
        at: DateTime<Utc>,
    ) -> Result<Option<MedicationOccurrence>, StoreError> {
        let series = series.clone();
        run_blocking(&self.conn, move |conn| {
            let row = conn
                .query_row(
                    &format!("{SELECT_COLUMNS} WHERE {SERIES_FILTER} AND medication_time = ?6"),
                    params![
                        series.name,
                        series.dosage,
                        series.frequency,
                        format_instant(series.start_date),
                        series.medication_type.as_str(),
                        format_instant(at),
                    ],
                    row_to_occurrence,
                )
                .optional()?;
            Ok(row)
        })
        .await
    }

    async fn get(&self, id: OccurrenceId) -> Result<Option<MedicationOccurrence>, StoreError> {
        run_blocking(&self.conn, move |conn| {
            let row = conn
                .query_row(
                    &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                    params![id],
                    row_to_occurrence,
                )
                .optional()?;
            Ok(row)
        })
        .await
    }

    async fn list_all(&self) -> Result<Vec<MedicationOccurrence>, StoreError> {
        run_blocking(&self.conn, |conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY medication_time, id"))?;
            let rows = stmt.query_map([], row_to_occurrence)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn set_taken(&self, id: OccurrenceId, taken: bool) -> Result<(), StoreError> {
        run_blocking(&self.conn, move |conn| {
            let changed = conn.execute(
                "UPDATE medications SET taken = ?1 WHERE id = ?2",
                params![taken, id],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(id));
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn dose(name: &str, day: i64) -> MedicationOccurrence {
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        MedicationOccurrence {
            id: 0,
            name: name.into(),
            dosage: 1,
            frequency: "daily".into(),
            medication_type: MedicationType::Tablet,
            start_date: start,
            end_date: Some(start + Duration::days(30)),
            medication_time: start + Duration::days(day),
            taken: false,
        }
    }

    #[tokio::test]
    async fn insert_assigns_ids_in_order() {
        let store = SqliteStore::open_memory().unwrap();
        let saved = store
            .insert(vec![dose("Ibuprofen", 0), dose("Ibuprofen", 1)])
            .await
            .unwrap();
        assert_eq!(saved.len(), 2);
        assert!(saved[0].id > 0 && saved[1].id > saved[0].id);
        assert_eq!(saved[1].medication_time, dose("Ibuprofen", 1).medication_time);
    }

    #[tokio::test]
    async fn duplicate_insert_returns_existing_row() {
        let store = SqliteStore::open_memory().unwrap();
        let first = store.insert(vec![dose("Ibuprofen", 2)]).await.unwrap();
        let second = store.insert(vec![dose("Ibuprofen", 2)]).await.unwrap();
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sub_millisecond_time_reads_back_unchanged() {
        let store = SqliteStore::open_memory().unwrap();
        let mut occurrence = dose("Ibuprofen", 0);
        occurrence.medication_time += Duration::nanoseconds(123_456_789);
        let saved = store.insert(vec![occurrence]).await.unwrap();
        let loaded = store.get(saved[0].id).await.unwrap().unwrap();
        assert_eq!(loaded, saved[0]);
        assert_eq!(store.list_all().await.unwrap(), saved);
    }

    #[tokio::test]
    async fn find_matches_series_and_time() {
        let store = SqliteStore::open_memory().unwrap();
        let saved = store
            .insert(vec![dose("Ibuprofen", 1), dose("Paracetamol", 1)])
            .await
            .unwrap();
        let series = saved[0].series_key();
        let found = store.find(&series, saved[0].medication_time).await.unwrap();
        assert_eq!(found, Some(saved[0].clone()));
        assert!(store
            .find(&series, saved[0].medication_time + Duration::days(1))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn lifetime_end_date_roundtrips_as_null() {
        let store = SqliteStore::open_memory().unwrap();
        let mut occurrence = dose("Vitamin D", 0);
        occurrence.end_date = None;
        let saved = store.insert(vec![occurrence]).await.unwrap();
        let loaded = store.get(saved[0].id).await.unwrap().unwrap();
        assert!(loaded.is_lifetime());
        assert_eq!(loaded, saved[0]);
    }

    #[tokio::test]
    async fn delete_future_leaves_past_and_other_series() {
        let store = SqliteStore::open_memory().unwrap();
        let saved = store
            .insert(vec![
                dose("Ibuprofen", 0),
                dose("Ibuprofen", 5),
                dose("Ibuprofen", 10),
                dose("Paracetamol", 10),
            ])
            .await
            .unwrap();

        let removed = store
            .delete_future_occurrences(&saved[0].series_key(), saved[1].medication_time)
            .await
            .unwrap();
        assert_eq!(removed, vec![saved[1].id, saved[2].id]);

        let remaining: Vec<_> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(remaining, vec![saved[0].id, saved[3].id]);
    }

    #[tokio::test]
    async fn set_taken_on_missing_row_is_not_found() {
        let store = SqliteStore::open_memory().unwrap();
        let err = store.set_taken(42, true).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(42)));
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dose.db");
        let id = {
            let store = SqliteStore::open_path(&path).unwrap();
            store.insert(vec![dose("Ibuprofen", 3)]).await.unwrap()[0].id
        };
        let store = SqliteStore::open_path(&path).unwrap();
        assert!(store.get(id).await.unwrap().is_some());
    }
}
