//! Database schema migrations for dose.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 if no version is set (initial database).
pub(crate) fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!("failed to read schema_version: {e}");
        }
        0
    })
}

fn set_schema_version(tx: &rusqlite::Transaction<'_>, version: i32) -> SqliteResult<()> {
    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: medications table.
///
/// One row per dose occurrence. `end_date` is nullable; NULL marks a lifetime
/// medication. A series holds at most one occurrence per `medication_time`.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS medications (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            name            TEXT NOT NULL,
            dosage          INTEGER NOT NULL,
            frequency       TEXT NOT NULL DEFAULT '',
            medication_type TEXT NOT NULL DEFAULT 'other',
            start_date      TEXT NOT NULL,
            end_date        TEXT,
            medication_time TEXT NOT NULL,
            taken           INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_medications_time ON medications(medication_time);

        CREATE UNIQUE INDEX IF NOT EXISTS idx_medications_series_time
        ON medications(name, dosage, frequency, start_date, medication_type, medication_time);",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: pending notification alarms.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS scheduled_notifications (
            occurrence_id INTEGER PRIMARY KEY
                REFERENCES medications(id) ON DELETE CASCADE,
            fire_at       TEXT NOT NULL,
            title         TEXT NOT NULL,
            body          TEXT NOT NULL,
            deep_link     TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_scheduled_notifications_fire_at
        ON scheduled_notifications(fire_at);",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}
