mod config;
pub mod database;
pub mod memory;
pub mod migrations;

pub use config::{Config, EngineConfig, LoggingConfig, StorageConfig};
pub use database::SqliteStore;
pub use memory::InMemoryStore;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{ConfigError, StoreError};
use crate::medication::{MedicationOccurrence, OccurrenceId, SeriesKey};

/// Durable storage of medication occurrences.
///
/// Every call may fail; callers do not retry.
#[async_trait]
pub trait MedicationStore: Send + Sync {
    /// Persist a batch and return it, in the same order, with ids assigned.
    ///
    /// An occurrence that already exists for the same series and
    /// `medication_time` is returned as the existing row instead of a duplicate.
    async fn insert(
        &self,
        batch: Vec<MedicationOccurrence>,
    ) -> Result<Vec<MedicationOccurrence>, StoreError>;

    /// Delete one occurrence. Deleting a missing id is a no-op.
    async fn delete(&self, id: OccurrenceId) -> Result<(), StoreError>;

    /// Delete every occurrence of `series` due at or after `from`.
    ///
    /// Returns the ids removed.
    async fn delete_future_occurrences(
        &self,
        series: &SeriesKey,
        from: DateTime<Utc>,
    ) -> Result<Vec<OccurrenceId>, StoreError>;

    /// The occurrence of `series` due exactly at `at`, if stored.
    async fn find(
        &self,
        series: &SeriesKey,
        at: DateTime<Utc>,
    ) -> Result<Option<MedicationOccurrence>, StoreError>;

    async fn get(&self, id: OccurrenceId) -> Result<Option<MedicationOccurrence>, StoreError>;

    /// All occurrences ordered by `medication_time`, then id.
    async fn list_all(&self) -> Result<Vec<MedicationOccurrence>, StoreError>;

    async fn set_taken(&self, id: OccurrenceId, taken: bool) -> Result<(), StoreError>;
}

/// Returns the data directory.
///
/// `DOSE_DATA_DIR` wins when set. Otherwise `~/.config/doseapp[-dev]/`,
/// with `DOSE_ENV=dev` selecting the development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("DOSE_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("DOSE_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("doseapp-dev")
            } else {
                base_dir.join("doseapp")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(e.to_string()))?;
    Ok(dir)
}

/// Fixed-width RFC 3339 at full precision, so stored instants compare
/// correctly as text and read back unchanged.
pub(crate) fn format_instant(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_instant(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}
