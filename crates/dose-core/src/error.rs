//! Core error types for dose-core.
//!
//! Each collaborator boundary gets its own error enum so callers can tell a
//! persistence failure (surfaced) from a dispatch failure (recovered locally)
//! from a renewal failure (logged, never surfaced).

use std::path::PathBuf;
use thiserror::Error;

use crate::medication::OccurrenceId;

/// Errors surfaced by [`ReminderEngine::confirm_definition`](crate::ReminderEngine::confirm_definition).
#[derive(Error, Debug)]
pub enum CoreError {
    /// Medication store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Malformed medication definition
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Persistence failures raised by a [`MedicationStore`](crate::storage::MedicationStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// No occurrence with the given id
    #[error("Occurrence {0} not found")]
    NotFound(OccurrenceId),

    /// The blocking worker running the query died
    #[error("Store worker failed: {0}")]
    Worker(String),

    /// The store refused the request outright
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Failures raised by a [`NotificationDispatcher`](crate::notify::NotificationDispatcher).
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Occurrence has not been persisted and cannot be addressed
    #[error("Occurrence '{name}' has no identifier yet")]
    Unpersisted { name: String },

    /// The platform rejected the notification
    #[error("Notification {id} rejected: {reason}")]
    Rejected { id: OccurrenceId, reason: String },

    /// Alarm backing storage failed
    #[error("Alarm storage failed: {0}")]
    Storage(#[from] StoreError),
}

/// Failures inside the lifetime renewal path.
///
/// These never leave the spawned renewal task; they exist so the failure can be
/// logged with its cause.
#[derive(Error, Debug)]
pub enum RenewalError {
    /// Persisting the next occurrence failed
    #[error("Failed to persist renewal of '{name}': {source}")]
    Persist {
        name: String,
        #[source]
        source: StoreError,
    },

    /// Scheduling the next occurrence failed
    #[error("Failed to schedule renewal of '{name}': {source}")]
    Schedule {
        name: String,
        #[source]
        source: DispatchError,
    },

    /// Store accepted the insert but handed nothing back
    #[error("Store returned no occurrence for renewal of '{0}'")]
    NothingPersisted(String),

    /// next medication_time overflowed the calendar
    #[error("Renewal time out of range for '{0}'")]
    TimeOutOfRange(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid date range
    #[error("Invalid date range: end_date ({end}) is before start_date ({start})")]
    InvalidDateRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    /// Empty collection
    #[error("Empty collection: {0}")]
    EmptyCollection(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked
                    || inner.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Worker(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
