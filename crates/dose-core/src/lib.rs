//! # Dose Core Library
//!
//! This library provides the reminder engine behind the Dose medication
//! tracker: it turns a prescribed regimen into concrete dose occurrences,
//! persists them, and keeps platform reminders in step with what is stored.
//! The `dose-cli` binary is a thin layer over the same library.
//!
//! ## Architecture
//!
//! - **Medication**: Occurrence model and expansion of a definition into
//!   dated doses
//! - **Scheduler**: Confirmation with a notification cap, renewal of lifetime
//!   medications on delivery, and deletion of single or future doses
//! - **Storage**: SQLite-based occurrence storage and TOML-based configuration
//! - **Notify**: Dispatcher boundary plus a SQLite-backed alarm table
//!
//! ## Key Components
//!
//! - [`ReminderEngine`]: Facade used by hosts
//! - [`MedicationStore`]: Persistence boundary
//! - [`NotificationDispatcher`]: Reminder boundary
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod medication;
pub mod notify;
pub mod scheduler;
pub mod storage;

pub use error::{ConfigError, CoreError, DispatchError, RenewalError, StoreError, ValidationError};
pub use events::{EventBus, ReminderEvent};
pub use medication::{
    MedicationDefinition, MedicationOccurrence, MedicationType, OccurrenceId, Recurrence,
    SeriesKey, LIFETIME_RESCHEDULE_DAYS,
};
pub use notify::{AlarmTable, Notification, NotificationDispatcher};
pub use scheduler::{
    ConfirmReport, DeleteOutcome, DeletionResolver, ReminderEngine, RenewalHandler,
    SchedulingCoordinator,
};
pub use storage::{Config, InMemoryStore, MedicationStore, SqliteStore};
