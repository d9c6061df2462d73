//! Scheduling, renewal and deletion of medication reminders.

pub mod coordinator;
pub mod deletion;
pub mod engine;
pub mod renewal;

#[cfg(test)]
mod testing;

pub use coordinator::{ConfirmReport, SchedulingCoordinator};
pub use deletion::{DeleteOutcome, DeletionResolver};
pub use engine::ReminderEngine;
pub use renewal::RenewalHandler;
