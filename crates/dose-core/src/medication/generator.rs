//! Expansion of a medication definition into concrete dose occurrences.
//!
//! Expansion is a pure function of the definition: identical inputs give
//! identical output, ordered by `medication_time`.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use super::occurrence::{MedicationOccurrence, MedicationType, LIFETIME_RESCHEDULE_DAYS};
use crate::error::ValidationError;

/// Which calendar days carry doses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recurrence {
    Daily,
    EveryNDays { interval: u32 },
    Weekly { days: Vec<Weekday> },
}

impl Recurrence {
    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Recurrence::Daily => Ok(()),
            Recurrence::EveryNDays { interval: 0 } => Err(ValidationError::InvalidValue {
                field: "recurrence.interval".into(),
                message: "must be at least 1".into(),
            }),
            Recurrence::EveryNDays { .. } => Ok(()),
            Recurrence::Weekly { days } if days.is_empty() => Err(
                ValidationError::EmptyCollection("recurrence.days".into()),
            ),
            Recurrence::Weekly { .. } => Ok(()),
        }
    }

    /// Whether `date` carries doses, counting from `first`.
    fn includes(&self, first: NaiveDate, date: NaiveDate) -> bool {
        match self {
            Recurrence::Daily => true,
            Recurrence::EveryNDays { interval } => {
                (date - first).num_days() % i64::from(*interval) == 0
            }
            Recurrence::Weekly { days } => days.contains(&date.weekday()),
        }
    }
}

/// A prescribed regimen as entered by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationDefinition {
    pub name: String,
    pub dosage: u32,
    pub frequency: String,
    pub medication_type: MedicationType,
    pub start_date: DateTime<Utc>,
    /// `None` for lifetime medications.
    pub end_date: Option<DateTime<Utc>>,
    pub recurrence: Recurrence,
    /// Dose times within a day, interpreted in UTC.
    pub times_of_day: Vec<NaiveTime>,
}

impl MedicationDefinition {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "name".into(),
                message: "must not be blank".into(),
            });
        }
        if self.dosage == 0 {
            return Err(ValidationError::InvalidValue {
                field: "dosage".into(),
                message: "must be positive".into(),
            });
        }
        if self.times_of_day.is_empty() {
            return Err(ValidationError::EmptyCollection("times_of_day".into()));
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(ValidationError::InvalidDateRange {
                    start: self.start_date,
                    end,
                });
            }
        }
        self.recurrence.validate()
    }

    /// Expand with the default lifetime horizon of [`LIFETIME_RESCHEDULE_DAYS`].
    ///
    /// # Errors
    /// Returns a [`ValidationError`] for malformed definitions.
    pub fn expand(&self) -> Result<Vec<MedicationOccurrence>, ValidationError> {
        self.expand_with_horizon(LIFETIME_RESCHEDULE_DAYS)
    }

    /// Expand into occurrences, all with `id = 0`.
    ///
    /// Bounded definitions cover every selected date from the start date to the
    /// end date inclusive. Lifetime definitions cover the first `horizon_days`
    /// days, which must equal the renewal interval: each renewal then lands on
    /// the first day past the batch.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] for malformed definitions or a
    /// non-positive horizon.
    pub fn expand_with_horizon(
        &self,
        horizon_days: i64,
    ) -> Result<Vec<MedicationOccurrence>, ValidationError> {
        self.validate()?;
        if horizon_days <= 0 {
            return Err(ValidationError::InvalidValue {
                field: "horizon_days".into(),
                message: "must be positive".into(),
            });
        }

        let mut times = self.times_of_day.clone();
        times.sort();
        times.dedup();

        let first = self.start_date.date_naive();
        let last = match self.end_date {
            Some(end) => end.date_naive(),
            None => Duration::try_days(horizon_days - 1)
                .and_then(|span| first.checked_add_signed(span))
                .ok_or_else(|| ValidationError::InvalidValue {
                    field: "horizon_days".into(),
                    message: "out of range".into(),
                })?,
        };

        let mut occurrences = Vec::new();
        for date in first.iter_days().take_while(|d| *d <= last) {
            if !self.recurrence.includes(first, date) {
                continue;
            }
            for time in &times {
                occurrences.push(MedicationOccurrence {
                    id: 0,
                    name: self.name.clone(),
                    dosage: self.dosage,
                    frequency: self.frequency.clone(),
                    medication_type: self.medication_type,
                    start_date: self.start_date,
                    end_date: self.end_date,
                    medication_time: date.and_time(*time).and_utc(),
                    taken: false,
                });
            }
        }
        Ok(occurrences)
    }
}
