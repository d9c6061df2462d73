use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned identifier. `0` means "not yet persisted".
pub type OccurrenceId = i64;

/// Days between a fired lifetime occurrence and its renewal.
pub const LIFETIME_RESCHEDULE_DAYS: i64 = 90;

/// Dosage form of a medication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MedicationType {
    Tablet,
    Capsule,
    Syrup,
    Drops,
    Spray,
    Gel,
    Injection,
    Other,
}

impl MedicationType {
    pub fn as_str(self) -> &'static str {
        match self {
            MedicationType::Tablet => "tablet",
            MedicationType::Capsule => "capsule",
            MedicationType::Syrup => "syrup",
            MedicationType::Drops => "drops",
            MedicationType::Spray => "spray",
            MedicationType::Gel => "gel",
            MedicationType::Injection => "injection",
            MedicationType::Other => "other",
        }
    }

    /// Parse from stored text; unknown values fall back to `Other`.
    pub fn parse(s: &str) -> Self {
        match s {
            "tablet" => MedicationType::Tablet,
            "capsule" => MedicationType::Capsule,
            "syrup" => MedicationType::Syrup,
            "drops" => MedicationType::Drops,
            "spray" => MedicationType::Spray,
            "gel" => MedicationType::Gel,
            "injection" => MedicationType::Injection,
            _ => MedicationType::Other,
        }
    }
}

/// One scheduled dose instance.
///
/// Occurrences are independent rows. Which ones belong to the same regimen is
/// decided by [`SeriesKey`], not by a parent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationOccurrence {
    #[serde(default)]
    pub id: OccurrenceId,
    pub name: String,
    pub dosage: u32,
    pub frequency: String,
    pub medication_type: MedicationType,
    pub start_date: DateTime<Utc>,
    /// `None` marks a lifetime medication.
    pub end_date: Option<DateTime<Utc>>,
    pub medication_time: DateTime<Utc>,
    #[serde(default)]
    pub taken: bool,
}

impl MedicationOccurrence {
    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }

    /// True for series with no fixed last occurrence.
    pub fn is_lifetime(&self) -> bool {
        self.end_date.is_none()
    }

    pub fn series_key(&self) -> SeriesKey {
        SeriesKey {
            name: self.name.clone(),
            dosage: self.dosage,
            frequency: self.frequency.clone(),
            start_date: self.start_date,
            medication_type: self.medication_type,
        }
    }

    /// The follow-on occurrence for a lifetime series, `days` after this one.
    ///
    /// Returns `None` for bounded series and when the new time would overflow.
    pub fn next_lifetime_occurrence(&self, days: i64) -> Option<MedicationOccurrence> {
        if !self.is_lifetime() {
            return None;
        }
        let medication_time = self
            .medication_time
            .checked_add_signed(Duration::try_days(days)?)?;
        Some(MedicationOccurrence {
            id: 0,
            name: self.name.clone(),
            dosage: self.dosage,
            frequency: self.frequency.clone(),
            medication_type: self.medication_type,
            start_date: self.start_date,
            end_date: None,
            medication_time,
            taken: false,
        })
    }
}

/// Attributes that identify a series.
///
/// Two distinct medications sharing all five attributes are indistinguishable
/// here and cascade together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub name: String,
    pub dosage: u32,
    pub frequency: String,
    pub start_date: DateTime<Utc>,
    pub medication_type: MedicationType,
}

impl SeriesKey {
    pub fn matches(&self, occurrence: &MedicationOccurrence) -> bool {
        self.name == occurrence.name
            && self.dosage == occurrence.dosage
            && self.frequency == occurrence.frequency
            && self.start_date == occurrence.start_date
            && self.medication_type == occurrence.medication_type
    }
}
