//! Medication management commands for CLI.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use clap::Subcommand;
use dose_core::{
    Config, DeleteOutcome, MedicationDefinition, MedicationOccurrence, MedicationType,
    OccurrenceId, Recurrence,
};

use super::{CliResult, Session};

#[derive(Subcommand)]
pub enum MedAction {
    /// Add a medication and schedule its reminders
    Add {
        /// Medication name
        name: String,
        /// Dosage amount
        #[arg(long)]
        dosage: u32,
        /// Free-form frequency label (default: daily)
        #[arg(long, default_value = "daily")]
        frequency: String,
        /// Medication type: tablet, capsule, syrup, drops, spray, gel, injection, other
        #[arg(long = "type", default_value = "tablet")]
        medication_type: String,
        /// First day, YYYY-MM-DD or RFC 3339 (default: today)
        #[arg(long)]
        start: Option<String>,
        /// Last day, YYYY-MM-DD or RFC 3339; omit for a lifetime medication
        #[arg(long)]
        end: Option<String>,
        /// Comma-separated dose times in UTC, e.g. "08:00,20:00"
        #[arg(long, default_value = "08:00")]
        times: String,
        /// Take every N days
        #[arg(long, conflicts_with = "weekdays")]
        every: Option<u32>,
        /// Comma-separated weekdays, e.g. "mon,thu"
        #[arg(long)]
        weekdays: Option<String>,
    },
    /// List stored occurrences as JSON
    List {
        /// Only occurrences not yet taken
        #[arg(long)]
        pending: bool,
    },
    /// Mark an occurrence as taken
    Take {
        /// Occurrence ID
        id: OccurrenceId,
        /// Clear the taken flag instead
        #[arg(long)]
        undo: bool,
    },
    /// Delete an occurrence (past) or the rest of its series (upcoming)
    Delete {
        /// Occurrence ID
        id: OccurrenceId,
    },
    /// Delete every upcoming occurrence of an occurrence's series
    DeleteFuture {
        /// Occurrence ID
        id: OccurrenceId,
    },
}

pub async fn run(action: MedAction, config: Config) -> CliResult {
    let session = Session::open(&config)?;
    let engine = &session.engine;

    match action {
        MedAction::Add {
            name,
            dosage,
            frequency,
            medication_type,
            start,
            end,
            times,
            every,
            weekdays,
        } => {
            let start_date = match start {
                Some(s) => parse_instant(&s)?,
                None => Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc(),
            };
            let end_date = end.as_deref().map(parse_instant).transpose()?;
            let recurrence = match (every, weekdays) {
                (_, Some(days)) => Recurrence::Weekly {
                    days: parse_weekdays(&days)?,
                },
                (Some(interval), None) => Recurrence::EveryNDays { interval },
                (None, None) => Recurrence::Daily,
            };
            let definition = MedicationDefinition {
                name,
                dosage,
                frequency,
                medication_type: MedicationType::parse(&medication_type),
                start_date,
                end_date,
                recurrence,
                times_of_day: parse_times(&times)?,
            };

            let report = engine.confirm_definition(&definition).await?;
            println!(
                "Medication saved: {} ({} occurrences, {} reminders scheduled)",
                definition.name,
                report.persisted.len(),
                report.scheduled
            );
            if report.unscheduled > 0 {
                println!("  {} occurrences beyond the reminder cap", report.unscheduled);
            }
            if report.dispatch_failures > 0 {
                println!("  {} reminders failed to schedule", report.dispatch_failures);
            }
        }
        MedAction::List { pending } => {
            let occurrences: Vec<MedicationOccurrence> = engine
                .occurrences()
                .await?
                .into_iter()
                .filter(|o| !pending || !o.taken)
                .collect();
            println!("{}", serde_json::to_string_pretty(&occurrences)?);
        }
        MedAction::Take { id, undo } => {
            engine.mark_taken(id, !undo).await?;
            println!("Occurrence {id} marked {}", if undo { "not taken" } else { "taken" });
        }
        MedAction::Delete { id } => {
            let occurrence = lookup(engine, id).await?;
            match engine.delete_medication(&occurrence).await? {
                DeleteOutcome::Single { id } => println!("Deleted occurrence {id}"),
                DeleteOutcome::Future { removed } => {
                    println!("Deleted {removed} upcoming occurrences of {}", occurrence.name)
                }
            }
        }
        MedAction::DeleteFuture { id } => {
            let occurrence = lookup(engine, id).await?;
            let removed = engine.delete_future_medication_doses(&occurrence).await?;
            println!("Deleted {removed} upcoming occurrences of {}", occurrence.name);
        }
    }
    Ok(())
}

async fn lookup(
    engine: &dose_core::ReminderEngine,
    id: OccurrenceId,
) -> Result<MedicationOccurrence, Box<dyn std::error::Error>> {
    engine
        .occurrence(id)
        .await?
        .ok_or_else(|| format!("occurrence not found: {id}").into())
}

/// Accepts a bare date (midnight UTC) or a full RFC 3339 instant.
pub(crate) fn parse_instant(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid date '{s}': {e}"))
}

fn parse_times(s: &str) -> Result<Vec<NaiveTime>, String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            NaiveTime::parse_from_str(t, "%H:%M").map_err(|e| format!("invalid time '{t}': {e}"))
        })
        .collect()
}

fn parse_weekdays(s: &str) -> Result<Vec<Weekday>, String> {
    s.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| {
            d.parse::<Weekday>()
                .map_err(|_| format!("invalid weekday '{d}'"))
        })
        .collect()
}
