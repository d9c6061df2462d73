//! Reminder delivery commands for CLI.
//!
//! Without a platform alarm service the CLI is the delivery loop: run
//! `notify deliver` periodically (cron, systemd timer) to fire due reminders.

use chrono::Utc;
use clap::Subcommand;
use dose_core::{Config, Notification};

use super::medication::parse_instant;
use super::{CliResult, Session};

#[derive(Subcommand)]
pub enum NotifyAction {
    /// Fire every reminder that is due, renewing lifetime medications
    Deliver {
        /// Deliver as of this instant instead of now (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        at: Option<String>,
    },
    /// List pending reminders as JSON
    Pending,
}

pub async fn run(action: NotifyAction, config: Config) -> CliResult {
    let session = Session::open(&config)?;

    match action {
        NotifyAction::Deliver { at } => {
            let now = match at {
                Some(s) => parse_instant(&s)?,
                None => Utc::now(),
            };
            let due = session.alarms.take_due(now).await?;
            tracing::debug!(count = due.len(), "delivering due reminders");

            let mut renewals = Vec::new();
            for occurrence in due {
                let notification = Notification::for_occurrence(&occurrence)?;
                println!(
                    "[{}] {}: {} ({})",
                    notification.fire_at.format("%Y-%m-%d %H:%M"),
                    notification.title,
                    notification.body,
                    notification.deep_link
                );
                if let Some(task) = session.engine.on_notification_delivered(occurrence) {
                    renewals.push(task);
                }
            }
            // Renewal tasks die with the runtime; wait for them before exiting.
            for task in renewals {
                task.await?;
            }
        }
        NotifyAction::Pending => {
            let pending = session.alarms.pending().await?;
            println!("{}", serde_json::to_string_pretty(&pending)?);
        }
    }
    Ok(())
}
