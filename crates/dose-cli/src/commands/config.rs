//! `config` subcommands: inspect and edit `<data_dir>/config.toml`.

use clap::Subcommand;
use dose_core::{Config, ConfigError};

use super::CliResult;

/// Environment variable that replaces `logging.filter` at startup.
const LOG_ENV: &str = "RUST_LOG";

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one value
    Get {
        /// Dot-separated key (e.g. "engine.lifetime_reschedule_days")
        key: String,
    },
    /// Validate and store a value
    Set {
        /// Dot-separated key
        key: String,
        /// New value
        value: String,
    },
    /// Print the whole config as JSON
    List,
    /// Restore defaults, for one key or the whole file
    Reset {
        /// Only reset this key
        key: Option<String>,
    },
    /// Print the config file location
    Path,
}

pub fn run(action: ConfigAction) -> CliResult {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key).ok_or(ConfigError::UnknownKey(key))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            tracing::debug!(%key, %value, "config updated");
            println!("{key} = {}", config.get(&key).unwrap_or(value));
            if key == "logging.filter" {
                warn_log_override();
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            warn_log_override();
        }
        ConfigAction::Reset { key: Some(key) } => {
            let mut config = Config::load()?;
            let value = config.reset_key(&key)?;
            config.save()?;
            println!("{key} = {value}");
        }
        ConfigAction::Reset { key: None } => {
            Config::default().save()?;
            println!("config reset to defaults");
        }
        ConfigAction::Path => {
            println!("{}", Config::path()?.display());
        }
    }
    Ok(())
}

/// Stdout stays machine-readable; the note goes to stderr.
fn warn_log_override() {
    if let Some(filter) = log_override() {
        eprintln!("note: logging.filter is overridden by {LOG_ENV}={filter}");
    }
}

fn log_override() -> Option<String> {
    std::env::var(LOG_ENV).ok().filter(|v| !v.trim().is_empty())
}
