pub mod config;
pub mod medication;
pub mod notify;

use std::future::Future;
use std::sync::Arc;

use dose_core::{AlarmTable, Config, ReminderEngine, SqliteStore};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Run an async command on a fresh multi-threaded runtime.
pub fn block_on<F>(command: F) -> CliResult
where
    F: Future<Output = CliResult>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(command)
}

/// Engine over the configured database, with the alarm table as dispatcher.
pub struct Session {
    pub engine: ReminderEngine,
    pub alarms: Arc<AlarmTable>,
}

impl Session {
    pub fn open(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let store = SqliteStore::open(config)?;
        let alarms = Arc::new(AlarmTable::new(&store));
        let engine = ReminderEngine::new(
            Arc::new(store),
            alarms.clone(),
            &config.engine,
            tokio::runtime::Handle::current(),
        );
        Ok(Self { engine, alarms })
    }
}
