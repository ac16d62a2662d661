//! Command implementations.

mod health;
mod ping;
mod stats;
mod validate;

pub use health::{HealthCommand, HealthReport};
pub use ping::{PingCommand, PingReport};
pub use stats::{StatsCommand, StatsReport};
pub use validate::{ValidateCommand, ValidateReport};

use std::path::PathBuf;
use std::time::Duration;

use strata_common_config::DatabaseConfig;
use strata_database::DbManager;

use crate::error::CliError;
use crate::output::{OutputFormat, Report};

/// State shared by every command.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config_path: PathBuf,
    pub config: DatabaseConfig,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Open a manager for a one-shot command. Background monitoring stays off.
    pub async fn connect(&self) -> Result<DbManager, CliError> {
        let mut config = self.config.clone();
        config.monitor.enabled = false;
        Ok(DbManager::new(config, None).await?)
    }

    /// Probe deadline: the explicit flag, else the configured connection timeout.
    pub fn timeout(&self, timeout_ms: Option<u64>) -> Duration {
        timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.config.monitor.connection_timeout)
    }

    pub fn print(&self, report: &impl Report) -> Result<(), CliError> {
        println!("{}", report.render(self.format)?);
        Ok(())
    }
}
