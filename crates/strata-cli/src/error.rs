//! CLI error handling.

use std::process::ExitCode;

use strata_common_config::{ConfigError, EnvError};
use strata_database::DatabaseError;
use thiserror::Error;

/// Application exit codes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Success = 0,
    GeneralError = 1,
    ConfigError = 2,
    ConnectionError = 4,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("environment error: {0}")]
    Env(#[from] EnvError),

    #[error("{0}")]
    Database(#[from] DatabaseError),

    #[error("unhealthy data sources: {}", .names.join(", "))]
    Unhealthy { names: Vec<String> },

    #[error("failed to render output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn exit(&self) -> Exit {
        match self {
            Self::Config(_) | Self::Env(_) => Exit::ConfigError,
            Self::Database(DatabaseError::Config(_)) => Exit::ConfigError,
            Self::Database(DatabaseError::Connection(_) | DatabaseError::Pool(_)) => Exit::ConnectionError,
            Self::Unhealthy { .. } => Exit::ConnectionError,
            Self::Database(_) | Self::Output(_) | Self::Other(_) => Exit::GeneralError,
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        self.exit().into()
    }
}
