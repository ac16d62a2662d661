//! Strata CLI
//!
//! Main entry point for the `strata` binary.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use strata_cli::cli::Cli;
use strata_cli::error::{CliError, Exit};
use strata_common_config::Environment;
use strata_common_log::LogConfig;
use tracing::error;

fn main() -> ExitCode {
    // Load .env files first so clap's env fallbacks can see them.
    if let Err(e) = Environment::init() {
        eprintln!("{e}");
        return Exit::ConfigError.into();
    }

    let cli = Cli::parse();

    let log_config = LogConfig::from_env().with_verbosity(cli.verbose, cli.quiet);
    if let Err(e) = strata_common_log::init(log_config) {
        eprintln!("{e}");
        return Exit::GeneralError.into();
    }

    match run(cli) {
        Ok(()) => Exit::Success.into(),
        Err(e) => {
            error!("{e}");
            e.exit_code()
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create Tokio runtime")?;

    runtime.block_on(cli.execute())
}
