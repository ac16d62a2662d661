//! Validate command implementation.

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;

use super::CommandContext;
use crate::error::CliError;
use crate::output::Report;

/// Check that the configuration file loads and validates
#[derive(Debug, Default, Parser)]
pub struct ValidateCommand {}

#[derive(Debug, Serialize)]
pub struct ValidateReport {
    pub path: PathBuf,
    pub engine: String,
    pub replicas: usize,
    pub monitoring: bool,
    pub slow_query_detection: bool,
}

impl ValidateCommand {
    /// The loader already validated the config; this only summarizes it.
    pub fn run(&self, ctx: &CommandContext) -> ValidateReport {
        ValidateReport {
            path: ctx.config_path.clone(),
            engine: ctx.config.engine.clone(),
            replicas: ctx.config.replicas.len(),
            monitoring: ctx.config.monitor.enabled,
            slow_query_detection: ctx.config.slow_query.enabled,
        }
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        ctx.print(&self.run(ctx))
    }
}

impl Report for ValidateReport {
    fn render_text(&self) -> String {
        let on_off = |enabled: bool| if enabled { "on" } else { "off" };
        format!(
            "{} is valid\n  engine: {}\n  replicas: {}\n  monitoring: {}\n  slow query detection: {}",
            self.path.display(),
            self.engine,
            self.replicas,
            on_off(self.monitoring),
            on_off(self.slow_query_detection),
        )
    }
}
