//! Ping command implementation.

use std::time::Instant;

use clap::Parser;
use serde::Serialize;

use super::CommandContext;
use crate::error::CliError;
use crate::output::Report;

/// Check that the primary answers
#[derive(Debug, Default, Parser)]
pub struct PingCommand {
    /// Deadline in milliseconds (defaults to the configured connection timeout)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct PingReport {
    pub database: String,
    pub elapsed_ms: f64,
}

impl PingCommand {
    pub async fn run(&self, ctx: &CommandContext) -> Result<PingReport, CliError> {
        let manager = ctx.connect().await?;

        let start = Instant::now();
        let result = manager.ping(ctx.timeout(self.timeout_ms)).await;
        let elapsed = start.elapsed();
        manager.close().await?;
        result?;

        Ok(PingReport {
            database: "primary".to_string(),
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        })
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        ctx.print(&self.run(ctx).await?)
    }
}

impl Report for PingReport {
    fn render_text(&self) -> String {
        format!("{} is reachable ({:.2} ms)", self.database, self.elapsed_ms)
    }
}
