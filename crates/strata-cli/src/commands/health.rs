//! Health command implementation.

use std::collections::BTreeMap;

use clap::Parser;
use serde::Serialize;
use strata_database::HealthStatus;

use super::CommandContext;
use crate::error::CliError;
use crate::output::{table, Report};

/// Probe the primary and every replica
#[derive(Debug, Default, Parser)]
pub struct HealthCommand {
    /// Per-source deadline in milliseconds (defaults to the configured connection timeout)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct HealthReport {
    pub sources: BTreeMap<String, HealthStatus>,
}

impl HealthReport {
    pub fn unhealthy(&self) -> Vec<String> {
        self.sources
            .iter()
            .filter(|(_, status)| !status.is_healthy)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl HealthCommand {
    pub async fn run(&self, ctx: &CommandContext) -> Result<HealthReport, CliError> {
        let manager = ctx.connect().await?;
        let snapshot = manager.check_health(ctx.timeout(self.timeout_ms)).await;
        manager.close().await?;

        Ok(HealthReport {
            sources: snapshot.into_iter().collect(),
        })
    }

    /// Prints the report, then fails when any source is unhealthy.
    pub async fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        let report = self.run(ctx).await?;
        ctx.print(&report)?;

        let names = report.unhealthy();
        if names.is_empty() {
            Ok(())
        } else {
            Err(CliError::Unhealthy { names })
        }
    }
}

impl Report for HealthReport {
    fn render_text(&self) -> String {
        let rows: Vec<Vec<String>> = self
            .sources
            .iter()
            .map(|(name, status)| {
                vec![
                    name.clone(),
                    if status.is_healthy { "healthy" } else { "unhealthy" }.to_string(),
                    format!("{:.2} ms", status.response_time.as_secs_f64() * 1000.0),
                    status.error_message.clone().unwrap_or_default(),
                ]
            })
            .collect();

        table(&["SOURCE", "STATUS", "RESPONSE", "ERROR"], &rows)
    }
}
