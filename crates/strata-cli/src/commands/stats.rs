//! Stats command implementation.

use std::collections::BTreeMap;

use clap::Parser;
use serde::Serialize;
use strata_database::PoolStats;

use super::CommandContext;
use crate::error::CliError;
use crate::output::{table, Report};

/// Show connection pool statistics for every data source
#[derive(Debug, Default, Parser)]
pub struct StatsCommand {}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct StatsReport {
    pub sources: BTreeMap<String, PoolStats>,
}

impl StatsCommand {
    pub async fn run(&self, ctx: &CommandContext) -> Result<StatsReport, CliError> {
        let manager = ctx.connect().await?;
        let stats = manager.stats().await;
        manager.close().await?;

        Ok(StatsReport {
            sources: stats.into_iter().collect(),
        })
    }

    pub async fn execute(&self, ctx: &CommandContext) -> Result<(), CliError> {
        ctx.print(&self.run(ctx).await?)
    }
}

impl Report for StatsReport {
    fn render_text(&self) -> String {
        let rows: Vec<Vec<String>> = self
            .sources
            .iter()
            .map(|(name, s)| {
                vec![
                    name.clone(),
                    s.open_connections.to_string(),
                    s.in_use.to_string(),
                    s.idle.to_string(),
                    s.max_open_connections.to_string(),
                    s.wait_count.to_string(),
                    format!("{:?}", s.wait_duration),
                ]
            })
            .collect();

        table(&["SOURCE", "OPEN", "IN USE", "IDLE", "MAX", "WAITS", "WAITED"], &rows)
    }
}
