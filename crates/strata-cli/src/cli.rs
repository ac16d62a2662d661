//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};
use strata_common_config::{ConfigLoader, DatabaseConfig};

use crate::commands::{CommandContext, HealthCommand, PingCommand, StatsCommand, ValidateCommand};
use crate::error::CliError;
use crate::output::OutputFormat;

/// Strata - primary/replica database checks
#[derive(Debug, Parser)]
#[command(
    name = "strata",
    author,
    version,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Increase verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "STRATA_CONFIG_PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "text", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load and validate the configuration
    Validate(ValidateCommand),

    /// Check that the primary answers
    Ping(PingCommand),

    /// Probe every data source
    Health(HealthCommand),

    /// Show pool statistics
    Stats(StatsCommand),
}

impl Cli {
    pub fn config_loader(&self) -> ConfigLoader {
        match &self.config {
            Some(path) => ConfigLoader::new(path),
            None => ConfigLoader::from_env(),
        }
    }

    /// Load configuration from file, applying environment overrides and validation
    pub fn load_config(&self) -> Result<DatabaseConfig, CliError> {
        Ok(self.config_loader().load()?)
    }

    /// Execute the selected command
    pub async fn execute(self) -> Result<(), CliError> {
        let loader = self.config_loader();
        let ctx = CommandContext {
            config: loader.load()?,
            config_path: loader.path().to_path_buf(),
            format: self.format,
        };

        match &self.command {
            Command::Validate(cmd) => cmd.execute(&ctx).await,
            Command::Ping(cmd) => cmd.execute(&ctx).await,
            Command::Health(cmd) => cmd.execute(&ctx).await,
            Command::Stats(cmd) => cmd.execute(&ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common_config::ConfigError;
    use strata_test_utils::SqliteFixture;

    fn write_config(fixture: &SqliteFixture, body: &str) -> PathBuf {
        let path = fixture.path().join("strata.yaml");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn context(path: PathBuf) -> CommandContext {
        CommandContext {
            config: ConfigLoader::new(&path).load().unwrap(),
            config_path: path,
            format: OutputFormat::Json,
        }
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from(["strata", "-vv", "--format", "json", "--config", "db.yaml", "health"]).unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("db.yaml")));
        assert!(matches!(cli.command, Command::Health(_)));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["strata", "-q", "-v", "stats"]).is_err());
    }

    #[test]
    fn test_ping_timeout_flag() {
        let cli = Cli::try_parse_from(["strata", "ping", "--timeout-ms", "250"]).unwrap();
        match cli.command {
            Command::Ping(cmd) => assert_eq!(cmd.timeout_ms, Some(250)),
            other => panic!("Expected ping, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_config_file() {
        let fixture = SqliteFixture::new();
        let missing = fixture.path().join("absent.yaml");
        let cli = Cli::try_parse_from(["strata", "--config", missing.to_str().unwrap(), "validate"]).unwrap();

        let err = cli.load_config().unwrap_err();
        assert!(matches!(err, CliError::Config(ConfigError::NotFound { .. })));
        assert_eq!(err.exit(), crate::error::Exit::ConfigError);
    }

    #[test]
    fn test_validate_summarizes_config() {
        let fixture = SqliteFixture::new();
        let body = format!(
            "master: {}\ntype: sqlite\nslaves:\n  - dsn: {}\n    weight: 2\n",
            fixture.dsn("primary"),
            fixture.dsn("replica")
        );
        let ctx = context(write_config(&fixture, &body));

        let report = ValidateCommand::default().run(&ctx);
        assert_eq!(report.engine, "sqlite");
        assert_eq!(report.replicas, 1);
        assert!(!report.monitoring);
    }

    #[tokio::test]
    async fn test_health_and_stats_cover_every_source() {
        let fixture = SqliteFixture::new();
        let body = format!(
            "primary: {}\ntype: sqlite\nreplicas:\n  - dsn: {}\n",
            fixture.dsn("primary"),
            fixture.dsn("replica")
        );
        let ctx = context(write_config(&fixture, &body));

        let health = HealthCommand { timeout_ms: Some(1000) }.run(&ctx).await.unwrap();
        assert_eq!(health.sources.len(), 2);
        assert!(health.unhealthy().is_empty());

        let stats = StatsCommand::default().run(&ctx).await.unwrap();
        let names: Vec<&String> = stats.sources.keys().collect();
        assert_eq!(names, vec!["primary", "replica_0"]);

        let ping = PingCommand::default().run(&ctx).await.unwrap();
        assert_eq!(ping.database, "primary");
    }
}
