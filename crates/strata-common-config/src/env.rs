//! Environment variable handling.

use crate::types::DatabaseConfig;
use std::env;
use thiserror::Error;

/// Environment variable errors.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("required environment variable not set: {var}")]
    NotSet { var: String },

    #[error("invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("failed to load .env file: {0}")]
    DotenvError(#[from] dotenvy::Error),
}

/// Environment variable names.
pub mod vars {
    // Configuration
    pub const STRATA_CONFIG_PATH: &str = "STRATA_CONFIG_PATH";
    pub const STRATA_ENV: &str = "STRATA_ENV";

    // Database overrides
    pub const STRATA_DATABASE_PRIMARY: &str = "STRATA_DATABASE_PRIMARY";
    pub const STRATA_DATABASE_ENGINE: &str = "STRATA_DATABASE_ENGINE";
    pub const STRATA_DATABASE_MAX_OPEN: &str = "STRATA_DATABASE_MAX_OPEN";
    pub const STRATA_DATABASE_MAX_IDLE: &str = "STRATA_DATABASE_MAX_IDLE";
    pub const STRATA_DATABASE_MONITOR: &str = "STRATA_DATABASE_MONITOR";
}

/// Environment configuration.
pub struct Environment {
    _guard: (), // Prevent construction outside module
}

impl Environment {
    /// Initialize environment from .env files.
    pub fn init() -> Result<Self, EnvError> {
        // Load .env files in order (later overrides earlier)
        let _ = dotenvy::from_filename(".env");
        let _ = dotenvy::from_filename(".env.local");

        if let Ok(env) = env::var(vars::STRATA_ENV) {
            let _ = dotenvy::from_filename(format!(".env.{}", env));
        }

        Ok(Self { _guard: () })
    }

    /// Get a required string variable.
    pub fn require(var: &str) -> Result<String, EnvError> {
        env::var(var).map_err(|_| EnvError::NotSet { var: var.to_string() })
    }

    /// Get an optional string variable.
    pub fn get(var: &str) -> Option<String> {
        env::var(var).ok()
    }

    /// Get a variable with a default value.
    pub fn get_or(var: &str, default: &str) -> String {
        env::var(var).unwrap_or_else(|_| default.to_string())
    }

    /// Get a boolean variable.
    pub fn get_bool(var: &str) -> Option<bool> {
        env::var(var).ok().map(|v| parse_bool(&v))
    }

    /// Get an integer variable.
    pub fn get_int<T: std::str::FromStr>(var: &str) -> Result<Option<T>, EnvError> {
        parse_int(var, env::var(var).ok())
    }
}

/// Apply `STRATA_DATABASE_*` overrides from the process environment.
pub fn apply_env_overrides(config: &mut DatabaseConfig) -> Result<(), EnvError> {
    apply_overrides_with(config, |var| env::var(var).ok())
}

/// Apply overrides using `lookup` to resolve variable values.
pub fn apply_overrides_with<F>(config: &mut DatabaseConfig, lookup: F) -> Result<(), EnvError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(primary) = lookup(vars::STRATA_DATABASE_PRIMARY) {
        config.primary = primary;
    }

    if let Some(engine) = lookup(vars::STRATA_DATABASE_ENGINE) {
        config.engine = engine;
    }

    if let Some(max_open) = parse_int(vars::STRATA_DATABASE_MAX_OPEN, lookup(vars::STRATA_DATABASE_MAX_OPEN))? {
        config.pool.max_open_conns = max_open;
    }

    if let Some(max_idle) = parse_int(vars::STRATA_DATABASE_MAX_IDLE, lookup(vars::STRATA_DATABASE_MAX_IDLE))? {
        config.pool.max_idle_conns = max_idle;
    }

    if let Some(monitor) = lookup(vars::STRATA_DATABASE_MONITOR) {
        config.monitor.enabled = parse_bool(&monitor);
    }

    Ok(())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_int<T: std::str::FromStr>(var: &str, value: Option<String>) -> Result<Option<T>, EnvError> {
    match value {
        Some(v) => v.parse().map(Some).map_err(|_| EnvError::InvalidValue {
            var: var.to_string(),
            message: "expected non-negative integer".to_string(),
        }),
        None => Ok(None),
    }
}
