//! Configuration validation.
//!
//! Runs before any connection is opened; a configuration that passes here is
//! treated as immutable for the lifetime of a manager.

use crate::loader::ConfigError;
use crate::types::{DatabaseConfig, PoolShape};

impl DatabaseConfig {
    /// Reject malformed configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.primary.is_empty() {
            return Err(invalid("master database DSN cannot be empty"));
        }

        if self.engine.is_empty() {
            return Err(invalid("database type cannot be empty"));
        }

        self.pool.validate("pool")?;

        for (index, replica) in self.replicas.iter().enumerate() {
            if replica.dsn.is_empty() {
                return Err(invalid(format!("replica {index} DSN cannot be empty")));
            }
            replica.pool.validate(&format!("replicas[{index}].pool"))?;
        }

        if self.slow_query.enabled && self.slow_query.threshold.is_zero() {
            return Err(invalid("slow query threshold must be positive when enabled"));
        }

        if self.monitor.enabled {
            if self.monitor.health_check_interval.is_zero() {
                return Err(invalid(
                    "health check interval must be positive when monitoring is enabled",
                ));
            }
            if self.monitor.connection_timeout.is_zero() {
                return Err(invalid(
                    "connection timeout must be positive when monitoring is enabled",
                ));
            }
        }

        Ok(())
    }
}

impl PoolShape {
    /// Idle connections may not exceed the open cap when one is set.
    pub fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.max_open_conns > 0 && self.max_idle_conns > self.max_open_conns {
            return Err(invalid(format!(
                "{section}: max idle connections cannot be greater than max open connections"
            )));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        message: message.into(),
    }
}
