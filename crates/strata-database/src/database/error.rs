use std::time::Duration;
use strata_common_config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("unsupported database type: {0}")]
    UnsupportedEngine(String),

    #[error("invalid DSN for {name} database: {source}")]
    InvalidDsn {
        name: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to connect to {name} database: {source}")]
    Open {
        name: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("{name} database unreachable: {source}")]
    Unreachable {
        name: String,
        #[source]
        source: HealthCheckError,
    },

    #[error("database manager is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("{name} database has no live connection pool")]
    Unavailable { name: String },
}

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("failed to begin transaction: {0}")]
    Begin(#[source] sqlx::Error),

    #[error("failed to commit transaction: {0}")]
    Commit(#[source] sqlx::Error),
}

/// Failure of a single probe. Stored in `HealthStatus::error_message`, never returned by health checks.
#[derive(Debug, Error)]
pub enum HealthCheckError {
    #[error("health check timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to acquire connection: {0}")]
    Acquire(#[source] sqlx::Error),

    #[error("ping failed: {0}")]
    Ping(#[source] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("failed to configure connection pool: {0}")]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
}
