//! Configuration types.

use crate::duration::millis;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root database configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Primary (write) data source DSN.
    #[serde(alias = "master")]
    pub primary: String,
    /// Engine type of the primary (`sqlite`, `postgres`, `mysql`).
    #[serde(rename = "type")]
    pub engine: String,
    /// Read replicas, in selection order.
    #[serde(alias = "slaves")]
    pub replicas: Vec<ReplicaConfig>,
    /// Global pool shape.
    #[serde(alias = "pool_config")]
    pub pool: PoolShape,
    /// Query logging options.
    #[serde(alias = "log_config")]
    pub log: LogOptions,
    /// Slow query detection options.
    #[serde(alias = "slow_query_config")]
    pub slow_query: SlowQueryOptions,
    /// Health monitoring options.
    #[serde(alias = "monitor_config")]
    pub monitor: MonitorOptions,
}

impl DatabaseConfig {
    pub fn new(primary: impl Into<String>, engine: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            engine: engine.into(),
            ..Default::default()
        }
    }

    pub fn with_replica(mut self, replica: ReplicaConfig) -> Self {
        self.replicas.push(replica);
        self
    }

    pub fn with_pool(mut self, pool: PoolShape) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_log(mut self, log: LogOptions) -> Self {
        self.log = log;
        self
    }

    pub fn with_slow_query(mut self, slow_query: SlowQueryOptions) -> Self {
        self.slow_query = slow_query;
        self
    }

    pub fn with_monitor(mut self, monitor: MonitorOptions) -> Self {
        self.monitor = monitor;
        self
    }

    /// Engine a replica connects with; an empty replica engine inherits the primary's.
    pub fn replica_engine<'a>(&'a self, replica: &'a ReplicaConfig) -> &'a str {
        if replica.engine.is_empty() {
            &self.engine
        } else {
            &replica.engine
        }
    }

    /// Pool shape a replica is opened with; an unset replica shape falls back to the global one.
    pub fn replica_pool(&self, replica: &ReplicaConfig) -> PoolShape {
        if replica.pool.is_unset() {
            self.pool
        } else {
            replica.pool
        }
    }
}

/// Read replica configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReplicaConfig {
    pub dsn: String,
    /// Engine type; empty inherits the primary's.
    #[serde(rename = "type")]
    pub engine: String,
    /// Relative selection weight. Zero is never selected.
    pub weight: u32,
    #[serde(alias = "pool_config")]
    pub pool: PoolShape,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            dsn: String::new(),
            engine: String::new(),
            weight: 1,
            pool: PoolShape::default(),
        }
    }
}

impl ReplicaConfig {
    pub fn new(dsn: impl Into<String>, weight: u32) -> Self {
        Self {
            dsn: dsn.into(),
            weight,
            ..Default::default()
        }
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    pub fn with_pool(mut self, pool: PoolShape) -> Self {
        self.pool = pool;
        self
    }
}

/// Connection pool limits. Zero fields keep the driver default.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PoolShape {
    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    #[serde(rename = "conn_max_lifetime_ms", with = "millis")]
    pub conn_max_lifetime: Duration,
    #[serde(rename = "conn_max_idle_time_ms", with = "millis")]
    pub conn_max_idle_time: Duration,
}

impl PoolShape {
    /// True when every limit is left at the driver default.
    pub fn is_unset(&self) -> bool {
        *self == Self::default()
    }
}

/// Query logging options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogOptions {
    pub enabled: bool,
    /// One of `silent`, `error`, `warn`, `info`.
    pub level: String,
    pub colorful: bool,
    pub ignore_record_not_found_error: bool,
    /// Log statement text only, never bound parameter values.
    pub parameterized_queries: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "warn".to_string(),
            colorful: false,
            ignore_record_not_found_error: true,
            parameterized_queries: true,
        }
    }
}

/// Slow query detection options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SlowQueryOptions {
    pub enabled: bool,
    #[serde(rename = "threshold_ms", with = "millis")]
    pub threshold: Duration,
    /// Include statement text in slow query records.
    pub log_params: bool,
}

impl Default for SlowQueryOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: Duration::from_millis(200),
            log_params: false,
        }
    }
}

/// Background health monitoring options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorOptions {
    pub enabled: bool,
    #[serde(rename = "health_check_interval_ms", with = "millis")]
    pub health_check_interval: Duration,
    /// Deadline applied to each probe.
    #[serde(rename = "connection_timeout_ms", with = "millis")]
    pub connection_timeout: Duration,
    pub max_retries: u32,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            health_check_interval: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }
}
