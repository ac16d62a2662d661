use super::error::HealthCheckError;
use super::logger::Logger;
use super::manager::Shared;
use super::pool::DbHandle;
use super::router::ConnectionRouter;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Serialize, Serializer};
use sqlx::Connection;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strata_common_config::MonitorOptions;
use strata_common_log::spans::{datasource_span, health_check_span};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn, Instrument};

/// Result of the most recent probe of one data source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub is_healthy: bool,
    pub last_check_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(rename = "response_time_ms", serialize_with = "fractional_millis")]
    pub response_time: Duration,
}

fn fractional_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64() * 1000.0)
}

impl HealthStatus {
    fn healthy(last_check_time: DateTime<Utc>, response_time: Duration) -> Self {
        Self {
            is_healthy: true,
            last_check_time,
            error_message: None,
            response_time,
        }
    }

    fn unhealthy(last_check_time: DateTime<Utc>, response_time: Duration, error: &HealthCheckError) -> Self {
        Self {
            is_healthy: false,
            last_check_time,
            error_message: Some(error.to_string()),
            response_time,
        }
    }
}

/// Acquire a connection and ping it, all within `timeout`.
pub(crate) async fn ping_within(handle: &DbHandle, timeout: Duration) -> Result<(), HealthCheckError> {
    let check = async {
        let mut conn = handle.acquire().await.map_err(HealthCheckError::Acquire)?;
        conn.ping().await.map_err(HealthCheckError::Ping)
    };

    tokio::time::timeout(timeout, check)
        .await
        .map_err(|_| HealthCheckError::Timeout(timeout))?
}

/// Probe one data source. Failures are reported in the status, never returned.
pub async fn probe(handle: &DbHandle, timeout: Duration) -> HealthStatus {
    let last_check_time = Utc::now();
    let start = Instant::now();
    let result = ping_within(handle, timeout)
        .instrument(datasource_span(handle.name(), "ping"))
        .await;
    let response_time = start.elapsed();

    match result {
        Ok(()) => HealthStatus::healthy(last_check_time, response_time),
        Err(e) => {
            debug!(name = handle.name(), error = %e, "Health probe failed");
            HealthStatus::unhealthy(last_check_time, response_time, &e)
        }
    }
}

/// Probe every data source concurrently, keyed by data source name.
pub async fn check_all(router: &ConnectionRouter, timeout: Duration) -> HashMap<String, HealthStatus> {
    let probes = router
        .data_sources()
        .map(|handle| async move { (handle.name().to_string(), probe(handle, timeout).await) });

    let sources = router.replicas().len() + 1;
    join_all(probes)
        .instrument(health_check_span(sources))
        .await
        .into_iter()
        .collect()
}

/// Warn once per unhealthy data source.
pub(crate) fn report_unhealthy(logger: &dyn Logger, snapshot: &HashMap<String, HealthStatus>) {
    let mut names: Vec<&String> = snapshot
        .iter()
        .filter(|(_, status)| !status.is_healthy)
        .map(|(name, _)| name)
        .collect();
    names.sort();

    for name in names {
        let error = snapshot[name].error_message.as_deref().unwrap_or("unknown error");
        logger.warn(
            "database health check failed",
            &[("database", &name.as_str()), ("error", &error)],
        );
    }
}

/// Periodic health checker owned by a manager.
#[derive(Debug, Clone, Copy)]
pub struct HealthMonitor {
    interval: Duration,
    timeout: Duration,
}

impl HealthMonitor {
    pub fn new(options: &MonitorOptions) -> Self {
        Self {
            interval: options.health_check_interval,
            timeout: options.connection_timeout,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run checks every interval until told to stop. The first check happens
    /// one interval after start. A stop signal abandons any check in flight.
    pub(crate) fn spawn(self, shared: Arc<Shared>) -> MonitorTask {
        let (shutdown, mut stop) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        // A hung probe must not hold up shutdown.
                        tokio::select! {
                            snapshot = shared.check_health(self.timeout) => {
                                report_unhealthy(shared.logger().as_ref(), &snapshot);
                            }
                            changed = stop.changed() => {
                                if changed.is_err() || *stop.borrow() {
                                    break;
                                }
                            }
                        }
                    }
                }
            }

            debug!("Health monitor stopped");
        });

        MonitorTask { shutdown, handle }
    }
}

/// Running monitor task and its stop signal.
pub(crate) struct MonitorTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl MonitorTask {
    /// Signal the task and wait for it to exit.
    pub(crate) async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                warn!(error = %e, "Health monitor panicked");
            }
        }
    }

    pub(crate) fn abort(self) {
        self.handle.abort();
    }
}
