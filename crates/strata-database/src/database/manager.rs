use super::error::{ConnectionError, DatabaseError, TransactionError};
use super::health::{self, HealthMonitor, HealthStatus, MonitorTask};
use super::logger::{DefaultLogger, Logger, SlowQueryLogger};
use super::pool::{DbHandle, PoolStats};
use super::router::{ConnectionRouter, RoutedHandle};
use super::transaction::{TracedTransaction, TransactionExecutor};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strata_common_config::DatabaseConfig;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};

pub const PRIMARY: &str = "primary";

/// Name of the replica at `index` in configuration order.
pub fn replica_name(index: usize) -> String {
    format!("replica_{index}")
}

struct ManagerState {
    router: Arc<ConnectionRouter>,
    health: Arc<HashMap<String, HealthStatus>>,
    last_health_check: Option<DateTime<Utc>>,
    closed: bool,
}

/// State shared between a manager and its monitor task.
pub(crate) struct Shared {
    config: DatabaseConfig,
    logger: Arc<dyn Logger>,
    slow_query_logger: Arc<dyn Logger>,
    state: RwLock<ManagerState>,
}

impl Shared {
    pub(crate) fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    async fn router(&self) -> Result<Arc<ConnectionRouter>, ConnectionError> {
        let state = self.state.read().await;
        if state.closed {
            return Err(ConnectionError::Closed);
        }
        Ok(Arc::clone(&state.router))
    }

    /// Probe every data source and publish the snapshot. No lock is held while probing.
    pub(crate) async fn check_health(&self, timeout: Duration) -> HashMap<String, HealthStatus> {
        let router = Arc::clone(&self.state.read().await.router);
        let snapshot = Arc::new(health::check_all(&router, timeout).await);

        let mut state = self.state.write().await;
        state.health = Arc::clone(&snapshot);
        state.last_health_check = Some(Utc::now());
        drop(state);

        (*snapshot).clone()
    }
}

/// Owns the primary and replica pools, routes statements, runs transactions
/// and tracks health.
///
/// All methods take `&self` and are safe to call concurrently.
pub struct DbManager {
    shared: Arc<Shared>,
    monitor: Mutex<Option<MonitorTask>>,
}

impl DbManager {
    /// Validate `config`, open every data source and start monitoring if enabled.
    ///
    /// On any failure every pool opened so far is closed before returning.
    #[instrument(skip_all, fields(replicas = config.replicas.len()))]
    pub async fn new(config: DatabaseConfig, logger: Option<Arc<dyn Logger>>) -> Result<Self, DatabaseError> {
        config.validate()?;

        let logger = logger.unwrap_or_else(|| Arc::new(DefaultLogger::new(&config.log, &config.slow_query)));
        let slow_query_logger: Arc<dyn Logger> = Arc::new(SlowQueryLogger::new(
            config.slow_query.clone(),
            Some(Arc::clone(&logger)),
        ));

        let router = Self::open_router(&config).await?;

        let shared = Arc::new(Shared {
            state: RwLock::new(ManagerState {
                router: Arc::new(router),
                health: Arc::default(),
                last_health_check: None,
                closed: false,
            }),
            config,
            logger,
            slow_query_logger,
        });

        let monitor = shared
            .config
            .monitor
            .enabled
            .then(|| HealthMonitor::new(&shared.config.monitor).spawn(Arc::clone(&shared)));

        info!(
            primary_engine = %shared.config.engine,
            replicas = shared.config.replicas.len(),
            monitoring = monitor.is_some(),
            "Database manager initialized"
        );

        Ok(Self {
            shared,
            monitor: Mutex::new(monitor),
        })
    }

    async fn open_router(config: &DatabaseConfig) -> Result<ConnectionRouter, DatabaseError> {
        let primary = DbHandle::open(PRIMARY, &config.engine, &config.primary, &config.pool).await?;

        let mut replicas = Vec::with_capacity(config.replicas.len());
        for (index, replica) in config.replicas.iter().enumerate() {
            let opened = DbHandle::open(
                &replica_name(index),
                config.replica_engine(replica),
                &replica.dsn,
                &config.replica_pool(replica),
            )
            .await;

            match opened {
                Ok(handle) => replicas.push((handle, replica.weight)),
                Err(e) => {
                    for (handle, _) in &replicas {
                        handle.close().await;
                    }
                    primary.close().await;
                    return Err(e);
                }
            }
        }

        Ok(ConnectionRouter::new(primary, replicas))
    }

    /// Handle that sends reads to replicas and writes to the primary.
    pub async fn routed(&self) -> Result<RoutedHandle, DatabaseError> {
        let router = self.shared.router().await?;
        Ok(RoutedHandle::new(
            router,
            Arc::clone(&self.shared.logger),
            Arc::clone(&self.shared.slow_query_logger),
        ))
    }

    pub async fn primary(&self) -> Result<DbHandle, DatabaseError> {
        Ok(self.shared.router().await?.route_for_write().clone())
    }

    /// A weighted replica pick, or the primary when no replica is selectable.
    pub async fn replica(&self) -> Result<DbHandle, DatabaseError> {
        Ok(self.shared.router().await?.route_for_read().clone())
    }

    /// Run `f` in a transaction on the primary. See [`TransactionExecutor::run`].
    pub async fn transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut TracedTransaction) -> BoxFuture<'c, Result<T, E>> + Send,
        T: Send,
        E: From<TransactionError> + Send,
    {
        let router = self
            .shared
            .router()
            .await
            .map_err(|_| TransactionError::Begin(sqlx::Error::PoolClosed))?;
        TransactionExecutor::new(
            router.route_for_write(),
            Arc::clone(&self.shared.logger),
            Arc::clone(&self.shared.slow_query_logger),
        )
        .run(f)
        .await
    }

    /// Probe every data source now. Failures appear in the map, never as an error.
    pub async fn check_health(&self, timeout: Duration) -> HashMap<String, HealthStatus> {
        self.shared.check_health(timeout).await
    }

    /// Latest published health snapshot.
    pub async fn health_snapshot(&self) -> HashMap<String, HealthStatus> {
        (*self.shared.state.read().await.health).clone()
    }

    pub async fn last_health_check(&self) -> Option<DateTime<Utc>> {
        self.shared.state.read().await.last_health_check
    }

    /// Pool statistics for every data source.
    pub async fn stats(&self) -> HashMap<String, PoolStats> {
        let router = Arc::clone(&self.shared.state.read().await.router);
        router
            .data_sources()
            .map(|handle| (handle.name().to_string(), handle.stats()))
            .collect()
    }

    /// Check that the primary answers within `timeout`.
    pub async fn ping(&self, timeout: Duration) -> Result<(), DatabaseError> {
        let primary = self.primary().await?;
        health::ping_within(&primary, timeout).await.map_err(|source| {
            ConnectionError::Unreachable {
                name: primary.name().to_string(),
                source,
            }
        })?;
        Ok(())
    }

    /// Stop monitoring and close every pool. Later calls are no-ops.
    pub async fn close(&self) -> Result<(), DatabaseError> {
        if let Some(task) = self.monitor.lock().await.take() {
            task.stop().await;
        }

        let router = {
            let mut state = self.shared.state.write().await;
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            Arc::clone(&state.router)
        };

        for handle in router.data_sources() {
            handle.close().await;
        }

        info!("Database manager closed");
        Ok(())
    }

    pub async fn is_closed(&self) -> bool {
        self.shared.state.read().await.closed
    }

    pub fn logger(&self) -> Arc<dyn Logger> {
        Arc::clone(&self.shared.logger)
    }

    pub fn slow_query_logger(&self) -> Arc<dyn Logger> {
        Arc::clone(&self.shared.slow_query_logger)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.shared.config
    }
}

impl Drop for DbManager {
    fn drop(&mut self) {
        if let Some(task) = self.monitor.get_mut().take() {
            warn!("Database manager dropped without close; stopping health monitor");
            task.abort();
        }
    }
}
