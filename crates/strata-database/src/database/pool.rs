use super::engine::EngineKind;
use super::error::{ConnectionError, DatabaseError, PoolError};
use serde::Serialize;
use sqlx::any::{AnyConnectOptions, AnyPoolOptions};
use sqlx::pool::{PoolConnection, PoolConnectionMetadata};
use sqlx::{Any, AnyPool, Connection, Transaction};
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use strata_common_config::duration::millis;
use strata_common_config::PoolShape;
use tracing::{debug, info, instrument};

/// sqlx reaper defaults, enforced by the controller once it takes over expiry.
const DRIVER_MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);
const DRIVER_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Counters sqlx does not expose, maintained by pool hooks.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    idle: AtomicU32,
    wait_count: AtomicU64,
    wait_nanos: AtomicU64,
    max_idle_closed: AtomicU64,
    max_idle_time_closed: AtomicU64,
    max_lifetime_closed: AtomicU64,
}

impl PoolCounters {
    /// Admit a released connection into the idle set unless the cap is reached.
    fn admit_idle(&self, max_idle: u32) -> bool {
        let mut current = self.idle.load(Ordering::Acquire);
        loop {
            if current >= max_idle {
                self.max_idle_closed.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            match self
                .idle
                .compare_exchange_weak(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn leave_idle(&self) {
        let _ = self
            .idle
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Decide whether an idle connection may be handed out again.
    fn check_expiry(
        &self,
        age: Duration,
        idle_for: Duration,
        lifetime: Option<Duration>,
        idle_time: Option<Duration>,
    ) -> bool {
        if lifetime.is_some_and(|max| age > max) {
            self.max_lifetime_closed.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        if idle_time.is_some_and(|max| idle_for > max) {
            self.max_idle_time_closed.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    fn record_wait(&self, waited: Duration) {
        self.wait_count.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(waited.as_nanos()).unwrap_or(u64::MAX);
        self.wait_nanos.fetch_add(nanos, Ordering::Relaxed);
    }
}

fn non_zero(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}

/// Applies a `PoolShape` to a pool and confirms the pool is live.
pub struct PoolController;

impl PoolController {
    /// Map the shape onto pool options. Zero fields keep the driver default.
    ///
    /// The `max_idle_conns` cap and both expiry limits are enforced through
    /// acquire/release hooks so that each closure can be counted.
    pub(crate) fn apply(
        mut options: AnyPoolOptions,
        shape: &PoolShape,
        counters: &Arc<PoolCounters>,
    ) -> AnyPoolOptions {
        if shape.max_open_conns > 0 {
            options = options.max_connections(shape.max_open_conns);
        }

        let max_idle = shape.max_idle_conns;
        let manages_idle = max_idle > 0;
        let lifetime = non_zero(shape.conn_max_lifetime).or(manages_idle.then_some(DRIVER_MAX_LIFETIME));
        let idle_time = non_zero(shape.conn_max_idle_time).or(manages_idle.then_some(DRIVER_IDLE_TIMEOUT));

        if lifetime.is_some() {
            options = options.max_lifetime(None);
        }
        if idle_time.is_some() {
            options = options.idle_timeout(None);
        }

        if lifetime.is_some() || idle_time.is_some() {
            // The driver's own liveness ping runs before this hook and can drop a
            // connection unseen, so the ping moves in here where the gauge sees it.
            let ping = manages_idle && options.get_test_before_acquire();
            if ping {
                options = options.test_before_acquire(false);
            }

            let counters = Arc::clone(counters);
            options = options.before_acquire(move |conn, meta: PoolConnectionMetadata| {
                if manages_idle {
                    counters.leave_idle();
                }
                let keep = counters.check_expiry(meta.age, meta.idle_for, lifetime, idle_time);
                Box::pin(async move {
                    if keep && ping {
                        conn.ping().await?;
                    }
                    Ok(keep)
                })
            });
        }

        if manages_idle {
            let counters = Arc::clone(counters);
            options = options.after_release(move |_conn, _meta| {
                let keep = counters.admit_idle(max_idle);
                Box::pin(async move { Ok(keep) })
            });
        }

        options
    }

    /// Fail when the handle no longer reports a live pool.
    pub fn verify(handle: &DbHandle) -> Result<(), PoolError> {
        if handle.pool.is_closed() {
            return Err(PoolError::Unavailable {
                name: handle.name.to_string(),
            });
        }
        Ok(())
    }
}

/// Handle to one data source's connection pool.
#[derive(Clone)]
pub struct DbHandle {
    name: Arc<str>,
    engine: EngineKind,
    pool: AnyPool,
    max_connections: u32,
    counters: Arc<PoolCounters>,
}

impl std::fmt::Debug for DbHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbHandle")
            .field("name", &self.name)
            .field("engine", &self.engine)
            .field("max_connections", &self.max_connections)
            .field("closed", &self.pool.is_closed())
            .finish()
    }
}

impl DbHandle {
    /// Open a pool for `dsn` and shape it. Nothing is left open on failure.
    #[instrument(skip(dsn, shape))]
    pub async fn open(name: &str, engine: &str, dsn: &str, shape: &PoolShape) -> Result<Self, DatabaseError> {
        sqlx::any::install_default_drivers();

        let engine = EngineKind::parse(engine)?;
        let url = engine.connection_url(dsn);
        let connect_options = AnyConnectOptions::from_str(&url).map_err(|source| ConnectionError::InvalidDsn {
            name: name.to_string(),
            source,
        })?;

        let counters = Arc::new(PoolCounters::default());
        let options = PoolController::apply(AnyPoolOptions::new(), shape, &counters);
        let max_connections = options.get_max_connections();

        let pool = options
            .connect_with(connect_options)
            .await
            .map_err(|source| ConnectionError::Open {
                name: name.to_string(),
                source,
            })?;

        let handle = Self {
            name: Arc::from(name),
            engine,
            pool,
            max_connections,
            counters,
        };

        if let Err(e) = PoolController::verify(&handle) {
            handle.close().await;
            return Err(e.into());
        }

        info!(name, max_connections, "Database pool opened");
        Ok(handle)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    /// Underlying sqlx pool. Statements run on it directly bypass query tracing
    /// and wait accounting.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    fn is_saturated(&self) -> bool {
        self.pool.num_idle() == 0 && self.pool.size() >= self.max_connections
    }

    /// Acquire a connection, counting the wait when the pool is exhausted.
    pub async fn acquire(&self) -> Result<PoolConnection<Any>, sqlx::Error> {
        let saturated = self.is_saturated();
        let start = Instant::now();
        let conn = self.pool.acquire().await;
        if saturated {
            self.counters.record_wait(start.elapsed());
        }
        conn
    }

    /// Begin a transaction on this data source.
    pub async fn begin(&self) -> Result<Transaction<'static, Any>, sqlx::Error> {
        let saturated = self.is_saturated();
        let start = Instant::now();
        let tx = self.pool.begin().await;
        if saturated {
            self.counters.record_wait(start.elapsed());
        }
        tx
    }

    /// Current pool statistics.
    pub fn stats(&self) -> PoolStats {
        let open = self.pool.size();
        let idle = u32::try_from(self.pool.num_idle()).unwrap_or(u32::MAX).min(open);
        let c = &self.counters;

        PoolStats {
            open_connections: open,
            in_use: open - idle,
            idle,
            max_open_connections: self.max_connections,
            wait_count: c.wait_count.load(Ordering::Relaxed),
            wait_duration: Duration::from_nanos(c.wait_nanos.load(Ordering::Relaxed)),
            max_idle_closed: c.max_idle_closed.load(Ordering::Relaxed),
            max_idle_time_closed: c.max_idle_time_closed.load(Ordering::Relaxed),
            max_lifetime_closed: c.max_lifetime_closed.load(Ordering::Relaxed),
        }
    }

    /// Close the pool gracefully. Repeated calls are no-ops.
    pub async fn close(&self) {
        if self.pool.is_closed() {
            return;
        }
        debug!(name = %self.name, "Closing database pool");
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

/// Snapshot of one data source's pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub open_connections: u32,
    pub in_use: u32,
    pub idle: u32,
    pub max_open_connections: u32,
    pub wait_count: u64,
    #[serde(rename = "wait_duration_ms", with = "millis")]
    pub wait_duration: Duration,
    pub max_idle_closed: u64,
    pub max_idle_time_closed: u64,
    pub max_lifetime_closed: u64,
}

impl PoolStats {
    pub fn utilization(&self) -> f64 {
        if self.max_open_connections == 0 {
            return 0.0;
        }
        self.in_use as f64 / self.max_open_connections as f64
    }
}
