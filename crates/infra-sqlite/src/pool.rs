//! Connection pool.
//!
//! A fixed-capacity pool with a fair wait queue. Capacity is a semaphore with
//! `max_size` permits: a caller holds one permit for as long as it holds a
//! connection, so waiters are served in arrival order and every checked-out
//! connection is returned or discarded exactly once (when its guard drops).
//!
//! Pool bookkeeping sits behind a short `parking_lot` mutex that is never held
//! across I/O. Opening, validating and closing connections happen outside it.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use blogstore_core::config::DataConfig;
use blogstore_core::error::{AppError, Result};

/// Opens, checks and closes the connections a pool hands out
#[async_trait]
pub trait ManageConnection: Send + Sync + 'static {
    type Connection: Send + 'static;

    /// Open a new connection. `ConnectionUnavailable` errors are retried.
    async fn connect(&self) -> Result<Self::Connection>;

    /// Cheap liveness check used when `test_on_checkout` is set
    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<()>;

    async fn disconnect(&self, conn: Self::Connection);
}

/// Pool sizing and lifecycle settings
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_size: u32,
    pub min_idle: u32,
    pub acquire_timeout: Duration,
    /// Connections older than this are closed when returned or checked out
    pub max_lifetime: Option<Duration>,
    pub connect_attempts: u32,
    pub connect_backoff: Duration,
    pub test_on_checkout: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from(&DataConfig::default())
    }
}

impl From<&DataConfig> for PoolConfig {
    fn from(config: &DataConfig) -> Self {
        Self {
            max_size: config.max_connections,
            min_idle: config.min_idle,
            acquire_timeout: config.acquire_timeout(),
            max_lifetime: (config.max_lifetime_ms > 0).then(|| config.max_lifetime()),
            connect_attempts: config.connect_attempts,
            connect_backoff: config.connect_backoff(),
            test_on_checkout: config.test_on_checkout,
        }
    }
}

/// A pool of connections produced by `M`
pub struct ConnectionPool<M: ManageConnection> {
    inner: Arc<PoolInner<M>>,
}

impl<M: ManageConnection> Clone for ConnectionPool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct PoolInner<M: ManageConnection> {
    manager: M,
    config: PoolConfig,
    /// One permit per connection slot; closed together with the pool
    permits: Arc<Semaphore>,
    slots: Mutex<Slots<M::Connection>>,
    closed: AtomicBool,
    next_connection_id: AtomicU64,
    created_at: Instant,
    metrics: Mutex<PoolMetricsInner>,
}

struct Slots<C> {
    idle: VecDeque<Idle<C>>,
    /// Idle plus checked-out connections
    open: u32,
}

struct Idle<C> {
    conn: C,
    id: u64,
    created_at: Instant,
}

#[derive(Debug, Default)]
struct PoolMetricsInner {
    connections_created: u64,
    connections_closed: u64,
    checkouts_successful: u64,
    checkouts_failed: u64,
    checkout_timeouts: u64,
    connect_retries: u64,
}

impl<M: ManageConnection> ConnectionPool<M> {
    /// Build the pool and open `min_idle` connections up front
    pub async fn new(manager: M, config: PoolConfig) -> Result<Self> {
        if config.max_size == 0 {
            return Err(AppError::Config("pool max_size must be at least 1".to_string()));
        }
        if config.min_idle > config.max_size {
            return Err(AppError::Config(format!(
                "pool min_idle ({}) exceeds max_size ({})",
                config.min_idle, config.max_size
            )));
        }

        let inner = Arc::new(PoolInner {
            manager,
            permits: Arc::new(Semaphore::new(config.max_size as usize)),
            slots: Mutex::new(Slots {
                idle: VecDeque::with_capacity(config.max_size as usize),
                open: 0,
            }),
            closed: AtomicBool::new(false),
            next_connection_id: AtomicU64::new(1),
            created_at: Instant::now(),
            metrics: Mutex::new(PoolMetricsInner::default()),
            config,
        });

        for _ in 0..inner.config.min_idle {
            let idle = inner.open_connection().await?;
            inner.slots.lock().idle.push_back(idle);
        }

        info!(
            max = inner.config.max_size,
            min_idle = inner.config.min_idle,
            "connection pool created"
        );

        Ok(Self { inner })
    }

    /// Acquire with the configured default timeout
    pub async fn acquire(&self) -> Result<PooledConnection<M>> {
        self.acquire_timeout(self.inner.config.acquire_timeout).await
    }

    /// Wait up to `timeout` for an idle connection or free capacity.
    ///
    /// Fails with `PoolExhausted` when the wait expires and `PoolClosed` once the
    /// pool is closed (including callers already waiting when it closes).
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<PooledConnection<M>> {
        if self.is_closed() {
            self.inner.metrics.lock().checkouts_failed += 1;
            return Err(AppError::PoolClosed);
        }

        let started = Instant::now();
        let result = tokio::time::timeout(timeout, self.inner.checkout()).await;

        let mut metrics = self.inner.metrics.lock();
        match result {
            Ok(Ok(conn)) => {
                metrics.checkouts_successful += 1;
                drop(metrics);
                debug!(connection_id = conn.id, "connection checked out");
                Ok(conn)
            }
            Ok(Err(err)) => {
                metrics.checkouts_failed += 1;
                Err(err)
            }
            Err(_) => {
                metrics.checkouts_failed += 1;
                metrics.checkout_timeouts += 1;
                drop(metrics);
                let waited_ms = started.elapsed().as_millis() as u64;
                warn!(waited_ms, "connection pool exhausted");
                Err(AppError::PoolExhausted { waited_ms })
            }
        }
    }

    /// Return a connection to the pool. Equivalent to dropping it.
    pub fn release(&self, conn: PooledConnection<M>) {
        drop(conn);
    }

    /// Close idle connections and refuse further checkouts.
    ///
    /// Connections still checked out are closed as they come back.
    pub async fn close(&self) {
        let drained: Vec<Idle<M::Connection>> = {
            let mut slots = self.inner.slots.lock();
            self.inner.closed.store(true, Ordering::Release);
            let drained: Vec<_> = slots.idle.drain(..).collect();
            slots.open -= drained.len() as u32;
            drained
        };
        self.inner.permits.close();

        let count = drained.len() as u64;
        for idle in drained {
            self.inner.manager.disconnect(idle.conn).await;
        }
        self.inner.metrics.lock().connections_closed += count;

        info!(closed_idle = count, "connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn status(&self) -> PoolStatus {
        let slots = self.inner.slots.lock();
        let idle = slots.idle.len() as u32;
        PoolStatus {
            idle,
            in_use: slots.open - idle,
            open: slots.open,
            max: self.inner.config.max_size,
        }
    }

    pub fn metrics(&self) -> PoolMetrics {
        let inner = self.inner.metrics.lock();
        PoolMetrics {
            connections_created: inner.connections_created,
            connections_closed: inner.connections_closed,
            checkouts_successful: inner.checkouts_successful,
            checkouts_failed: inner.checkouts_failed,
            checkout_timeouts: inner.checkout_timeouts,
            connect_retries: inner.connect_retries,
            uptime: self.inner.created_at.elapsed(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }
}

impl<M: ManageConnection> PoolInner<M> {
    async fn checkout(self: &Arc<Self>) -> Result<PooledConnection<M>> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| AppError::PoolClosed)?;

        loop {
            // Most recently returned first, so surplus connections age out
            let candidate = self.slots.lock().idle.pop_back();

            let Some(mut idle) = candidate else {
                let idle = self.open_connection().await?;
                return Ok(PooledConnection::new(idle, permit, Arc::clone(self)));
            };

            if self.is_expired(idle.created_at) {
                self.discard(idle, "max lifetime reached");
                continue;
            }

            if self.config.test_on_checkout {
                // Owned by the guard while validating, so a cancelled checkout still discards it
                let mut pending = PendingCheckout {
                    idle: Some(idle),
                    pool: Arc::clone(self),
                };
                let valid = pending.validate().await;
                let Some(checked) = pending.finish() else {
                    continue;
                };
                idle = checked;

                if let Err(err) = valid {
                    debug!(connection_id = idle.id, error = %err, "idle connection failed validation");
                    self.discard(idle, "failed validation");
                    continue;
                }
            }

            return Ok(PooledConnection::new(idle, permit, Arc::clone(self)));
        }
    }

    /// Open with bounded exponential backoff on transient failures
    async fn open_connection(&self) -> Result<Idle<M::Connection>> {
        let attempts = self.config.connect_attempts.max(1);
        let mut delay = self.config.connect_backoff;
        let mut attempt = 1;

        loop {
            match self.manager.connect().await {
                Ok(conn) => {
                    let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
                    self.slots.lock().open += 1;
                    self.metrics.lock().connections_created += 1;
                    debug!(connection_id = id, attempt, "connection opened");
                    return Ok(Idle {
                        conn,
                        id,
                        created_at: Instant::now(),
                    });
                }
                Err(err) if err.is_transient() && attempt < attempts => {
                    let wait = jitter(delay);
                    warn!(
                        attempt,
                        max_attempts = attempts,
                        retry_in_ms = wait.as_millis() as u64,
                        error = %err,
                        "failed to open connection, retrying"
                    );
                    self.metrics.lock().connect_retries += 1;
                    tokio::time::sleep(wait).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(AppError::ConnectionUnavailable(reason)) => {
                    return Err(AppError::ConnectionUnavailable(format!(
                        "giving up after {} attempt(s): {}",
                        attempt, reason
                    )));
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn is_expired(&self, created_at: Instant) -> bool {
        self.config
            .max_lifetime
            .is_some_and(|lifetime| created_at.elapsed() >= lifetime)
    }

    /// Put a returned connection back, or discard it
    fn put_back(self: &Arc<Self>, idle: Idle<M::Connection>, unhealthy: Option<&'static str>) {
        let reason = unhealthy.or_else(|| {
            self.is_expired(idle.created_at)
                .then_some("max lifetime reached")
        });

        if let Some(reason) = reason {
            self.discard(idle, reason);
            return;
        }

        let mut slots = self.slots.lock();
        // Checked under the lock so close() cannot miss a connection returned concurrently
        if self.closed.load(Ordering::Acquire) {
            drop(slots);
            self.discard(idle, "pool closed");
        } else {
            slots.idle.push_back(idle);
        }
    }

    /// Forget a connection and close it in the background
    fn discard(self: &Arc<Self>, idle: Idle<M::Connection>, reason: &'static str) {
        self.slots.lock().open -= 1;
        self.metrics.lock().connections_closed += 1;
        debug!(connection_id = idle.id, reason, "connection discarded");

        // Without a runtime the connection is simply dropped
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let pool = Arc::clone(self);
            handle.spawn(async move {
                pool.manager.disconnect(idle.conn).await;
            });
        }
    }
}

/// Idle connection popped for checkout but not yet handed out
struct PendingCheckout<M: ManageConnection> {
    idle: Option<Idle<M::Connection>>,
    pool: Arc<PoolInner<M>>,
}

impl<M: ManageConnection> PendingCheckout<M> {
    async fn validate(&mut self) -> Result<()> {
        match self.idle.as_mut() {
            Some(idle) => self.pool.manager.is_valid(&mut idle.conn).await,
            None => Ok(()),
        }
    }

    fn finish(mut self) -> Option<Idle<M::Connection>> {
        self.idle.take()
    }
}

impl<M: ManageConnection> Drop for PendingCheckout<M> {
    fn drop(&mut self) {
        if let Some(idle) = self.idle.take() {
            self.pool.discard(idle, "checkout cancelled during validation");
        }
    }
}

fn jitter(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.8..=1.2);
    delay.mul_f64(factor)
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub idle: u32,
    pub in_use: u32,
    pub open: u32,
    pub max: u32,
}

impl PoolStatus {
    pub fn is_at_capacity(&self) -> bool {
        self.open >= self.max
    }
}

/// Cumulative pool counters.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub connections_created: u64,
    pub connections_closed: u64,
    pub checkouts_successful: u64,
    /// Timeouts, closed pool and open failures
    pub checkouts_failed: u64,
    pub checkout_timeouts: u64,
    pub connect_retries: u64,
    pub uptime: Duration,
}

impl PoolMetrics {
    /// Checkout success rate (0.0 to 1.0).
    pub fn checkout_success_rate(&self) -> f64 {
        let total = self.checkouts_successful + self.checkouts_failed;
        if total == 0 {
            return 1.0;
        }
        self.checkouts_successful as f64 / total as f64
    }
}

/// A connection checked out of the pool.
///
/// Dropping the guard returns the connection. It is discarded instead when it
/// was marked broken, when it is dropped while a statement is still in flight
/// (the caller's future was cancelled), when it outlived `max_lifetime`, or when
/// the pool has been closed.
pub struct PooledConnection<M: ManageConnection> {
    conn: Option<M::Connection>,
    id: u64,
    created_at: Instant,
    broken: bool,
    in_flight: bool,
    pool: Arc<PoolInner<M>>,
    // Released after Drop::drop has put the connection back
    _permit: OwnedSemaphorePermit,
}

impl<M: ManageConnection> PooledConnection<M> {
    fn new(idle: Idle<M::Connection>, permit: OwnedSemaphorePermit, pool: Arc<PoolInner<M>>) -> Self {
        Self {
            conn: Some(idle.conn),
            id: idle.id,
            created_at: idle.created_at,
            broken: false,
            in_flight: false,
            pool,
            _permit: permit,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Never hand this connection out again
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Set while a statement is running on the connection
    pub fn set_in_flight(&mut self, in_flight: bool) {
        self.in_flight = in_flight;
    }

    /// Close this connection instead of returning it
    pub fn discard(mut self) {
        self.broken = true;
    }
}

impl<M: ManageConnection> Deref for PooledConnection<M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection is present until drop")
    }
}

impl<M: ManageConnection> DerefMut for PooledConnection<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection is present until drop")
    }
}

impl<M: ManageConnection> fmt::Debug for PooledConnection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("broken", &self.broken)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl<M: ManageConnection> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        let idle = Idle {
            conn,
            id: self.id,
            created_at: self.created_at,
        };

        let unhealthy = if self.broken {
            Some("marked broken")
        } else if self.in_flight {
            Some("dropped mid-statement")
        } else {
            None
        };
        self.pool.put_back(idle, unhealthy);
    }
}
