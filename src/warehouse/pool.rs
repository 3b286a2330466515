use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::handle::ConnectionHandle;
use super::WarehouseDriver;
use crate::config::{ConnectionConfig, PoolSettings};
use crate::error::{MetadataError, MetadataResult};
use crate::metadata::Row;

type PendingConnect = Shared<BoxFuture<'static, MetadataResult<Arc<ConnectionHandle>>>>;

/// Pool of warehouse connections keyed by connection target.
///
/// Concurrent callers for the same key share one in-flight connect. Idle
/// handles are evicted by a background sweep started with
/// [`WarehousePool::start`].
pub struct WarehousePool {
    driver: Arc<dyn WarehouseDriver>,
    settings: PoolSettings,
    epoch: Instant,
    handles: DashMap<String, Arc<ConnectionHandle>>,
    pending: Mutex<HashMap<String, PendingConnect>>,
    /// Bumped by `close_all`; connects begun before the bump are discarded.
    generation: AtomicU64,
    sweeper: StdMutex<Option<JoinHandle<()>>>,
}

impl WarehousePool {
    /// Create a pool without a background sweep.
    pub fn new(driver: Arc<dyn WarehouseDriver>, settings: PoolSettings) -> Arc<Self> {
        Arc::new(Self {
            driver,
            settings,
            epoch: Instant::now(),
            handles: DashMap::new(),
            pending: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            sweeper: StdMutex::new(None),
        })
    }

    /// Create a pool and start its idle sweep. Requires a Tokio runtime.
    pub fn start(driver: Arc<dyn WarehouseDriver>, settings: PoolSettings) -> Arc<Self> {
        let pool = Self::new(driver, settings);
        pool.spawn_sweeper();
        pool
    }

    fn spawn_sweeper(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let period = self.settings.sweep_interval();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(pool) = weak.upgrade() else {
                    break;
                };
                let evicted = pool.sweep_idle().await;
                if evicted > 0 {
                    debug!(evicted, remaining = pool.len(), "idle sweep");
                }
            }
        });

        if let Ok(mut sweeper) = self.sweeper.lock() {
            if let Some(previous) = sweeper.replace(task) {
                previous.abort();
            }
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Number of pooled handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Whether a handle is pooled for `config`'s key.
    pub fn contains(&self, config: &ConnectionConfig) -> bool {
        self.handles.contains_key(&config.pool_key())
    }

    /// A connected handle for `key`, refreshed. A stale one is removed and closed.
    async fn live_handle(&self, key: &str) -> Option<Arc<ConnectionHandle>> {
        let handle = self.handles.get(key).map(|entry| entry.value().clone())?;

        if handle.is_connected() {
            handle.touch(self.now_ms());
            debug!(key, handle = %handle.id(), "reusing warehouse connection");
            return Some(handle);
        }

        self.handles.remove_if(key, |_, pooled| Arc::ptr_eq(pooled, &handle));
        debug!(key, handle = %handle.id(), "discarding stale warehouse connection");
        handle.close().await;
        None
    }

    fn connect_future(&self, config: ConnectionConfig) -> BoxFuture<'static, MetadataResult<Arc<ConnectionHandle>>> {
        let driver = self.driver.clone();
        let timeout = self.settings.connect_timeout();
        let epoch = self.epoch;

        async move {
            let target = config.display_target();
            debug!(target = %target, "connecting to warehouse");

            let client = match tokio::time::timeout(timeout, driver.connect(&config)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(MetadataError::ConnectionTimeout {
                        target,
                        seconds: timeout.as_secs(),
                    })
                }
            };

            let now_ms = epoch.elapsed().as_millis() as u64;
            Ok(Arc::new(ConnectionHandle::new(config.pool_key(), client, now_ms)))
        }
        .boxed()
    }

    /// Return the pooled handle for `config`, connecting if needed.
    ///
    /// A connect already in flight for the same key is joined rather than
    /// repeated. Failed or timed-out connects leave nothing in the pool, and a
    /// connect that finishes after [`close_all`](Self::close_all) is closed
    /// instead of pooled.
    pub async fn get_connection(&self, config: &ConnectionConfig) -> MetadataResult<Arc<ConnectionHandle>> {
        let key = config.pool_key();

        if let Some(handle) = self.live_handle(&key).await {
            return Ok(handle);
        }

        let (connect, generation) = {
            let mut pending = self.pending.lock().await;
            if let Some(handle) = self.live_handle(&key).await {
                return Ok(handle);
            }
            let generation = self.generation.load(Ordering::Acquire);
            let connect = match pending.get(&key) {
                Some(in_flight) => {
                    debug!(key = %key, "joining in-flight warehouse connect");
                    in_flight.clone()
                }
                None => {
                    let connect = self.connect_future(config.clone()).shared();
                    pending.insert(key.clone(), connect.clone());
                    connect
                }
            };
            (connect, generation)
        };

        let result = connect.clone().await;

        // First waiter to finish publishes the handle, then clears the slot.
        {
            let mut pending = self.pending.lock().await;
            if self.generation.load(Ordering::Acquire) != generation {
                drop(pending);
                if let Ok(handle) = &result {
                    debug!(key = %key, handle = %handle.id(), "pool closed during connect, discarding connection");
                    handle.close().await;
                    return Err(MetadataError::PoolClosed {
                        target: config.display_target(),
                    });
                }
                return result;
            }
            if pending
                .get(&key)
                .is_some_and(|in_flight| Shared::ptr_eq(in_flight, &connect))
            {
                if let Ok(handle) = &result {
                    self.handles.insert(key.clone(), handle.clone());
                    info!(key = %key, handle = %handle.id(), "warehouse connection established");
                }
                pending.remove(&key);
            }
        }

        if let Err(err) = &result {
            warn!(key = %key, error = %err, "warehouse connect failed");
        }
        result
    }

    /// Run `sql` on a pooled connection and fetch every row.
    ///
    /// The handle counts as busy until the session closes, so the idle sweep
    /// leaves it alone. A failure that poisons the connection marks the
    /// handle stale before the error is returned.
    pub async fn execute_query(&self, sql: &str, config: &ConnectionConfig) -> MetadataResult<Vec<Row>> {
        let handle = self.get_connection(config).await?;

        let result = {
            let _in_use = handle.begin_use();
            async {
                let mut session = handle.client().open_session().await?;
                let rows = session.execute(sql).await;
                session.close().await;
                rows
            }
            .await
        };

        match result {
            Ok(rows) => {
                handle.touch(self.now_ms());
                Ok(rows)
            }
            Err(err) if err.marks_connection_stale() => {
                handle.mark_stale();
                warn!(key = %handle.key(), handle = %handle.id(), error = %err, "warehouse query failed, connection marked stale");
                Err(err)
            }
            Err(err) => {
                warn!(key = %handle.key(), handle = %handle.id(), error = %err, "warehouse query failed");
                Err(err)
            }
        }
    }

    /// Close and remove handles idle past the threshold, and stale ones.
    /// Handles with a query running are skipped. Returns how many were evicted.
    pub async fn sweep_idle(&self) -> usize {
        let now = self.now_ms();
        let idle_ms = self.settings.idle_timeout().as_millis() as u64;

        let expired: Vec<Arc<ConnectionHandle>> = self
            .handles
            .iter()
            .filter(|entry| {
                let handle = entry.value();
                if handle.is_busy() {
                    return false;
                }
                !handle.is_connected() || now.saturating_sub(handle.last_used_ms()) > idle_ms
            })
            .map(|entry| entry.value().clone())
            .collect();

        let mut evicted = 0;
        for handle in expired {
            if self
                .handles
                .remove_if(handle.key(), |_, pooled| Arc::ptr_eq(pooled, &handle))
                .is_some()
            {
                debug!(key = %handle.key(), handle = %handle.id(), "evicting idle warehouse connection");
                handle.close().await;
                evicted += 1;
            }
        }
        evicted
    }

    /// Stop the idle sweep and close every pooled handle.
    ///
    /// Connects still in flight are abandoned: their callers get
    /// [`MetadataError::PoolClosed`] and the new client is closed. The pool
    /// can still be used afterwards, without a sweep.
    pub async fn close_all(&self) {
        if let Ok(mut sweeper) = self.sweeper.lock() {
            if let Some(task) = sweeper.take() {
                task.abort();
            }
        }

        {
            let mut pending = self.pending.lock().await;
            self.generation.fetch_add(1, Ordering::AcqRel);
            pending.clear();
        }

        let keys: Vec<String> = self.handles.iter().map(|entry| entry.key().clone()).collect();
        let mut closed = 0;
        for key in keys {
            if let Some((_, handle)) = self.handles.remove(&key) {
                handle.close().await;
                closed += 1;
            }
        }
        info!(closed, "closed warehouse connections");
    }

    /// Close every handle when the process receives Ctrl-C or SIGTERM.
    pub fn close_on_shutdown(self: &Arc<Self>) -> JoinHandle<()> {
        self.close_on(shutdown_signal())
    }

    /// Close every handle once `signal` resolves. The task does not keep the
    /// pool alive.
    pub fn close_on<F>(self: &Arc<Self>, signal: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            signal.await;
            if let Some(pool) = weak.upgrade() {
                info!("shutdown signal received");
                pool.close_all().await;
            }
        })
    }
}

impl Drop for WarehousePool {
    fn drop(&mut self) {
        if let Ok(mut sweeper) = self.sweeper.lock() {
            if let Some(task) = sweeper.take() {
                task.abort();
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
