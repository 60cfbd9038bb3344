//! Connection pool implementation

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dbpool_core::{
    Connection, ConnectionParams, DbPoolError, QueryResult, Result, is_read_statement,
};
use futures::future::join_all;
use parking_lot::Mutex;

use super::config::{PoolConfig, ReleasePolicy};
use super::handle::{ConnectionHandle, HandleId};
use super::stats::PoolStatus;

/// Factory trait for opening new physical connections
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Open a connection using the pool's parameters
    async fn create(&self, params: &ConnectionParams) -> Result<Arc<dyn Connection>>;
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn create(&self, params: &ConnectionParams) -> Result<Arc<dyn Connection>> {
        (**self).create(params).await
    }
}

/// Everything guarded by the pool mutex
struct PoolState {
    /// Idle connections, used LIFO
    idle: Vec<Arc<dyn Connection>>,
    /// Checked-out connections keyed by checkout id
    in_use: HashMap<HandleId, Arc<dyn Connection>>,
    /// Slots reserved by `acquire` calls whose factory call is in flight
    opening: usize,
    closed: bool,
}

impl PoolState {
    /// Slots counted against the ceiling
    fn reserved(&self) -> usize {
        self.idle.len() + self.in_use.len() + self.opening
    }

    fn status(&self) -> PoolStatus {
        PoolStatus::new(self.idle.len(), self.in_use.len(), self.opening)
    }
}

/// A reserved slot for a connection being opened outside the lock.
///
/// Gives the slot back if the factory fails or the acquire future is dropped.
struct OpeningSlot<'a> {
    state: &'a Mutex<PoolState>,
    armed: bool,
}

impl<'a> OpeningSlot<'a> {
    fn reserve(state: &'a Mutex<PoolState>, guard: &mut PoolState) -> Self {
        guard.opening += 1;
        Self { state, armed: true }
    }

    /// Convert the reservation into a registered connection; caller holds the lock
    fn complete(mut self, guard: &mut PoolState) {
        guard.opening -= 1;
        self.armed = false;
    }
}

impl Drop for OpeningSlot<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.lock().opening -= 1;
        }
    }
}

/// A checkout made on the caller's behalf by `execute_query`
///
/// Hands the connection back if the query future is dropped or panics
/// before `release` runs.
struct Checkout<'a> {
    pool: &'a ConnectionPool,
    handle: Option<ConnectionHandle>,
}

impl<'a> Checkout<'a> {
    fn new(pool: &'a ConnectionPool, handle: ConnectionHandle) -> Self {
        Self {
            pool,
            handle: Some(handle),
        }
    }

    async fn release(mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if let Err(err) = self.pool.release(handle).await {
            tracing::warn!(error = %err, "failed to return connection after query");
        }
    }
}

impl Drop for Checkout<'_> {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let id = handle.id();
        tracing::debug!(handle = %id, "query abandoned, returning connection");
        match self.pool.check_in(handle) {
            Ok(Some(excess)) => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(close_quietly(vec![excess]));
                }
                Err(_) => {
                    tracing::debug!(handle = %id, "no runtime to close connection; dropping it");
                }
            },
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(handle = %id, error = %err, "failed to return abandoned connection");
            }
        }
    }
}

/// A bounded pool of database connections
///
/// Connections are opened up front to `min_size` and on demand up to
/// `max_size`. `acquire` never waits: when every slot is taken it fails
/// with `DbPoolError::PoolExhausted` and the caller decides whether to
/// retry (see [`crate::retry`]).
///
/// New connections are opened outside the state lock; a slot is reserved
/// first, so `available + in_use + opening <= max_size` holds at all times.
pub struct ConnectionPool {
    config: PoolConfig,
    params: ConnectionParams,
    factory: Arc<dyn ConnectionFactory>,
    state: Mutex<PoolState>,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool").finish_non_exhaustive()
    }
}

impl ConnectionPool {
    /// Create a pool and open `min_size` connections
    ///
    /// If any connection fails to open, the ones already opened are closed
    /// and the error is returned.
    #[tracing::instrument(skip_all, fields(min_size = config.min_size(), max_size = config.max_size(), host = %params.host))]
    pub async fn new<F: ConnectionFactory>(
        config: PoolConfig,
        factory: F,
        params: ConnectionParams,
    ) -> Result<Self> {
        config.validate()?;
        let factory: Arc<dyn ConnectionFactory> = Arc::new(factory);

        let mut idle = Vec::with_capacity(config.min_size());
        for _ in 0..config.min_size() {
            match open_connection(factory.as_ref(), &params).await {
                Ok(connection) => idle.push(connection),
                Err(err) => {
                    tracing::error!(error = %err, opened = idle.len(), "failed to pre-warm pool");
                    close_quietly(idle).await;
                    return Err(err);
                }
            }
        }

        tracing::info!(idle = idle.len(), "connection pool ready");
        Ok(Self {
            config,
            params,
            factory,
            state: Mutex::new(PoolState {
                idle,
                in_use: HashMap::new(),
                opening: 0,
                closed: false,
            }),
        })
    }

    /// Check out a connection
    ///
    /// 1. Reuse an idle connection if there is one
    /// 2. Otherwise open a new one if the ceiling allows
    /// 3. Otherwise fail with `PoolExhausted`
    pub async fn acquire(&self) -> Result<ConnectionHandle> {
        let slot = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(DbPoolError::PoolClosed);
            }

            if let Some(connection) = state.idle.pop() {
                let id = HandleId::new();
                state.in_use.insert(id, Arc::clone(&connection));
                tracing::debug!(handle = %id, status = %state.status(), "reusing idle connection");
                return Ok(ConnectionHandle::new(id, connection));
            }

            if state.reserved() >= self.config.max_size() {
                tracing::debug!(status = %state.status(), "connection pool exhausted");
                return Err(DbPoolError::PoolExhausted {
                    max_size: self.config.max_size(),
                });
            }

            OpeningSlot::reserve(&self.state, &mut state)
        };

        let connection = open_connection(self.factory.as_ref(), &self.params).await?;

        let id = {
            let mut state = self.state.lock();
            slot.complete(&mut state);
            if state.closed {
                None
            } else {
                let id = HandleId::new();
                state.in_use.insert(id, Arc::clone(&connection));
                tracing::debug!(handle = %id, status = %state.status(), "opened new connection");
                Some(id)
            }
        };

        match id {
            Some(id) => Ok(ConnectionHandle::new(id, connection)),
            None => {
                tracing::debug!("pool closed while opening, discarding connection");
                close_quietly(vec![connection]).await;
                Err(DbPoolError::PoolClosed)
            }
        }
    }

    /// Return a checked-out connection
    ///
    /// Fails with `UnknownConnection` if the handle is not currently checked
    /// out from this pool; the pool is left untouched in that case.
    pub async fn release(&self, handle: ConnectionHandle) -> Result<()> {
        if let Some(excess) = self.check_in(handle)? {
            close_quietly(vec![excess]).await;
        }
        Ok(())
    }

    /// Take a checkout back under the lock
    ///
    /// Returns the connection when it falls above the idle floor and must be
    /// closed by the caller.
    fn check_in(&self, handle: ConnectionHandle) -> Result<Option<Arc<dyn Connection>>> {
        let (id, _) = handle.into_parts();
        let mut state = self.state.lock();
        if state.closed {
            return Err(DbPoolError::PoolClosed);
        }

        let Some(connection) = state.in_use.remove(&id) else {
            tracing::warn!(handle = %id, "release of a connection this pool does not own");
            return Err(DbPoolError::UnknownConnection(id.to_string()));
        };

        if connection.is_closed() {
            tracing::debug!(handle = %id, "discarding closed connection");
            return Ok(None);
        }

        // Floor check happens before the connection is added back
        let keep = match self.config.release_policy() {
            ReleasePolicy::AlwaysIdle => true,
            ReleasePolicy::FloorPreserving => state.idle.len() < self.config.min_size(),
        };

        if keep {
            tracing::debug!(handle = %id, idle = state.idle.len() + 1, "connection returned to idle set");
            state.idle.push(connection);
            Ok(None)
        } else {
            tracing::debug!(handle = %id, "closing connection above the idle floor");
            Ok(Some(connection))
        }
    }

    /// Close every connection, idle or checked out, and shut the pool down
    ///
    /// All connections are closed even if some fail; failures are reported
    /// together as `CloseFailed`. Calling this on a closed pool is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn close_all(&self) -> Result<()> {
        let connections = {
            let mut state = self.state.lock();
            if state.closed {
                tracing::debug!("connection pool already closed");
                return Ok(());
            }
            state.closed = true;

            let mut connections = std::mem::take(&mut state.idle);
            connections.extend(state.in_use.drain().map(|(_, connection)| connection));
            connections
        };

        let total = connections.len();
        let results = join_all(connections.iter().map(|connection| connection.close())).await;

        let errors: Vec<String> = results
            .into_iter()
            .enumerate()
            .filter_map(|(n, result)| result.err().map(|err| format!("connection {}: {}", n, err)))
            .collect();

        if errors.is_empty() {
            tracing::info!(closed = total, "all connections closed");
            Ok(())
        } else {
            tracing::error!(failed = errors.len(), total, "some connections failed to close");
            Err(DbPoolError::CloseFailed {
                failed: errors.len(),
                total,
                errors,
            })
        }
    }

    /// Get a consistent snapshot of the pool counts
    pub fn status(&self) -> PoolStatus {
        self.state.lock().status()
    }

    /// Check whether `close_all` has run
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Get the parameters forwarded to the factory
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Run one statement on a pooled connection
    ///
    /// Read statements (starting with SELECT) return their rows; anything
    /// else returns `None`. The work is committed, and the connection goes
    /// back to the pool on every exit path before an error is returned,
    /// including a panic or the returned future being dropped mid-query.
    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    pub async fn execute_query(&self, sql: &str) -> Result<Option<QueryResult>> {
        let handle = self.acquire().await?;
        let connection = Arc::clone(handle.connection());
        let checkout = Checkout::new(self, handle);

        let outcome = run_statement(connection.as_ref(), sql).await;
        checkout.release().await;

        outcome.inspect_err(|err| tracing::error!(error = %err, "query failed"))
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.closed && (!state.idle.is_empty() || !state.in_use.is_empty()) {
            tracing::debug!(
                status = %state.status(),
                "connection pool dropped without close_all"
            );
        }
    }
}

async fn open_connection(
    factory: &dyn ConnectionFactory,
    params: &ConnectionParams,
) -> Result<Arc<dyn Connection>> {
    factory.create(params).await.map_err(|err| match err {
        DbPoolError::ConnectFailed(_) => err,
        other => DbPoolError::ConnectFailed(other.to_string()),
    })
}

/// Close connections, logging failures instead of returning them
async fn close_quietly(connections: Vec<Arc<dyn Connection>>) {
    for connection in connections {
        if let Err(err) = connection.close().await {
            tracing::warn!(driver = connection.driver_name(), error = %err, "failed to close connection");
        }
    }
}

async fn run_statement(connection: &dyn Connection, sql: &str) -> Result<Option<QueryResult>> {
    let result = if is_read_statement(sql) {
        Some(connection.query(sql).await?)
    } else {
        let affected = connection.execute(sql).await?;
        tracing::debug!(affected_rows = affected, "statement executed");
        None
    };
    connection.commit().await?;
    Ok(result)
}
