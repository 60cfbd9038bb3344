//! Scoped pool lifetimes

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use dbpool_core::{ConnectionParams, Result};
use futures::FutureExt;

use super::config::PoolConfig;
use super::pool::{ConnectionFactory, ConnectionPool};

impl ConnectionPool {
    /// Run `body` with this pool, then close the pool
    ///
    /// `close_all` runs however the body ends: success, error or panic.
    /// An error from the body takes precedence over a close failure, and a
    /// panic is resumed after the pool is closed.
    pub async fn scope<F, Fut, T>(self: &Arc<Self>, body: F) -> Result<T>
    where
        F: FnOnce(Arc<ConnectionPool>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let outcome = AssertUnwindSafe(body(Arc::clone(self)))
            .catch_unwind()
            .await;
        let closed = self.close_all().await;

        match outcome {
            Ok(Ok(value)) => closed.map(|()| value),
            Ok(Err(err)) => {
                if let Err(close_err) = closed {
                    tracing::warn!(error = %close_err, "failed to close pool after scope error");
                }
                Err(err)
            }
            Err(panic) => {
                if let Err(close_err) = closed {
                    tracing::warn!(error = %close_err, "failed to close pool after scope panic");
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
}

/// Build a pool, run `body` with it, and close it on every exit path
///
/// # Example
///
/// ```ignore
/// let rows = with_pool(config, factory, params, |pool| async move {
///     pool.execute_query("SELECT * FROM table1").await
/// })
/// .await?;
/// ```
pub async fn with_pool<Fac, F, Fut, T>(
    config: PoolConfig,
    factory: Fac,
    params: ConnectionParams,
    body: F,
) -> Result<T>
where
    Fac: ConnectionFactory,
    F: FnOnce(Arc<ConnectionPool>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let pool = Arc::new(ConnectionPool::new(config, factory, params).await?);
    pool.scope(body).await
}
