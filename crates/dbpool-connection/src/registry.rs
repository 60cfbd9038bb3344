//! Named registry of long-lived pools
//!
//! Pools are looked up by an explicit name chosen by the caller. Asking
//! for a name that is already registered returns the existing pool, so
//! independent parts of a program can share one pool by agreeing on its
//! name rather than on construction order.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use dbpool_core::{ConnectionParams, DbPoolError, Result};
use parking_lot::RwLock;
use tokio::sync::OnceCell;

use crate::pool::{ConnectionFactory, ConnectionPool, PoolConfig};

/// Slot for one name; empty until its pool has been built
type PoolCell = Arc<OnceCell<Arc<ConnectionPool>>>;

/// Registry mapping names to shared pools
///
/// Each name has its own cell, so a slow connect under one name never
/// holds up lookups or construction under another.
pub struct PoolRegistry {
    pools: RwLock<HashMap<String, PoolCell>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry
    ///
    /// Empty until the entry point registers pools; the entry point is
    /// also responsible for calling [`PoolRegistry::close_all`] on shutdown.
    pub fn global() -> &'static PoolRegistry {
        static GLOBAL: OnceLock<PoolRegistry> = OnceLock::new();
        GLOBAL.get_or_init(PoolRegistry::new)
    }

    fn cell(&self, name: &str) -> PoolCell {
        if let Some(cell) = self.pools.read().get(name) {
            return Arc::clone(cell);
        }
        Arc::clone(self.pools.write().entry(name.to_string()).or_default())
    }

    /// Get the pool registered under `name`, creating it if absent
    ///
    /// When the name is taken, `config`, `factory` and `params` are ignored
    /// and the registered pool is returned. Concurrent first calls for one
    /// name build a single pool; if that build fails the next caller tries
    /// again.
    #[tracing::instrument(skip(self, config, factory, params))]
    pub async fn get_or_connect<F: ConnectionFactory>(
        &self,
        name: &str,
        config: PoolConfig,
        factory: F,
        params: ConnectionParams,
    ) -> Result<Arc<ConnectionPool>> {
        let cell = self.cell(name);
        let pool = cell
            .get_or_try_init(|| {
                let (config, params) = (config.clone(), params.clone());
                async move {
                    let pool = ConnectionPool::new(config, factory, params).await?;
                    tracing::info!(pool = name, "pool registered");
                    Ok::<_, DbPoolError>(Arc::new(pool))
                }
            })
            .await?;

        log_mismatch(name, pool, &config, &params);
        Ok(Arc::clone(pool))
    }

    /// Register an already-built pool
    ///
    /// Fails with `DbPoolError::Configuration` if the name is taken or a
    /// pool is being built under it.
    pub fn insert(&self, name: &str, pool: Arc<ConnectionPool>) -> Result<()> {
        let mut pools = self.pools.write();
        let cell = pools.entry(name.to_string()).or_default();
        cell.set(pool).map_err(|_| {
            DbPoolError::Configuration(format!("a pool named '{}' is already registered", name))
        })
    }

    /// Get a registered pool
    pub fn get(&self, name: &str) -> Option<Arc<ConnectionPool>> {
        self.pools.read().get(name).and_then(|cell| cell.get().cloned())
    }

    /// Unregister a pool without closing it
    ///
    /// A pool still being built under `name` stays unregistered once its
    /// build finishes.
    pub fn remove(&self, name: &str) -> Option<Arc<ConnectionPool>> {
        self.pools
            .write()
            .remove(name)
            .and_then(|cell| cell.get().cloned())
    }

    /// Unregister a pool and close it
    ///
    /// Returns `Ok(false)` if no pool was registered under `name`.
    pub async fn close(&self, name: &str) -> Result<bool> {
        match self.remove(name) {
            Some(pool) => {
                pool.close_all().await?;
                tracing::info!(pool = name, "pool closed and unregistered");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Names of all registered pools, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .pools
            .read()
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Close and unregister every pool
    ///
    /// Every pool is closed even if some fail; failures are reported together.
    pub async fn close_all(&self) -> Result<()> {
        let pools: Vec<(String, Arc<ConnectionPool>)> = self
            .pools
            .write()
            .drain()
            .filter_map(|(name, cell)| cell.get().cloned().map(|pool| (name, pool)))
            .collect();
        let total = pools.len();

        let mut errors = Vec::new();
        for (name, pool) in pools {
            if let Err(err) = pool.close_all().await {
                errors.push(format!("{}: {}", name, err));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DbPoolError::CloseFailed {
                failed: errors.len(),
                total,
                errors,
            })
        }
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn log_mismatch(
    name: &str,
    pool: &ConnectionPool,
    config: &PoolConfig,
    params: &ConnectionParams,
) {
    if pool.config() != config || pool.params() != params {
        tracing::debug!(
            pool = name,
            registered = ?pool.config(),
            requested = ?config,
            "returning registered pool; requested settings ignored"
        );
    }
}
