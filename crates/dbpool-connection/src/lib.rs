//! dbpool connection - bounded connection pooling
//!
//! This crate hands out database connections to concurrent callers,
//! reuses idle ones, enforces a ceiling on live connections and reclaims
//! everything on shutdown.

pub mod pool;
mod registry;
pub mod retry;

pub use pool::{
    ConnectionFactory, ConnectionHandle, ConnectionPool, HandleId, PoolConfig, PoolStatus,
    ReleasePolicy, with_pool,
};
pub use registry::PoolRegistry;
pub use retry::{BackoffStrategy, RetryPolicy, acquire_with_retry};
