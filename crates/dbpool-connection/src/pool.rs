//! Connection pooling for database connections
//!
//! The pool keeps two partitions of live connections: idle ones owned by
//! the pool and checked-out ones owned by callers. `acquire` never waits;
//! when every slot up to `max_size` is taken it fails immediately with
//! `DbPoolError::PoolExhausted`.
//!
//! # Example
//!
//! ```ignore
//! use dbpool_connection::pool::{ConnectionPool, PoolConfig};
//!
//! let config = PoolConfig::new(2, 3)?;
//! let pool = ConnectionPool::new(config, factory, params).await?;
//!
//! let handle = pool.acquire().await?;
//! // Use connection...
//! pool.release(handle).await?;
//!
//! pool.close_all().await?;
//! ```

mod config;
mod handle;
mod pool;
mod scope;
mod stats;


pub use config::{PoolConfig, ReleasePolicy};
pub use handle::{ConnectionHandle, HandleId};
pub use pool::{ConnectionFactory, ConnectionPool};
pub use scope::with_pool;
pub use stats::PoolStatus;
