//! Retrying acquisition for callers that prefer to wait
//!
//! The pool itself never queues callers. When a caller would rather wait
//! for a connection than fail fast, it can wrap `acquire` in
//! [`acquire_with_retry`], which backs off exponentially between attempts
//! and only retries on `DbPoolError::PoolExhausted`.
//!
//! # Example
//!
//! ```ignore
//! use dbpool_connection::retry::{BackoffStrategy, RetryPolicy, acquire_with_retry};
//!
//! let policy = RetryPolicy::new(5, BackoffStrategy::new(50, 2_000).with_jitter(true));
//! let handle = acquire_with_retry(&pool, &policy).await?;
//! ```

mod backoff;


pub use backoff::BackoffStrategy;

use dbpool_core::Result;

use crate::pool::{ConnectionHandle, ConnectionPool};

/// How many times to retry an exhausted pool, and how long to wait
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = behave like plain `acquire`)
    max_retries: u32,
    backoff: BackoffStrategy,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: BackoffStrategy) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff(&self) -> &BackoffStrategy {
        &self.backoff
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, BackoffStrategy::default())
    }
}

/// Acquire a connection, retrying while the pool is exhausted
///
/// Any other error (connect failure, closed pool) is returned immediately.
pub async fn acquire_with_retry(
    pool: &ConnectionPool,
    policy: &RetryPolicy,
) -> Result<ConnectionHandle> {
    let mut attempt = 0u32;
    loop {
        match pool.acquire().await {
            Ok(handle) => return Ok(handle),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.backoff.calculate_delay(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "pool exhausted, backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
