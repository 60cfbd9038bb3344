//! Pool configuration types

use dbpool_core::{DbPoolError, Result};
use serde::{Deserialize, Serialize};

/// What happens to a connection when a caller returns it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePolicy {
    /// Keep the connection idle only while the idle set is below
    /// `min_size`; close it otherwise. The pool shrinks back to its warm
    /// floor after a burst.
    #[default]
    FloorPreserving,
    /// Always keep the connection idle. The live count never drops below
    /// its high-water mark until `close_all`.
    AlwaysIdle,
}

/// Configuration for a connection pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of connections opened up front and kept warm
    min_size: usize,
    /// Maximum number of simultaneously live connections
    max_size: usize,
    #[serde(default)]
    release_policy: ReleasePolicy,
}

impl PoolConfig {
    /// Create a new pool configuration with the given min and max sizes
    ///
    /// Fails with `DbPoolError::Configuration` if `min_size > max_size`.
    pub fn new(min_size: usize, max_size: usize) -> Result<Self> {
        if min_size > max_size {
            return Err(DbPoolError::Configuration(format!(
                "min_size ({}) cannot exceed max_size ({})",
                min_size, max_size
            )));
        }

        Ok(Self {
            min_size,
            max_size,
            release_policy: ReleasePolicy::default(),
        })
    }

    /// Set the release policy
    pub fn with_release_policy(mut self, policy: ReleasePolicy) -> Self {
        self.release_policy = policy;
        self
    }

    /// Get the minimum pool size
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Get the maximum pool size
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn release_policy(&self) -> ReleasePolicy {
        self.release_policy
    }

    /// Re-check the size invariant, e.g. after deserializing
    pub fn validate(&self) -> Result<()> {
        Self::new(self.min_size, self.max_size).map(|_| ())
    }
}

impl Default for PoolConfig {
    /// Defaults: min_size 1, max_size 10, floor-preserving release
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 10,
            release_policy: ReleasePolicy::default(),
        }
    }
}
