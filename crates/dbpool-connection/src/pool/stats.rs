//! Pool status snapshot

use serde::{Deserialize, Serialize};

/// Counts of a pool's connections taken at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Idle connections ready to be handed out
    available: usize,
    /// Connections currently checked out by callers
    in_use: usize,
    /// Connections being opened by the factory right now
    opening: usize,
}

impl PoolStatus {
    pub fn new(available: usize, in_use: usize, opening: usize) -> Self {
        Self {
            available,
            in_use,
            opening,
        }
    }

    /// Get the number of idle connections
    pub fn available(&self) -> usize {
        self.available
    }

    /// Get the number of checked-out connections
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Get the number of connections still being opened
    pub fn opening(&self) -> usize {
        self.opening
    }

    /// Live connections (idle + in use)
    pub fn total(&self) -> usize {
        self.available + self.in_use
    }

    /// Fraction of live connections that are checked out (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.in_use as f64 / self.total() as f64
        }
    }
}

impl std::fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "available: {}, in use: {}, opening: {}",
            self.available, self.in_use, self.opening
        )
    }
}
