//! Connection trait

use crate::{QueryResult, Result};
use async_trait::async_trait;

/// A live database session
///
/// Implementations must be shareable across tasks. The pool hands the
/// same connection to at most one caller at a time, but the connection
/// itself may be inspected (`is_closed`) by the pool concurrently.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "postgresql", "mock")
    fn driver_name(&self) -> &str;

    /// Execute a statement that does not return rows (INSERT/UPDATE/DDL)
    ///
    /// Returns the number of affected rows.
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Execute a query that returns rows (SELECT)
    async fn query(&self, sql: &str) -> Result<QueryResult>;

    /// Commit the work done on this session
    async fn commit(&self) -> Result<()>;

    /// Close the physical connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// Whether a statement reads rows, judged by its leading keyword
///
/// Leading whitespace is skipped and the comparison ignores case.
pub fn is_read_statement(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|keyword| keyword.eq_ignore_ascii_case("select"))
}
