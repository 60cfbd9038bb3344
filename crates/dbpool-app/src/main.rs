//! dbpool runner
//!
//! Connects to the PostgreSQL server named by the `POSTGRES_*` variables and
//! walks a pool through its lifecycle: pre-warm, checkout up to the
//! ceiling, exhaustion, release, a query, shutdown and a scoped pool.

mod config;
mod logging;

use std::sync::Arc;

use anyhow::Context;
use dbpool_connection::{
    BackoffStrategy, ConnectionPool, PoolConfig, PoolRegistry, RetryPolicy, acquire_with_retry,
    with_pool,
};
use dbpool_core::{DbPoolError, QueryResult};
use dbpool_driver_postgres::PostgresFactory;

use crate::config::AppConfig;

const MAIN_POOL: &str = "main";

const SETUP_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS table1 (id SERIAL PRIMARY KEY, name VARCHAR)",
    "CREATE TABLE IF NOT EXISTS table2 (id SERIAL PRIMARY KEY, name VARCHAR)",
    "INSERT INTO table1 (name) SELECT 'Kamil' WHERE NOT EXISTS (SELECT 1 FROM table1)",
    "INSERT INTO table2 (name) SELECT 'John' WHERE NOT EXISTS (SELECT 1 FROM table2)",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = logging::init_default() {
        // Logging is not up yet
        eprintln!("FATAL: Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    let config = AppConfig::load().context("failed to load configuration")?;
    let registry = PoolRegistry::global();

    let outcome = run(&config, registry).await;

    if let Err(e) = registry.close_all().await {
        tracing::warn!(error = %e, "failed to close pools on shutdown");
    }
    outcome
}

async fn run(config: &AppConfig, registry: &PoolRegistry) -> anyhow::Result<()> {
    tracing::info!(params = ?config.params, "starting");

    let pool = registry
        .get_or_connect(MAIN_POOL, config.pool.clone(), PostgresFactory::new(), config.params.clone())
        .await
        .context("failed to create the main pool")?;

    // A second lookup under the same name hands back the same pool
    let again = registry
        .get_or_connect(MAIN_POOL, PoolConfig::new(1, 5)?, PostgresFactory::new(), config.params.clone())
        .await?;
    tracing::info!(
        identical = Arc::ptr_eq(&pool, &again),
        min_size = again.config().min_size(),
        max_size = again.config().max_size(),
        "looked up main pool twice"
    );

    for statement in SETUP_STATEMENTS {
        pool.execute_query(statement)
            .await
            .with_context(|| format!("setup statement failed: {}", statement))?;
    }

    walk_through(&pool).await?;

    registry.close(MAIN_POOL).await?;
    tracing::info!(status = %pool.status(), closed = pool.is_closed(), "main pool closed");

    scoped_pool(config).await
}

/// Check out every slot, hit the ceiling, then hand everything back
async fn walk_through(pool: &ConnectionPool) -> anyhow::Result<()> {
    let mut held = Vec::new();
    for n in 1..=pool.config().max_size() {
        let handle = pool.acquire().await?;
        tracing::info!(n, handle = %handle.id(), status = %pool.status(), "checked out connection");
        held.push(handle);
    }

    match pool.acquire().await {
        Err(DbPoolError::PoolExhausted { max_size }) => {
            tracing::info!(max_size, "pool exhausted as expected")
        }
        Err(e) => return Err(e.into()),
        Ok(handle) => {
            tracing::warn!(handle = %handle.id(), "pool handed out a connection past its ceiling");
            pool.release(handle).await?;
        }
    }

    if let Some(last) = held.pop() {
        pool.release(last).await?;
        tracing::info!(status = %pool.status(), "returned last connection");
    }

    let result = pool.execute_query("SELECT * FROM table1;").await?;
    log_rows("table1", result.as_ref());
    tracing::info!(status = %pool.status(), "after query");

    while let Some(handle) = held.pop() {
        pool.release(handle).await?;
    }
    tracing::info!(status = %pool.status(), "returned all connections");
    Ok(())
}

/// A pool that lives only for one block and is closed on the way out
async fn scoped_pool(config: &AppConfig) -> anyhow::Result<()> {
    let retry = RetryPolicy::new(3, BackoffStrategy::default().with_jitter(true));

    let pool = with_pool(
        PoolConfig::new(3, 5)?,
        PostgresFactory::new(),
        config.params.clone(),
        |pool| async move {
            let first = acquire_with_retry(&pool, &retry).await?;
            let second = acquire_with_retry(&pool, &retry).await?;
            tracing::info!(status = %pool.status(), "scoped pool in use");

            let rows = first.query("SELECT * FROM table2").await;
            pool.release(first).await?;
            pool.release(second).await?;
            log_rows("table2", Some(&rows?));

            tracing::info!(status = %pool.status(), "scoped pool idle");
            Ok(pool)
        },
    )
    .await?;

    tracing::info!(status = %pool.status(), closed = pool.is_closed(), "scoped pool finished");
    Ok(())
}

fn log_rows(table: &str, result: Option<&QueryResult>) {
    let Some(result) = result else {
        return;
    };
    if !result.has_rows() {
        tracing::info!(table, "query returned no rows");
        return;
    }
    for row in &result.rows {
        let values: Vec<String> = row.values.iter().map(ToString::to_string).collect();
        tracing::info!(table, row = %values.join(", "), "query row");
    }
    tracing::info!(table, rows = result.row_count(), elapsed_ms = result.execution_time_ms, "query result");
}
