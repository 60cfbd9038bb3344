//! Pool tests against a running PostgreSQL server
//!
//! Ignored by default. Run with the `POSTGRES_*` variables pointing at a
//! scratch database:
//!
//! ```text
//! POSTGRES_USER=postgres_usr POSTGRES_PASSWORD=postgres_pass POSTGRES_DB=postgres_db \
//!     POSTGRES_PORT=5431 cargo test -p dbpool-driver-postgres -- --ignored
//! ```

use std::sync::Arc;

use dbpool_connection::{ConnectionPool, PoolConfig, PoolStatus};
use dbpool_core::{ConnectionParams, DbPoolError, Value};
use dbpool_driver_postgres::PostgresFactory;
use pretty_assertions::assert_eq;

const MIN_CONNECTIONS: usize = 5;
const MAX_CONNECTIONS: usize = 10;

fn params_from_env() -> ConnectionParams {
    let var = |name: &str| std::env::var(name).unwrap_or_else(|_| panic!("{name} must be set"));
    let port = var("POSTGRES_PORT").parse().expect("POSTGRES_PORT must be a port number");
    let host = std::env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_string());

    ConnectionParams::new_postgres(&host, port, &var("POSTGRES_DB"), &var("POSTGRES_USER"))
        .with_password(&var("POSTGRES_PASSWORD"))
        .with_param("application_name", "dbpool-live-tests")
}

async fn live_pool() -> Arc<ConnectionPool> {
    Arc::new(
        ConnectionPool::new(
            PoolConfig::new(MIN_CONNECTIONS, MAX_CONNECTIONS).unwrap(),
            PostgresFactory::new(),
            params_from_env(),
        )
        .await
        .expect("connect to PostgreSQL"),
    )
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL server"]
async fn test_live_pool_lifecycle() {
    let pool = live_pool().await;
    assert_eq!(pool.status(), PoolStatus::new(MIN_CONNECTIONS, 0, 0));

    let mut held = Vec::new();
    for _ in 0..MAX_CONNECTIONS {
        held.push(pool.acquire().await.expect("acquire"));
    }
    assert!(matches!(
        pool.acquire().await,
        Err(DbPoolError::PoolExhausted { .. })
    ));

    for handle in held.drain(..) {
        pool.release(handle).await.expect("release");
    }
    assert_eq!(pool.status(), PoolStatus::new(MIN_CONNECTIONS, 0, 0));

    pool.close_all().await.expect("close all");
    assert_eq!(pool.status(), PoolStatus::new(0, 0, 0));
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL server"]
async fn test_live_execute_query_round_trip() {
    let pool = live_pool().await;

    pool.execute_query("CREATE TEMP TABLE IF NOT EXISTS dbpool_probe (id SERIAL PRIMARY KEY, name VARCHAR)")
        .await
        .expect("create");

    let result = pool
        .execute_query("SELECT 1::int4 AS one, 'Kamil'::varchar AS name, 12.50::numeric(5,2) AS amount")
        .await
        .expect("select")
        .expect("rows");
    assert_eq!(result.row_count(), 1);
    let row = &result.rows[0];
    assert_eq!(row.get_by_name("one"), Some(&Value::Int32(1)));
    assert_eq!(row.get_by_name("name"), Some(&Value::String("Kamil".into())));
    assert_eq!(row.get_by_name("amount"), Some(&Value::Decimal("12.50".into())));

    // a failed statement leaves the connection usable for the next caller
    assert!(pool.execute_query("SELECT * FROM missing_table").await.is_err());
    assert!(pool.execute_query("SELECT 1").await.expect("select").is_some());

    pool.close_all().await.expect("close all");
}
