//! Connection factory for PostgreSQL-backed pools

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dbpool_connection::ConnectionFactory;
use dbpool_core::{Connection, ConnectionParams, DbPoolError, Result};

use crate::PostgresConnection;

/// Port used when the parameters leave it at 0
pub const DEFAULT_PORT: u16 = 5432;

/// Build a tokio-postgres configuration from pool parameters
///
/// Recognised extra parameters: `application_name` and `connect_timeout`
/// (whole seconds).
pub fn pg_config(params: &ConnectionParams) -> Result<tokio_postgres::Config> {
    let mut config = tokio_postgres::Config::new();

    let host = if params.host.is_empty() {
        "localhost"
    } else {
        params.host.as_str()
    };
    let port = if params.port > 0 { params.port } else { DEFAULT_PORT };
    config
        .host(host)
        .port(port)
        .dbname(params.database.as_deref().unwrap_or("postgres"));

    if let Some(user) = params.username.as_deref() {
        config.user(user);
    }
    if let Some(password) = params.password.as_deref() {
        config.password(password);
    }
    if let Some(name) = params.get_param("application_name") {
        config.application_name(name);
    }
    if let Some(raw) = params.get_param("connect_timeout") {
        let seconds: u64 = raw.parse().map_err(|_| {
            DbPoolError::Configuration(format!("invalid connect_timeout: {}", raw))
        })?;
        config.connect_timeout(Duration::from_secs(seconds));
    }

    Ok(config)
}

/// Opens plain (non-TLS) PostgreSQL sessions for a pool
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresFactory;

impl PostgresFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConnectionFactory for PostgresFactory {
    #[tracing::instrument(skip(self, params), fields(host = %params.host, port = params.port))]
    async fn create(&self, params: &ConnectionParams) -> Result<Arc<dyn Connection>> {
        let config = pg_config(params)?;
        let connection = PostgresConnection::connect(&config).await.map_err(|e| {
            tracing::error!(error = %e, "failed to connect to PostgreSQL database");
            e
        })?;
        Ok(Arc::new(connection))
    }
}
