//! Runner configuration from the environment
//!
//! Values come from the process environment after an optional `.env` file
//! in the working directory is loaded.

use anyhow::Context;
use dbpool_connection::PoolConfig;
use dbpool_core::ConnectionParams;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_MIN_CONNECTIONS: usize = 2;
const DEFAULT_MAX_CONNECTIONS: usize = 3;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub params: ConnectionParams,
    pub pool: PoolConfig,
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded environment file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| lookup(key).with_context(|| format!("{} must be set", key));

        let user = required("POSTGRES_USER")?;
        let password = required("POSTGRES_PASSWORD")?;
        let database = required("POSTGRES_DB")?;
        let port: u16 = required("POSTGRES_PORT")?
            .parse()
            .context("POSTGRES_PORT must be a port number")?;
        let host = lookup("POSTGRES_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let size = |key: &str, default: usize| -> anyhow::Result<usize> {
            match lookup(key) {
                Some(raw) => raw
                    .parse()
                    .with_context(|| format!("{} must be a non-negative integer", key)),
                None => Ok(default),
            }
        };
        let min = size("DBPOOL_MIN", DEFAULT_MIN_CONNECTIONS)?;
        let max = size("DBPOOL_MAX", DEFAULT_MAX_CONNECTIONS)?;

        Ok(Self {
            params: ConnectionParams::new_postgres(&host, port, &database, &user)
                .with_password(&password)
                .with_param("application_name", "dbpool"),
            pool: PoolConfig::new(min, max).context("invalid pool size")?,
        })
    }
}
