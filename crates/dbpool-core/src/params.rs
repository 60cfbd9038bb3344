//! Connection parameters forwarded to a factory

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameters for opening a physical connection
///
/// The pool never interprets these; it hands them verbatim to its
/// `ConnectionFactory` every time a new connection is needed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConnectionParams {
    /// Host address
    pub host: String,
    /// Port number (0 for the driver default)
    pub port: u16,
    /// Database name
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Additional driver-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl ConnectionParams {
    /// Create parameters for a server at `host:port`
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            ..Self::default()
        }
    }

    /// Create PostgreSQL-style parameters
    pub fn new_postgres(host: &str, port: u16, database: &str, username: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            database: Some(database.to_string()),
            username: Some(username.to_string()),
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    /// Set an additional parameter
    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }

    /// Get an additional parameter
    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("params", &self.params)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let params =
            ConnectionParams::new_postgres("localhost", 5432, "app", "postgres").with_password("hunter2");
        let rendered = format!("{:?}", params);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_params_roundtrip_through_json() {
        let params = ConnectionParams::new("db.internal", 5431)
            .with_password("secret")
            .with_param("sslmode", "disable");
        let json = serde_json::to_string(&params).expect("serialize");
        let restored: ConnectionParams = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, params);
        assert_eq!(restored.get_param("sslmode"), Some("disable"));
    }
}
