//! PostgreSQL driver for dbpool

mod connection;
mod convert;
mod factory;

pub use connection::PostgresConnection;
pub use factory::{DEFAULT_PORT, PostgresFactory, pg_config};
