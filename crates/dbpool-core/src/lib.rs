//! dbpool core - shared abstractions for the connection pool
//!
//! This crate provides the traits and types the pool and the drivers
//! agree on:
//!
//! - `Connection` - the capability of one live database session
//! - `ConnectionParams` - opaque parameters forwarded to a connection factory
//! - `DbPoolError` - the error taxonomy shared by every crate
//! - Result types like `Value`, `Row` and `QueryResult`

mod connection;
mod error;
mod params;
mod types;

pub use connection::*;
pub use error::*;
pub use params::*;
pub use types::*;
