//! Pulse DB
//!
//! PostgreSQL wire-protocol connection pooling for the analytics store.

mod error;
mod pool;

pub use error::{DbError, Result};
pub use pool::{DbPool, PoolConfig, PoolStats};

/// Re-export tokio-postgres types for convenience
pub use tokio_postgres::{
    types::{FromSql, ToSql},
    Row,
};
