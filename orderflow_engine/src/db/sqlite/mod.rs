//! # SQLite backend
//!
//! Used for local development and the test suite. The schema and statements mirror the Postgres backend.
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod orders;
mod sqlite_impl;

pub use sqlite_impl::SqliteDatabase;

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
