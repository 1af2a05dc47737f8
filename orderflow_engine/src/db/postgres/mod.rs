//! # Postgres backend
//!
//! The production store of record.
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, Error as SqlxError, PgPool};

pub mod orders;
mod postgres_impl;

pub use postgres_impl::PostgresDatabase;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn new_pool(url: &str, max_connections: u32) -> Result<PgPool, SqlxError> {
    let pool =
        PgPoolOptions::new().max_connections(max_connections).acquire_timeout(ACQUIRE_TIMEOUT).connect(url).await?;
    Ok(pool)
}
