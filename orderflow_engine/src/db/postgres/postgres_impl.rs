//! `PostgresDatabase` is the production implementation of the order store.
use std::{fmt::Debug, time::Duration};

use log::*;
use sqlx::{migrate, PgPool};

use super::{new_pool, orders};
use crate::{
    db_types::{InsertOrderResult, Order},
    traits::{OrderStore, StoreError},
    DEFAULT_TRANSACTION_TIMEOUT,
};

/// A handle to the Postgres connection pool. Clones share the pool, so construct one at startup and pass clones to
/// whoever needs one.
#[derive(Clone)]
pub struct PostgresDatabase {
    pool: PgPool,
    tx_timeout: Duration,
}

impl Debug for PostgresDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "PostgresDatabase ({:?})", self.pool)
    }
}

impl OrderStore for PostgresDatabase {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn persist(&self, order: &Order) -> Result<InsertOrderResult, StoreError> {
        let work = async {
            let mut tx = self.pool.begin().await?;
            match orders::idempotent_insert(order, &mut tx).await {
                Ok(result) => {
                    tx.commit().await?;
                    Ok(result)
                },
                Err(e) => {
                    warn!("🗃️ Rolling back order [{}]. {e}", order.order_uid);
                    if let Err(rollback_err) = tx.rollback().await {
                        error!("🗃️ Rollback of order [{}] failed. {rollback_err}", order.order_uid);
                    }
                    Err(e)
                },
            }
        };
        // Dropping an unfinished transaction rolls it back, so an expired deadline leaves nothing behind.
        tokio::time::timeout(self.tx_timeout, work).await.map_err(|_| StoreError::Timeout(self.tx_timeout))?
    }

    async fn fetch_order(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_uid(order_uid, &mut conn).await
    }

    async fn load_all(&self) -> Result<Vec<Order>, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY").execute(&mut *tx).await?;
        let orders = orders::fetch_all_orders(&mut tx).await?;
        tx.commit().await?;
        Ok(orders)
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("🗃️ Database connection closed");
    }
}

impl PostgresDatabase {
    /// Connects to the database at `url`. The URL is never logged, since it usually carries credentials.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        trace!("Creating new database connection pool with {max_connections} connections");
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { pool, tx_timeout: DEFAULT_TRANSACTION_TIMEOUT })
    }

    /// Sets the deadline for a single `persist` transaction.
    pub fn with_transaction_timeout(mut self, timeout: Duration) -> Self {
        self.tx_timeout = timeout;
        self
    }

    /// Creates the order tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        migrate!("./src/db/postgres/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Could not run migrations. {e}")))?;
        info!("🗃️ Tables created or already exist");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
