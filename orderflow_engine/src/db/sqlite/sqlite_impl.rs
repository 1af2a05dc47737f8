//! `SqliteDatabase` is a concrete implementation of the order store backed by SQLite.
use std::{fmt::Debug, time::Duration};

use log::*;
use sqlx::{migrate, SqlitePool};

use super::{new_pool, orders};
use crate::{
    db_types::{InsertOrderResult, Order},
    traits::{OrderStore, StoreError},
    DEFAULT_TRANSACTION_TIMEOUT,
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
    tx_timeout: Duration,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl OrderStore for SqliteDatabase {
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
        tokio::time::timeout(self.tx_timeout, work).await.map_err(|_| StoreError::Timeout(self.tx_timeout))?
    }

    async fn fetch_order(&self, order_uid: &str) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_uid(order_uid, &mut conn).await
    }

    async fn load_all(&self) -> Result<Vec<Order>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let orders = orders::fetch_all_orders(&mut tx).await?;
        tx.commit().await?;
        Ok(orders)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool, tx_timeout: DEFAULT_TRANSACTION_TIMEOUT })
    }

    /// Sets the deadline for a single `persist` transaction.
    pub fn with_transaction_timeout(mut self, timeout: Duration) -> Self {
        self.tx_timeout = timeout;
        self
    }

    /// Creates the order tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        migrate!("./src/db/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Could not run migrations. {e}")))?;
        info!("🗃️ SQLite migrations complete");
        Ok(())
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
