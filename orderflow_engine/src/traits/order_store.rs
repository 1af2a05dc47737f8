use std::{future::Future, time::Duration};

use sqlx::error::ErrorKind;
use thiserror::Error;

use crate::db_types::{InsertOrderResult, Order};

/// This trait defines the behaviour of the durable store of record for orders.
///
/// Implementations are cheap to clone; clones share one connection pool.
pub trait OrderStore: Clone + Send + Sync + 'static {
    /// Checks that the store is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Writes the order, its delivery and payment records and all of its items in a single transaction.
    ///
    /// If an order with the same `order_uid` already exists, the transaction is committed without any further writes
    /// and [`InsertOrderResult::AlreadyExists`] is returned. The existing record is never modified.
    ///
    /// If any write fails, the transaction is rolled back and nothing for this order is visible. The transaction is
    /// bounded by a deadline; when it expires, the call fails with [`StoreError::Timeout`].
    fn persist(&self, order: &Order) -> impl Future<Output = Result<InsertOrderResult, StoreError>> + Send;

    /// Fetches the complete record for a single order.
    fn fetch_order(&self, order_uid: &str) -> impl Future<Output = Result<Option<Order>, StoreError>> + Send;

    /// Reads every stored order, fully populated. Items keep their original order.
    fn load_all(&self) -> impl Future<Output = Result<Vec<Order>, StoreError>> + Send;

    /// Closes the connection pool.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Could not reach the database. {0}")]
    Connection(String),
    #[error("The transaction did not complete within {0:?}")]
    Timeout(Duration),
    #[error("A database constraint was violated. {0}")]
    Constraint(String),
    #[error("Database error. {0}")]
    Database(String),
    #[error("Stored order {0} is incomplete")]
    Corrupt(String),
}

impl StoreError {
    /// Transient failures may succeed if the same call is repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Connection(e.to_string()),
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => Self::Constraint(e.to_string()),
                _ => Self::Database(e.to_string()),
            },
            _ => Self::Database(e.to_string()),
        }
    }
}
