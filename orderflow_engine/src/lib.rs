//! Orderflow Engine
//!
//! The engine ingests orders from a message queue, stores them durably, and keeps an in-memory read cache current so
//! that lookups never touch the database.
//!
//! The library is divided into these sections:
//! 1. The backend contracts ([`mod@traits`]). The pipeline and warm-up are generic over an [`OrderStore`] and an
//!    [`OrderSource`], so the same code runs against Postgres and Kafka in production and against SQLite and an
//!    in-process channel in tests.
//! 2. Durable storage ([`mod@db`]). Postgres and SQLite backends, each writing an order and all its sub-records
//!    idempotently in a single transaction.
//! 3. The read cache ([`mod@cache`]), warmed from the store at startup ([`mod@warm_up`]).
//! 4. Message queue adapters ([`mod@queue`]).
//! 5. The ingestion pipeline ([`mod@pipeline`]) that drives every message through decode, persist and cache update.
use std::time::Duration;

pub mod cache;
pub mod db;
pub mod db_types;
pub mod pipeline;
pub mod queue;
pub mod traits;
pub mod warm_up;

pub use cache::OrderCache;
#[cfg(feature = "postgres")]
pub use db::postgres::PostgresDatabase;
#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use pipeline::{decode_order, DecodeError, IngestionPipeline, PipelineStats};
pub use traits::{IncomingMessage, OrderPublisher, OrderSource, OrderStore, QueueError, StoreError};
pub use warm_up::{warm_up_cache, WarmUpError};

/// The deadline for a single `persist` transaction, unless the backend is configured otherwise.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(5);
