//! # Backend contracts
//!
//! The ingestion pipeline and the warm-up procedure are written against these traits rather than against concrete
//! backends.
//!
//! * [`OrderStore`] is the durable store of record. Writes are idempotent and atomic across the four order tables.
//! * [`OrderSource`] delivers raw order messages from a queue, at least once.
//! * [`OrderPublisher`] puts orders onto the same queue, keyed by `order_uid`.
mod order_store;
mod queue;

pub use order_store::{OrderStore, StoreError};
pub use queue::{IncomingMessage, OrderPublisher, OrderSource, QueueError};
