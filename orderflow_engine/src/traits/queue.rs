use std::future::Future;

use thiserror::Error;

use crate::db_types::Order;

/// A raw message taken off the order queue. The payload is opaque until the pipeline decodes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// A stream of order messages with at-least-once delivery.
pub trait OrderSource: Send + 'static {
    /// Waits for the next message. `Ok(None)` means the source is exhausted and will never yield another message.
    fn receive(&mut self) -> impl Future<Output = Result<Option<IncomingMessage>, QueueError>> + Send;

    /// Marks the message as handled, so that it is not delivered again to this consumer group.
    fn acknowledge(&mut self, message: &IncomingMessage) -> impl Future<Output = Result<(), QueueError>> + Send;
}

/// Publishes orders to the queue that [`OrderSource`] consumes. Messages are keyed by `order_uid`.
pub trait OrderPublisher: Clone + Send + Sync + 'static {
    fn publish(&self, order: &Order) -> impl Future<Output = Result<(), QueueError>> + Send;
}

#[derive(Debug, Clone, Error)]
pub enum QueueError {
    #[error("Could not connect to the message queue. {0}")]
    Connection(String),
    #[error("Could not receive a message. {0}")]
    Receive(String),
    #[error("Could not publish a message. {0}")]
    Publish(String),
    #[error("Could not acknowledge a message. {0}")]
    Acknowledge(String),
    #[error("Could not encode the order. {0}")]
    Encode(String),
    #[error("The queue has been closed")]
    Closed,
}
