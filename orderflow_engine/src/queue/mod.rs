//! # Message queue adapters
//!
//! Implementations of [`crate::traits::OrderSource`] and [`crate::traits::OrderPublisher`].
//!
//! * [`kafka`] is the production transport. Offsets are committed manually, after the pipeline has finished with a
//!   message, so a crash between persist and commit results in redelivery rather than loss.
//! * [`channel`] is an in-process queue over a bounded tokio channel. It behaves like a single-partition topic and is
//!   used in tests and for local runs without a broker.
pub mod channel;
#[cfg(feature = "kafka")]
pub mod kafka;

pub use channel::{channel_queue, ChannelOrderPublisher, ChannelOrderSource};
#[cfg(feature = "kafka")]
pub use kafka::{KafkaConfig, KafkaOrderPublisher, KafkaOrderSource};
