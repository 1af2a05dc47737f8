use std::sync::{
    atomic::{AtomicI64, AtomicU64, Ordering},
    Arc,
};

use log::*;
use tokio::sync::mpsc;

use crate::{
    db_types::Order,
    traits::{IncomingMessage, OrderPublisher, OrderSource, QueueError},
};

/// Creates a connected publisher/source pair. The source is exhausted once every clone of the publisher has been
/// dropped and the buffer has drained.
pub fn channel_queue(buffer: usize, topic: &str) -> (ChannelOrderPublisher, ChannelOrderSource) {
    let (tx, rx) = mpsc::channel(buffer);
    let publisher = ChannelOrderPublisher { tx, topic: Arc::from(topic), next_offset: Arc::new(AtomicI64::new(0)) };
    let source = ChannelOrderSource { rx, acknowledged: Arc::new(AtomicU64::new(0)) };
    (publisher, source)
}

#[derive(Clone)]
pub struct ChannelOrderPublisher {
    tx: mpsc::Sender<IncomingMessage>,
    topic: Arc<str>,
    next_offset: Arc<AtomicI64>,
}

impl ChannelOrderPublisher {
    /// Sends an arbitrary payload. Nothing is checked, so this can put malformed messages on the queue.
    pub async fn publish_raw(&self, key: Option<String>, payload: Vec<u8>) -> Result<(), QueueError> {
        let offset = self.next_offset.fetch_add(1, Ordering::SeqCst);
        let message = IncomingMessage { key, payload, topic: self.topic.to_string(), partition: 0, offset };
        self.tx.send(message).await.map_err(|_| QueueError::Closed)?;
        trace!("📤️ Message {offset} queued on {}", self.topic);
        Ok(())
    }
}

impl OrderPublisher for ChannelOrderPublisher {
    async fn publish(&self, order: &Order) -> Result<(), QueueError> {
        let payload = serde_json::to_vec(order).map_err(|e| QueueError::Encode(e.to_string()))?;
        self.publish_raw(Some(order.order_uid.clone()), payload).await
    }
}

pub struct ChannelOrderSource {
    rx: mpsc::Receiver<IncomingMessage>,
    acknowledged: Arc<AtomicU64>,
}

impl ChannelOrderSource {
    /// A shared counter of acknowledged messages. It stays readable after the source has been moved into a pipeline.
    pub fn ack_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.acknowledged)
    }
}

impl OrderSource for ChannelOrderSource {
    async fn receive(&mut self) -> Result<Option<IncomingMessage>, QueueError> {
        Ok(self.rx.recv().await)
    }

    async fn acknowledge(&mut self, message: &IncomingMessage) -> Result<(), QueueError> {
        self.acknowledged.fetch_add(1, Ordering::SeqCst);
        trace!("📥️ Message {} on {} acknowledged", message.offset, message.topic);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn messages_arrive_in_order() {
        let (publisher, mut source) = channel_queue(4, "orders");
        publisher.publish_raw(Some("a".into()), b"first".to_vec()).await.unwrap();
        publisher.publish_raw(None, b"second".to_vec()).await.unwrap();
        drop(publisher);

        let first = source.receive().await.unwrap().expect("first message");
        assert_eq!(first.payload, b"first");
        assert_eq!(first.key.as_deref(), Some("a"));
        assert_eq!(first.offset, 0);
        assert_eq!(first.topic, "orders");
        let second = source.receive().await.unwrap().expect("second message");
        assert_eq!(second.offset, 1);
        assert!(source.receive().await.unwrap().is_none());

        let acks = source.ack_counter();
        source.acknowledge(&first).await.unwrap();
        assert_eq!(acks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn publishing_to_a_closed_queue_fails() {
        let (publisher, source) = channel_queue(1, "orders");
        drop(source);
        let err = publisher.publish_raw(None, vec![]).await.unwrap_err();
        assert!(matches!(err, QueueError::Closed));
    }
}
