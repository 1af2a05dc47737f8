//! Kafka transport.
//!
//! The consumer runs with auto-commit disabled. [`KafkaOrderSource::acknowledge`] commits the offset after the message,
//! so the group resumes from the first message the pipeline has not finished with.
use std::time::Duration;

use log::*;
use rdkafka::{
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::Message,
    producer::{FutureProducer, FutureRecord},
    ClientConfig,
    Offset,
    TopicPartitionList,
};

use crate::{
    db_types::Order,
    traits::{IncomingMessage, OrderPublisher, OrderSource, QueueError},
};

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Comma-separated list of `host:port` pairs.
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            topic: "orders".to_string(),
            group_id: "order-consumer-group".to_string(),
        }
    }
}

impl KafkaConfig {
    fn consumer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest");
        config
    }

    fn producer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .set("enable.idempotence", "true");
        config
    }
}

//--------------------------------------     Order source      ---------------------------------------------------------
pub struct KafkaOrderSource {
    consumer: StreamConsumer,
}

impl KafkaOrderSource {
    /// Creates the consumer and subscribes it to the configured topic.
    pub fn new(config: &KafkaConfig) -> Result<Self, QueueError> {
        let consumer: StreamConsumer = config
            .consumer_config()
            .create()
            .map_err(|e| QueueError::Connection(format!("Could not create the Kafka consumer. {e}")))?;
        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|e| QueueError::Connection(format!("Could not subscribe to {}. {e}", config.topic)))?;
        info!("📥️ Subscribed to topic {} on {} as {}", config.topic, config.brokers, config.group_id);
        Ok(Self { consumer })
    }
}

impl OrderSource for KafkaOrderSource {
    /// A Kafka subscription is never exhausted, so this only returns `Ok(None)` if the consumer is torn down.
    async fn receive(&mut self) -> Result<Option<IncomingMessage>, QueueError> {
        let message = self.consumer.recv().await.map_err(|e| QueueError::Receive(e.to_string()))?;
        let incoming = IncomingMessage {
            key: message.key().map(|k| String::from_utf8_lossy(k).into_owned()),
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
        };
        trace!("📥️ Received message {}/{}@{}", incoming.topic, incoming.partition, incoming.offset);
        Ok(Some(incoming))
    }

    async fn acknowledge(&mut self, message: &IncomingMessage) -> Result<(), QueueError> {
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(&message.topic, message.partition, Offset::Offset(message.offset + 1))
            .map_err(|e| QueueError::Acknowledge(e.to_string()))?;
        self.consumer.commit(&offsets, CommitMode::Async).map_err(|e| QueueError::Acknowledge(e.to_string()))
    }
}

//--------------------------------------    Order publisher    ---------------------------------------------------------
#[derive(Clone)]
pub struct KafkaOrderPublisher {
    producer: FutureProducer,
    topic: String,
}

impl KafkaOrderPublisher {
    pub fn new(config: &KafkaConfig) -> Result<Self, QueueError> {
        let producer: FutureProducer = config
            .producer_config()
            .create()
            .map_err(|e| QueueError::Connection(format!("Could not create the Kafka producer. {e}")))?;
        info!("📤️ Publishing to topic {} on {}", config.topic, config.brokers);
        Ok(Self { producer, topic: config.topic.clone() })
    }
}

impl OrderPublisher for KafkaOrderPublisher {
    async fn publish(&self, order: &Order) -> Result<(), QueueError> {
        let payload = serde_json::to_vec(order).map_err(|e| QueueError::Encode(e.to_string()))?;
        let record = FutureRecord::to(&self.topic).key(&order.order_uid).payload(&payload);
        let (partition, offset) =
            self.producer.send(record, SEND_TIMEOUT).await.map_err(|(e, _)| QueueError::Publish(e.to_string()))?;
        debug!("📤️ Order [{}] published to {}/{partition}@{offset}", order.order_uid, self.topic);
        Ok(())
    }
}
