//! # Ingestion pipeline
//!
//! [`IngestionPipeline`] takes one message at a time off an [`OrderSource`] and drives it through
//! Receive → Decode → Persist → CacheUpdate before fetching the next. Messages from one source are therefore handled
//! strictly in order.
//!
//! Failure handling per message:
//! * A payload that does not decode into a valid [`Order`] is logged and dropped. It is never retried.
//! * A retryable store error is retried with exponential backoff, up to [`RetryPolicy::attempts`] attempts in total.
//!   Anything else, or running out of attempts, logs the error and drops the message.
//! * An order that is already stored is a successful no-op.
//!
//! The cache is only written after the store has committed the order. Every message is acknowledged once the pipeline
//! is finished with it, whatever the outcome, except when shutdown interrupts a retry. Such a message is left
//! unacknowledged so that the queue redelivers it.
//!
//! The pipeline stops when its [`CancellationToken`] is cancelled or when the source is exhausted. A cancelled
//! pipeline never starts on a new message, but lets an in-flight store transaction run to completion.
use std::{fmt::Display, time::Duration};

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use log::*;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{
    cache::OrderCache,
    db_types::{InsertOrderResult, Order, OrderValidationError},
    traits::{IncomingMessage, OrderSource, OrderStore},
};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("The payload is not a valid order. {0}")]
    Json(#[from] serde_json::Error),
    #[error("The order is invalid. {0}")]
    Invalid(#[from] OrderValidationError),
}

/// Deserializes a message payload into an [`Order`] and checks it.
pub fn decode_order(payload: &[u8]) -> Result<Order, DecodeError> {
    let order: Order = serde_json::from_slice(payload)?;
    order.validate()?;
    Ok(order)
}

//--------------------------------------      RetryPolicy      ---------------------------------------------------------
const RECEIVE_BACKOFF_STEPS: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of persist attempts for one message, including the first. Zero is treated as one.
    pub attempts: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 3, min_delay: Duration::from_millis(100), max_delay: Duration::from_secs(2) }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.attempts.saturating_sub(1))
            .with_jitter()
            .build()
    }

    /// Backoff for receive errors. Once it runs out, the source is retried every `max_delay` for as long as the
    /// pipeline runs.
    fn receive_backoff(&self) -> ExponentialBackoff {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(RECEIVE_BACKOFF_STEPS)
            .with_jitter()
            .build()
    }
}

//--------------------------------------     PipelineStats     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub received: u64,
    pub persisted: u64,
    pub duplicates: u64,
    pub malformed: u64,
    pub failed: u64,
}

impl Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "received: {}, persisted: {}, duplicates: {}, malformed: {}, failed: {}",
            self.received, self.persisted, self.duplicates, self.malformed, self.failed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Persisted,
    Duplicate,
    Malformed,
    Failed,
    /// Shutdown interrupted a retry. The message must not be acknowledged.
    Abandoned,
}

//--------------------------------------  IngestionPipeline    ---------------------------------------------------------
pub struct IngestionPipeline<B, S> {
    store: B,
    source: S,
    cache: OrderCache,
    shutdown: CancellationToken,
    retry: RetryPolicy,
}

impl<B, S> IngestionPipeline<B, S>
where
    B: OrderStore,
    S: OrderSource,
{
    pub fn new(store: B, source: S, cache: OrderCache, shutdown: CancellationToken) -> Self {
        Self { store, source, cache, shutdown, retry: RetryPolicy::default() }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Runs until the shutdown token is cancelled or the source is exhausted.
    pub async fn run(mut self) -> PipelineStats {
        let mut stats = PipelineStats::default();
        let mut receive_backoff = self.retry.receive_backoff();
        info!("📥️ Ingestion pipeline started");
        loop {
            let received = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("📥️ Shutdown requested. Ingestion pipeline is stopping.");
                    break;
                },
                received = self.source.receive() => received,
            };
            let message = match received {
                Ok(Some(message)) => message,
                Ok(None) => {
                    info!("📥️ The order source is exhausted. Ingestion pipeline is stopping.");
                    break;
                },
                Err(e) => {
                    let delay = receive_backoff.next().unwrap_or(self.retry.max_delay);
                    warn!("📥️ Could not receive from the order source. Retrying in {delay:?}. {e}");
                    if !self.sleep_unless_cancelled(delay).await {
                        break;
                    }
                    continue;
                },
            };
            receive_backoff = self.retry.receive_backoff();
            stats.received += 1;
            let outcome = self.handle(&message).await;
            match outcome {
                Outcome::Persisted => stats.persisted += 1,
                Outcome::Duplicate => stats.duplicates += 1,
                Outcome::Malformed => stats.malformed += 1,
                Outcome::Failed | Outcome::Abandoned => stats.failed += 1,
            }
            if outcome == Outcome::Abandoned {
                info!("📥️ Message {}@{} left for redelivery", message.topic, message.offset);
                break;
            }
            if let Err(e) = self.source.acknowledge(&message).await {
                warn!(
                    "📥️ Could not acknowledge message {}@{}. It may be redelivered. {e}",
                    message.topic, message.offset
                );
            }
        }
        info!("📥️ Ingestion pipeline stopped. {stats}");
        stats
    }

    async fn handle(&self, message: &IncomingMessage) -> Outcome {
        let order = match decode_order(&message.payload) {
            Ok(order) => order,
            Err(e) => {
                warn!(
                    "📥️ Dropping malformed message {}/{}@{} (key {:?}). {e}",
                    message.topic, message.partition, message.offset, message.key
                );
                return Outcome::Malformed;
            },
        };
        debug!("📥️ Received order {order}");
        let outcome = self.persist_with_retry(&order).await;
        match outcome {
            Outcome::Persisted => {
                self.cache.put(order).await;
            },
            Outcome::Duplicate => self.cache_stored_copy(&order.order_uid).await,
            _ => {},
        }
        outcome
    }

    async fn persist_with_retry(&self, order: &Order) -> Outcome {
        let mut backoff = self.retry.backoff();
        let mut attempt = 1;
        loop {
            match self.store.persist(order).await {
                Ok(InsertOrderResult::Inserted) => {
                    info!("📥️ Order [{}] persisted", order.order_uid);
                    return Outcome::Persisted;
                },
                Ok(InsertOrderResult::AlreadyExists) => {
                    info!("📥️ Order [{}] was already stored. Ignoring the duplicate.", order.order_uid);
                    return Outcome::Duplicate;
                },
                Err(e) if e.is_retryable() => match backoff.next() {
                    Some(delay) => {
                        warn!(
                            "📥️ Attempt {attempt} to persist order [{}] failed. Retrying in {delay:?}. {e}",
                            order.order_uid
                        );
                        if !self.sleep_unless_cancelled(delay).await {
                            return Outcome::Abandoned;
                        }
                        attempt += 1;
                    },
                    None => {
                        error!("📥️ Giving up on order [{}] after {attempt} attempts. {e}", order.order_uid);
                        return Outcome::Failed;
                    },
                },
                Err(e) => {
                    error!("📥️ Could not persist order [{}]. Dropping it. {e}", order.order_uid);
                    return Outcome::Failed;
                },
            }
        }
    }

    /// A duplicate never overwrites the cache. If the order is stored but not cached, the stored copy is cached.
    async fn cache_stored_copy(&self, order_uid: &str) {
        if self.cache.get(order_uid).await.is_some() {
            return;
        }
        match self.store.fetch_order(order_uid).await {
            Ok(Some(stored)) => {
                self.cache.put(stored).await;
            },
            Ok(None) => warn!("📥️ Order [{order_uid}] was reported as stored, but could not be found"),
            Err(e) => warn!("📥️ Could not read back order [{order_uid}]. {e}"),
        }
    }

    /// Returns `false` if the pipeline was cancelled before the delay elapsed.
    async fn sleep_unless_cancelled(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
