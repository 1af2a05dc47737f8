//! # Read cache
//!
//! [`OrderCache`] is the in-memory map from `order_uid` to [`Order`] that serves every lookup once the service is
//! running. It is filled once from the store at startup ([`OrderCache::warm_up`]) and then kept current by the
//! ingestion pipeline ([`OrderCache::put`]).
//!
//! The map is guarded by a fair, async read/write lock. Any number of readers proceed together; a writer excludes
//! every other reader and writer for the duration of one mutation. Waiters are served in arrival order, so a stream
//! of readers cannot starve the pipeline.
//!
//! The cache has no eviction, no TTL, and no size bound. It lives for the lifetime of the process.
use std::{collections::HashMap, sync::Arc};

use log::*;
use tokio::sync::RwLock;

use crate::db_types::Order;

/// Clones are cheap and share the same underlying map.
#[derive(Clone, Default)]
pub struct OrderCache {
    entries: Arc<RwLock<HashMap<String, Arc<Order>>>>,
}

impl std::fmt::Debug for OrderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderCache")
    }
}

impl OrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the entry for `order_uid`, if there is one.
    pub async fn get(&self, order_uid: &str) -> Option<Arc<Order>> {
        let entries = self.entries.read().await;
        entries.get(order_uid).cloned()
    }

    /// Inserts the order under its `order_uid`, replacing any existing entry. Returns the replaced entry.
    ///
    /// When this returns, the new entry is visible to every subsequent [`Self::get`] on any task.
    pub async fn put(&self, order: Order) -> Option<Arc<Order>> {
        let key = order.order_uid.clone();
        let order = Arc::new(order);
        let mut entries = self.entries.write().await;
        let previous = entries.insert(key, order);
        trace!("🧊️ Cache now holds {} orders", entries.len());
        previous
    }

    /// Bulk-loads orders. Call this before the pipeline and the HTTP server start. Returns the number of entries in the
    /// cache afterwards.
    pub async fn warm_up<I>(&self, orders: I) -> usize
    where I: IntoIterator<Item = Order> {
        let mut entries = self.entries.write().await;
        let mut loaded = 0usize;
        for order in orders {
            entries.insert(order.order_uid.clone(), Arc::new(order));
            loaded += 1;
        }
        debug!("🧊️ Warm-up loaded {loaded} orders. The cache holds {} orders", entries.len());
        entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::db_types::{Delivery, Item, Payment};

    fn order(uid: &str, chrt_id: i64) -> Order {
        Order {
            order_uid: uid.to_string(),
            track_number: "WBILMTESTTRACK".into(),
            entry: "WBIL".into(),
            delivery: Delivery::default(),
            payment: Payment::default(),
            items: vec![Item {
                chrt_id,
                track_number: "WBILMTESTTRACK".into(),
                price: 453,
                rid: "ab4219087a764ae0btest".into(),
                name: "Mascaras".into(),
                sale: 30,
                size: "0".into(),
                total_price: 317,
                nm_id: 2389212,
                brand: "Vivienne Sabo".into(),
                status: 202,
            }],
            locale: "en".into(),
            internal_signature: String::default(),
            customer_id: "test".into(),
            delivery_service: "meest".into(),
            shardkey: "9".into(),
            sm_id: 99,
            date_created: Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap(),
            oof_shard: "1".into(),
        }
    }

    #[tokio::test]
    async fn get_and_put() {
        let cache = OrderCache::new();
        assert!(cache.get("A1").await.is_none());
        assert!(cache.put(order("A1", 1)).await.is_none());
        let found = cache.get("A1").await.expect("A1 is cached");
        assert_eq!(found.items[0].chrt_id, 1);
        let replaced = cache.put(order("A1", 2)).await.expect("A1 was cached");
        assert_eq!(replaced.items[0].chrt_id, 1);
        assert_eq!(cache.get("A1").await.unwrap().items[0].chrt_id, 2);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn warm_up_loads_everything() {
        let cache = OrderCache::new();
        let count = cache.warm_up((0..50).map(|i| order(&format!("order-{i}"), i))).await;
        assert_eq!(count, 50);
        for i in 0..50 {
            assert!(cache.get(&format!("order-{i}")).await.is_some());
        }
        assert!(cache.get("order-50").await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn writes_are_visible_to_concurrent_readers() {
        let cache = OrderCache::new();
        let reader_cache = cache.clone();
        let reader = tokio::spawn(async move {
            loop {
                if let Some(order) = reader_cache.get("A1").await {
                    return order;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });
        let readers = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    for _ in 0..100 {
                        let _ = cache.get("A1").await;
                    }
                })
            })
            .collect::<Vec<_>>();
        cache.put(order("A1", 7)).await;
        let seen = tokio::time::timeout(Duration::from_secs(5), reader).await.expect("reader timed out").unwrap();
        assert_eq!(seen.items[0].chrt_id, 7);
        for r in readers {
            r.await.unwrap();
        }
    }
}
