//! Startup reconciliation of the read cache with the store of record.
//!
//! [`warm_up_cache`] must complete before the pipeline starts and before the HTTP server accepts connections. If it
//! fails, the service must not start, since every lookup of a previously stored order would miss.
use log::*;
use thiserror::Error;

use crate::{
    cache::OrderCache,
    traits::{OrderStore, StoreError},
};

#[derive(Debug, Clone, Error)]
pub enum WarmUpError {
    #[error("Could not read orders from the store. {0}")]
    StoreUnavailable(#[from] StoreError),
}

/// Loads every stored order into the cache. Returns the number of orders loaded.
pub async fn warm_up_cache<B: OrderStore>(store: &B, cache: &OrderCache) -> Result<usize, WarmUpError> {
    info!("🔥️ Warming up the order cache");
    let orders = store.load_all().await?;
    let found = orders.len();
    let size = cache.warm_up(orders).await;
    info!("🔥️ Loaded {found} orders. The cache holds {size} orders.");
    Ok(found)
}
