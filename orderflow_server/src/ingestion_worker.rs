use log::*;
use orderflow_engine::{pipeline::RetryPolicy, IngestionPipeline, OrderCache, OrderSource, OrderStore, PipelineStats};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Starts the ingestion pipeline on its own task.
///
/// The task runs until `shutdown` is cancelled (or the source is exhausted). Cancel the token, then await the handle
/// to collect the pipeline's statistics.
pub fn start_ingestion_worker<B, S>(
    store: B,
    source: S,
    cache: OrderCache,
    retry: RetryPolicy,
    shutdown: CancellationToken,
) -> JoinHandle<PipelineStats>
where
    B: OrderStore,
    S: OrderSource + Sync,
{
    tokio::spawn(async move {
        info!("📥️ Ingestion worker started");
        let stats = IngestionPipeline::new(store, source, cache, shutdown).with_retry_policy(retry).run().await;
        info!("📥️ Ingestion worker finished");
        stats
    })
}
