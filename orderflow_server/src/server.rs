use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use orderflow_engine::{
    queue::{KafkaOrderPublisher, KafkaOrderSource},
    warm_up_cache,
    OrderCache,
    OrderPublisher,
    OrderStore,
    PostgresDatabase,
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    ingestion_worker::start_ingestion_worker,
    routes::{health, order_by_uid, CreateOrderRoute},
};

/// Brings the service up and runs it until the HTTP server is stopped (SIGINT or SIGTERM).
///
/// Startup order: connect to the database, create the tables, warm up the cache, then start the ingestion worker and
/// the HTTP server. Failing to reach the database or to warm up the cache is fatal.
///
/// On shutdown the HTTP server drains first, then the ingestion pipeline is cancelled and awaited, and finally the
/// connection pool is closed.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = PostgresDatabase::new_with_url(config.database_url.reveal(), config.db_max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(format!("Could not connect to the database. {e}")))?
        .with_transaction_timeout(config.transaction_timeout);
    db.migrate().await?;
    db.ping().await?;
    info!("🚀️ Database connection established");

    let cache = OrderCache::new();
    let count = warm_up_cache(&db, &cache).await?;
    info!("🚀️ Cache is warm with {count} orders");

    let source = KafkaOrderSource::new(&config.kafka)?;
    let publisher = KafkaOrderPublisher::new(&config.kafka)?;
    let shutdown = CancellationToken::new();
    let worker = start_ingestion_worker(db.clone(), source, cache.clone(), config.retry_policy(), shutdown.clone());

    let srv = create_server_instance(&config, cache, publisher)?;
    info!("🚀️ Listening on {}:{}", config.host, config.port);
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));

    info!("🚀️ HTTP server stopped. Stopping the ingestion worker.");
    shutdown.cancel();
    match worker.await {
        Ok(stats) => info!("🚀️ Ingestion worker stopped. {stats}"),
        Err(e) => error!("🚀️ The ingestion worker did not shut down cleanly. {e}"),
    }
    db.close().await;
    result
}

pub fn create_server_instance<P: OrderPublisher>(
    config: &ServerConfig,
    cache: OrderCache,
    publisher: P,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("ofs::access_log"))
            .app_data(web::Data::new(cache.clone()))
            .app_data(web::Data::new(publisher.clone()))
            .service(health)
            .service(order_by_uid)
            .service(CreateOrderRoute::<P>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .shutdown_timeout(config.shutdown_timeout.as_secs())
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
