use actix_web::{http::StatusCode, web, web::ServiceConfig};
use orderflow_engine::{
    db_types::Order,
    queue::{channel_queue, ChannelOrderPublisher},
    IngestionPipeline,
    OrderCache,
    OrderSource,
    SqliteDatabase,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::helpers::{get_request, post_request, sample_order, ORDER_JSON};
use crate::routes::{health, order_by_uid, CreateOrderRoute};

fn configure(cache: OrderCache, publisher: ChannelOrderPublisher) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(cache))
            .app_data(web::Data::new(publisher))
            .service(health)
            .service(order_by_uid)
            .service(CreateOrderRoute::<ChannelOrderPublisher>::new());
    }
}

#[actix_web::test]
async fn health_check() {
    let _ = env_logger::try_init().ok();
    let (publisher, _source) = channel_queue(1, "orders");
    let (status, body) = get_request("/health", configure(OrderCache::new(), publisher)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn fetch_cached_order() {
    let _ = env_logger::try_init().ok();
    let cache = OrderCache::new();
    cache.put(sample_order()).await;
    let (publisher, _source) = channel_queue(1, "orders");
    let (status, body) = get_request("/order/b563feb7b2b84b6test", configure(cache, publisher)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ORDER_JSON);
}

#[actix_web::test]
async fn fetch_unknown_order() {
    let _ = env_logger::try_init().ok();
    let cache = OrderCache::new();
    cache.put(sample_order()).await;
    let (publisher, _source) = channel_queue(1, "orders");
    let (status, body) = get_request("/order/does-not-exist", configure(cache, publisher)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. No order with uid does-not-exist"}"#);
}

#[actix_web::test]
async fn post_order_publishes_to_the_queue() {
    let _ = env_logger::try_init().ok();
    let cache = OrderCache::new();
    let (publisher, mut source) = channel_queue(4, "orders");
    let (status, body) = post_request("/order", ORDER_JSON, configure(cache.clone(), publisher)).await;
    assert_eq!(status, StatusCode::CREATED);
    let echoed: Order = serde_json::from_str(&body).expect("response is an order");
    assert_eq!(echoed, sample_order());

    let message = source.receive().await.unwrap().expect("a message was published");
    assert_eq!(message.key.as_deref(), Some("b563feb7b2b84b6test"));
    let published: Order = serde_json::from_slice(&message.payload).unwrap();
    assert_eq!(published, sample_order());
    // Nothing is cached until the pipeline has stored the order.
    assert!(cache.get("b563feb7b2b84b6test").await.is_none());
}

#[actix_web::test]
async fn post_malformed_order() {
    let _ = env_logger::try_init().ok();
    let (publisher, mut source) = channel_queue(4, "orders");
    let (status, body) = post_request("/order", r#"{"order_uid": 42}"#, configure(OrderCache::new(), publisher)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let err: Value = serde_json::from_str(&body).unwrap();
    assert!(err["error"].as_str().unwrap().starts_with("Payload deserialization error."));

    let mut blank_uid: Value = serde_json::from_str(ORDER_JSON).unwrap();
    blank_uid["order_uid"] = Value::String(String::default());
    let (publisher, _) = channel_queue(4, "orders");
    let (status, _) = post_request("/order", &blank_uid.to_string(), configure(OrderCache::new(), publisher)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (publisher, _) = channel_queue(4, "orders");
    let (status, _) = post_request("/order", r#"{"track_number": "X"}"#, configure(OrderCache::new(), publisher)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // All publishers are gone and nothing was queued.
    assert!(source.receive().await.unwrap().is_none());
}

#[actix_web::test]
async fn post_order_without_items() {
    let _ = env_logger::try_init().ok();
    let (publisher, mut source) = channel_queue(4, "orders");
    let body = r#"{"order_uid": "A1", "items": null}"#;
    let (status, body) = post_request("/order", body, configure(OrderCache::new(), publisher)).await;
    assert_eq!(status, StatusCode::CREATED);
    let echoed: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(echoed["items"], Value::Array(vec![]));
    assert_eq!(echoed["internal_signature"], "");

    let message = source.receive().await.unwrap().expect("a message was published");
    let published: Order = serde_json::from_slice(&message.payload).unwrap();
    assert_eq!(published.order_uid, "A1");
    assert!(published.items.is_empty());
}

#[actix_web::test]
async fn post_order_when_the_queue_is_down() {
    let _ = env_logger::try_init().ok();
    let (publisher, source) = channel_queue(4, "orders");
    drop(source);
    let (status, body) = post_request("/order", ORDER_JSON, configure(OrderCache::new(), publisher)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, r#"{"error":"Could not hand the order over to the message queue. The queue has been closed"}"#);
}

#[actix_web::test]
async fn posted_orders_are_served_once_ingested() {
    let _ = env_logger::try_init().ok();
    let db = SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("in-memory database");
    db.migrate().await.expect("migrations");
    let cache = OrderCache::new();
    let (publisher, source) = channel_queue(4, "orders");

    let (status, _) = post_request("/order", ORDER_JSON, configure(cache.clone(), publisher.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = get_request("/order/b563feb7b2b84b6test", configure(cache.clone(), publisher.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    drop(publisher);

    let stats = IngestionPipeline::new(db, source, cache.clone(), CancellationToken::new()).run().await;
    assert_eq!(stats.persisted, 1);

    let (publisher, _source) = channel_queue(1, "orders");
    let (status, body) = get_request("/order/b563feb7b2b84b6test", configure(cache, publisher)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ORDER_JSON);
}
