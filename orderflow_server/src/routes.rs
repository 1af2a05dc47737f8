//! Request handler definitions
//!
//! Define each route and its handler here.
//!
//! Lookups are served from the [`OrderCache`] only and never wait on the database. New orders are not written here
//! either: `POST /order` hands the order to the message queue, and it becomes visible once the ingestion pipeline has
//! stored it.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use orderflow_engine::{db_types::Order, OrderCache, OrderPublisher};

use crate::errors::ServerError;

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
/// Returns the order with the given `order_uid` as JSON, or 404 if the order is not in the cache.
#[get("/order/{order_uid}")]
pub async fn order_by_uid(
    path: web::Path<String>,
    cache: web::Data<OrderCache>,
) -> Result<HttpResponse, ServerError> {
    let order_uid = path.into_inner();
    debug!("💻️ GET order {order_uid}");
    let order = cache.get(&order_uid).await.ok_or_else(|| {
        debug!("💻️ Order {order_uid} is not in the cache");
        ServerError::NoRecordFound(format!("No order with uid {order_uid}"))
    })?;
    let body = serde_json::to_string(order.as_ref()).map_err(|e| {
        error!("💻️ Could not serialize order {order_uid}. {e}");
        ServerError::Unspecified(format!("Could not serialize order {order_uid}"))
    })?;
    Ok(HttpResponse::Ok().content_type("application/json").body(body))
}

route!(create_order => Post "/order" impl OrderPublisher);
/// Accepts a JSON order and publishes it to the order queue, keyed by `order_uid`.
///
/// Responds with 201 and the order as it was published. The order is not stored by this call; it shows up in
/// `GET /order/{order_uid}` once the ingestion pipeline has persisted it.
pub async fn create_order<P: OrderPublisher>(
    body: web::Bytes,
    publisher: web::Data<P>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received new order");
    let order: Order = serde_json::from_slice(&body).map_err(|e| {
        debug!("💻️ Could not deserialize order. {e}");
        ServerError::CouldNotDeserializePayload(e.to_string())
    })?;
    order.validate().map_err(|e| ServerError::CouldNotDeserializePayload(e.to_string()))?;
    publisher.publish(&order).await.map_err(|e| {
        error!("💻️ Could not publish order {}. {e}", order.order_uid);
        ServerError::from(e)
    })?;
    info!("💻️ Order {} published", order.order_uid);
    Ok(HttpResponse::Created().json(order))
}
