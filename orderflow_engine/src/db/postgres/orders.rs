use log::{debug, trace};
use sqlx::{PgConnection, Postgres, QueryBuilder};

use crate::{
    db::common::{self, KeyedDelivery, KeyedItem, KeyedPayment, OrderHeader},
    db_types::{Delivery, InsertOrderResult, Item, Order, Payment},
    traits::StoreError,
};

// Keeps a single statement well below the 65535 bind parameter limit.
const ITEM_BATCH_SIZE: usize = 1000;

/// Inserts the order and all of its sub-records, unless an order with the same `order_uid` already exists, in which
/// case nothing is written.
///
/// This is not atomic by itself. Embed the call in a transaction and pass `&mut *tx` as the connection argument.
pub async fn idempotent_insert(order: &Order, conn: &mut PgConnection) -> Result<InsertOrderResult, StoreError> {
    if !insert_order_header(order, conn).await? {
        debug!("🗃️ Order [{}] already exists. Nothing to insert.", order.order_uid);
        return Ok(InsertOrderResult::AlreadyExists);
    }
    insert_delivery(&order.order_uid, &order.delivery, conn).await?;
    insert_payment(&order.order_uid, &order.payment, conn).await?;
    for batch in order.items.chunks(ITEM_BATCH_SIZE) {
        insert_items(&order.order_uid, batch, conn).await?;
    }
    trace!("🗃️ Order [{}] inserted with {} items", order.order_uid, order.items.len());
    Ok(InsertOrderResult::Inserted)
}

/// Returns `false` if the order row already existed.
async fn insert_order_header(order: &Order, conn: &mut PgConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(common::INSERT_ORDER)
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shardkey)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

async fn insert_delivery(order_uid: &str, delivery: &Delivery, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    sqlx::query(common::INSERT_DELIVERY)
        .bind(order_uid)
        .bind(&delivery.name)
        .bind(&delivery.phone)
        .bind(&delivery.zip)
        .bind(&delivery.city)
        .bind(&delivery.address)
        .bind(&delivery.region)
        .bind(&delivery.email)
        .execute(conn)
        .await?;
    Ok(())
}

async fn insert_payment(order_uid: &str, payment: &Payment, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    sqlx::query(common::INSERT_PAYMENT)
        .bind(order_uid)
        .bind(&payment.transaction)
        .bind(&payment.request_id)
        .bind(&payment.currency)
        .bind(&payment.provider)
        .bind(payment.amount)
        .bind(payment.payment_dt)
        .bind(&payment.bank)
        .bind(payment.delivery_cost)
        .bind(payment.goods_total)
        .bind(payment.custom_fee)
        .execute(conn)
        .await?;
    Ok(())
}

async fn insert_items(order_uid: &str, items: &[Item], conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO items (order_uid, chrt_id, track_number, price, rid, name, sale, size, total_price, nm_id, brand, \
         status) ",
    );
    builder.push_values(items, |mut row, item| {
        row.push_bind(order_uid)
            .push_bind(item.chrt_id)
            .push_bind(&item.track_number)
            .push_bind(item.price)
            .push_bind(&item.rid)
            .push_bind(&item.name)
            .push_bind(item.sale)
            .push_bind(&item.size)
            .push_bind(item.total_price)
            .push_bind(item.nm_id)
            .push_bind(&item.brand)
            .push_bind(item.status);
    });
    trace!("🗃️ Executing query: {}", builder.sql());
    builder.build().execute(conn).await?;
    Ok(())
}

/// Fetches the complete record for `order_uid`, or `None` if there is no such order.
pub async fn fetch_order_by_uid(order_uid: &str, conn: &mut PgConnection) -> Result<Option<Order>, StoreError> {
    let header: Option<OrderHeader> =
        sqlx::query_as(&common::select_order_by_uid()).bind(order_uid).fetch_optional(&mut *conn).await?;
    let Some(header) = header else {
        return Ok(None);
    };
    let delivery: Option<KeyedDelivery> =
        sqlx::query_as(&common::select_delivery_by_uid()).bind(order_uid).fetch_optional(&mut *conn).await?;
    let payment: Option<KeyedPayment> =
        sqlx::query_as(&common::select_payment_by_uid()).bind(order_uid).fetch_optional(&mut *conn).await?;
    let items: Vec<KeyedItem> =
        sqlx::query_as(&common::select_items_by_uid()).bind(order_uid).fetch_all(&mut *conn).await?;
    let order = common::assemble_order(
        header,
        delivery.map(|d| d.delivery),
        payment.map(|p| p.payment),
        items.into_iter().map(|i| i.item).collect(),
    )?;
    Ok(Some(order))
}

/// Reads every order in the database. Orders are returned in ascending order of `date_created`.
pub async fn fetch_all_orders(conn: &mut PgConnection) -> Result<Vec<Order>, StoreError> {
    let headers: Vec<OrderHeader> = sqlx::query_as(&common::select_all_orders()).fetch_all(&mut *conn).await?;
    let deliveries: Vec<KeyedDelivery> =
        sqlx::query_as(&common::select_all_deliveries()).fetch_all(&mut *conn).await?;
    let payments: Vec<KeyedPayment> = sqlx::query_as(&common::select_all_payments()).fetch_all(&mut *conn).await?;
    let items: Vec<KeyedItem> = sqlx::query_as(&common::select_all_items()).fetch_all(&mut *conn).await?;
    trace!(
        "🗃️ Full scan read {} orders, {} deliveries, {} payments and {} items",
        headers.len(),
        deliveries.len(),
        payments.len(),
        items.len()
    );
    Ok(common::assemble_orders(headers, deliveries, payments, items))
}

