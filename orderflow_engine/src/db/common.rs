//! SQL and row types shared by every backend.
//!
//! The statements use `$n` placeholders, which both Postgres and SQLite accept.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::error;
use sqlx::FromRow;

use crate::{
    db_types::{Delivery, Item, Order, Payment},
    traits::StoreError,
};

/// The conflict clause makes the existence check and the insert a single atomic statement. Zero affected rows means
/// the order is already stored.
pub const INSERT_ORDER: &str = r#"
    INSERT INTO orders (
        order_uid,
        track_number,
        entry,
        locale,
        internal_signature,
        customer_id,
        delivery_service,
        shardkey,
        sm_id,
        date_created,
        oof_shard
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    ON CONFLICT (order_uid) DO NOTHING
"#;

pub const INSERT_DELIVERY: &str = r#"
    INSERT INTO delivery (order_uid, name, phone, zip, city, address, region, email)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
"#;

pub const INSERT_PAYMENT: &str = r#"
    INSERT INTO payment (
        order_uid,
        transaction_id,
        request_id,
        currency,
        provider,
        amount,
        payment_dt,
        bank,
        delivery_cost,
        goods_total,
        custom_fee
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
"#;

pub const INSERT_ITEM: &str = r#"
    INSERT INTO items (
        order_uid,
        chrt_id,
        track_number,
        price,
        rid,
        name,
        sale,
        size,
        total_price,
        nm_id,
        brand,
        status
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
"#;

const ORDER_COLUMNS: &str = "order_uid, track_number, entry, locale, internal_signature, customer_id, \
                             delivery_service, shardkey, sm_id, date_created, oof_shard";
const DELIVERY_COLUMNS: &str = "order_uid, name, phone, zip, city, address, region, email";
const PAYMENT_COLUMNS: &str = "order_uid, transaction_id, request_id, currency, provider, amount, payment_dt, bank, \
                               delivery_cost, goods_total, custom_fee";
const ITEM_COLUMNS: &str =
    "order_uid, chrt_id, track_number, price, rid, name, sale, size, total_price, nm_id, brand, status";

pub fn select_order_by_uid() -> String {
    format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_uid = $1")
}

pub fn select_delivery_by_uid() -> String {
    format!("SELECT {DELIVERY_COLUMNS} FROM delivery WHERE order_uid = $1")
}

pub fn select_payment_by_uid() -> String {
    format!("SELECT {PAYMENT_COLUMNS} FROM payment WHERE order_uid = $1")
}

pub fn select_items_by_uid() -> String {
    format!("SELECT {ITEM_COLUMNS} FROM items WHERE order_uid = $1 ORDER BY id ASC")
}

pub fn select_all_orders() -> String {
    format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY date_created ASC, order_uid ASC")
}

pub fn select_all_deliveries() -> String {
    format!("SELECT {DELIVERY_COLUMNS} FROM delivery")
}

pub fn select_all_payments() -> String {
    format!("SELECT {PAYMENT_COLUMNS} FROM payment")
}

pub fn select_all_items() -> String {
    format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY order_uid ASC, id ASC")
}

//--------------------------------------       Row types       ---------------------------------------------------------
/// A row of the `orders` table, without the sub-records.
#[derive(Debug, Clone, FromRow)]
pub struct OrderHeader {
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i64,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

impl OrderHeader {
    fn into_order(self, delivery: Delivery, payment: Payment, items: Vec<Item>) -> Order {
        Order {
            order_uid: self.order_uid,
            track_number: self.track_number,
            entry: self.entry,
            delivery,
            payment,
            items,
            locale: self.locale,
            internal_signature: self.internal_signature,
            customer_id: self.customer_id,
            delivery_service: self.delivery_service,
            shardkey: self.shardkey,
            sm_id: self.sm_id,
            date_created: self.date_created,
            oof_shard: self.oof_shard,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct KeyedDelivery {
    pub order_uid: String,
    #[sqlx(flatten)]
    pub delivery: Delivery,
}

#[derive(Debug, Clone, FromRow)]
pub struct KeyedPayment {
    pub order_uid: String,
    #[sqlx(flatten)]
    pub payment: Payment,
}

#[derive(Debug, Clone, FromRow)]
pub struct KeyedItem {
    pub order_uid: String,
    #[sqlx(flatten)]
    pub item: Item,
}

/// Builds a single order from its rows. A missing delivery or payment row means the record is incomplete.
pub fn assemble_order(
    header: OrderHeader,
    delivery: Option<Delivery>,
    payment: Option<Payment>,
    items: Vec<Item>,
) -> Result<Order, StoreError> {
    match (delivery, payment) {
        (Some(delivery), Some(payment)) => Ok(header.into_order(delivery, payment, items)),
        _ => Err(StoreError::Corrupt(header.order_uid)),
    }
}

/// Joins the rows of a full table scan into complete orders, in the order of `headers`.
///
/// Incomplete orders are logged and left out, so that the result only ever contains fully populated orders.
pub fn assemble_orders(
    headers: Vec<OrderHeader>,
    deliveries: Vec<KeyedDelivery>,
    payments: Vec<KeyedPayment>,
    items: Vec<KeyedItem>,
) -> Vec<Order> {
    let mut deliveries =
        deliveries.into_iter().map(|d| (d.order_uid, d.delivery)).collect::<HashMap<String, Delivery>>();
    let mut payments = payments.into_iter().map(|p| (p.order_uid, p.payment)).collect::<HashMap<String, Payment>>();
    let mut items = items.into_iter().fold(HashMap::<String, Vec<Item>>::new(), |mut acc, row| {
        acc.entry(row.order_uid).or_default().push(row.item);
        acc
    });
    headers
        .into_iter()
        .filter_map(|header| {
            let uid = header.order_uid.clone();
            let delivery = deliveries.remove(&uid);
            let payment = payments.remove(&uid);
            let order_items = items.remove(&uid).unwrap_or_default();
            assemble_order(header, delivery, payment, order_items)
                .map_err(|e| error!("🗃️ Skipping order {uid}. {e}"))
                .ok()
        })
        .collect()
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    fn header(uid: &str) -> OrderHeader {
        OrderHeader {
            order_uid: uid.into(),
            track_number: "TRACK".into(),
            entry: "WBIL".into(),
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

    fn item(chrt_id: i64) -> Item {
        Item {
            chrt_id,
            track_number: "TRACK".into(),
            price: 100,
            rid: format!("rid-{chrt_id}"),
            name: "Mascaras".into(),
            sale: 0,
            size: "0".into(),
            total_price: 100,
            nm_id: 1,
            brand: "Vivienne Sabo".into(),
            status: 202,
        }
    }

    #[test]
    fn incomplete_orders_are_left_out() {
        let headers = vec![header("A1"), header("A2"), header("A3")];
        let deliveries = ["A1", "A3"]
            .iter()
            .map(|uid| KeyedDelivery { order_uid: uid.to_string(), delivery: Delivery::default() })
            .collect();
        let payments = ["A1", "A2", "A3"]
            .iter()
            .map(|uid| KeyedPayment { order_uid: uid.to_string(), payment: Payment::default() })
            .collect();
        let items = vec![
            KeyedItem { order_uid: "A1".into(), item: item(1) },
            KeyedItem { order_uid: "A1".into(), item: item(2) },
            KeyedItem { order_uid: "A2".into(), item: item(3) },
        ];
        let orders = assemble_orders(headers, deliveries, payments, items);
        let uids = orders.iter().map(|o| o.order_uid.as_str()).collect::<Vec<_>>();
        assert_eq!(uids, vec!["A1", "A3"]);
        assert_eq!(orders[0].items.iter().map(|i| i.chrt_id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(orders[1].items.is_empty());
    }

    #[test]
    fn missing_payment_is_corrupt() {
        let err = assemble_order(header("A1"), Some(Delivery::default()), None, vec![]).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(uid) if uid == "A1"));
    }
}
