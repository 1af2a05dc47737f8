//! # Durable store backends
//!
//! Each backend keeps its "low-level" queries in an `orders` module of plain functions that accept a
//! `&mut <Backend>Connection`. Callers obtain a connection from the pool, or open a transaction and pass `&mut tx`,
//! without any other changes. The backend struct (e.g. [`sqlite::SqliteDatabase`]) owns the pool and implements
//! [`crate::traits::OrderStore`] on top of those functions.
//!
//! Both backends share the same four-table schema and the same SQL, see [`common`].
pub(crate) mod common;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;
