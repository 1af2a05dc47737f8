//! # Orderflow server
//! This crate hosts the server for the order service. It is responsible for:
//! * Bringing up the store of record and warming the order cache from it.
//! * Running the ingestion worker that consumes orders from Kafka.
//! * Serving order lookups over HTTP, from the cache.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `GET /order/{order_uid}`: Fetches an order from the cache.
//! * `POST /order`: Publishes a new order to the order topic.
pub mod cli;
pub mod config;
pub mod errors;
pub mod ingestion_worker;
pub mod routes;
pub mod secret;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
