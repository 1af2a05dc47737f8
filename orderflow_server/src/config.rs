//! Server configuration.
//!
//! Every setting is read from an `OFS_*` environment variable. Invalid values are logged and replaced by the default.
//! The database URL may alternatively come from a JSON file (see [`database_url_from_file`]).
use std::{env, fmt::Display, path::Path, str::FromStr, time::Duration};

use log::*;
use orderflow_engine::{pipeline::RetryPolicy, queue::KafkaConfig, DEFAULT_TRANSACTION_TIMEOUT};
use serde::Deserialize;

use crate::{errors::ServerError, secret::Secret};

const DEFAULT_OFS_HOST: &str = "127.0.0.1";
const DEFAULT_OFS_PORT: u16 = 8080;
const DEFAULT_CONFIG_FILE: &str = "config/db.json";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_PERSIST_ATTEMPTS: usize = 3;
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// The Postgres URL for the store of record. It usually contains credentials.
    pub database_url: Secret<String>,
    pub db_max_connections: u32,
    /// The deadline for a single persist transaction.
    pub transaction_timeout: Duration,
    pub kafka: KafkaConfig,
    /// Total number of attempts for a retryable persistence failure before the message is dropped.
    pub persist_attempts: usize,
    /// How long in-flight HTTP requests are given to complete on shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OFS_HOST.to_string(),
            port: DEFAULT_OFS_PORT,
            database_url: Secret::default(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
            kafka: KafkaConfig::default(),
            persist_attempts: DEFAULT_PERSIST_ATTEMPTS,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("OFS_HOST").ok().unwrap_or_else(|| DEFAULT_OFS_HOST.into());
        let port = parse_env("OFS_PORT", DEFAULT_OFS_PORT);
        let database_url = env::var("OFS_DATABASE_URL").ok().map(Secret::new).or_else(|| {
            let path = env::var("OFS_CONFIG_FILE").ok().unwrap_or_else(|| DEFAULT_CONFIG_FILE.into());
            info!("🪛️ OFS_DATABASE_URL is not set. Looking for the database URL in {path}");
            database_url_from_file(&path)
                .map_err(|e| warn!("🪛️ Could not read the database URL from {path}. {e}"))
                .ok()
        });
        let database_url = database_url.unwrap_or_else(|| {
            error!(
                "🪛️ No database URL is configured. Set OFS_DATABASE_URL, or provide DB_CONFIG in the file named by \
                 OFS_CONFIG_FILE."
            );
            Secret::default()
        });
        let db_max_connections = parse_env("OFS_DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS);
        let transaction_timeout =
            Duration::from_secs(parse_env("OFS_DB_TX_TIMEOUT", DEFAULT_TRANSACTION_TIMEOUT.as_secs()));
        let defaults = KafkaConfig::default();
        let kafka = KafkaConfig {
            brokers: env::var("OFS_KAFKA_BROKERS").ok().unwrap_or(defaults.brokers),
            topic: env::var("OFS_KAFKA_TOPIC").ok().unwrap_or(defaults.topic),
            group_id: env::var("OFS_KAFKA_GROUP_ID").ok().unwrap_or(defaults.group_id),
        };
        let persist_attempts = parse_env("OFS_PERSIST_ATTEMPTS", DEFAULT_PERSIST_ATTEMPTS);
        let shutdown_timeout =
            Duration::from_secs(parse_env("OFS_SHUTDOWN_TIMEOUT", DEFAULT_SHUTDOWN_TIMEOUT.as_secs()));
        Self {
            host,
            port,
            database_url,
            db_max_connections,
            transaction_timeout,
            kafka,
            persist_attempts,
            shutdown_timeout,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy { attempts: self.persist_attempts, ..RetryPolicy::default() }
    }
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}

#[derive(Deserialize)]
struct DatabaseConfigFile {
    #[serde(rename = "DB_CONFIG")]
    db_config: Secret<String>,
}

/// Reads the database URL from the `DB_CONFIG` key of a JSON file, e.g. `{"DB_CONFIG": "postgres://..."}`.
pub fn database_url_from_file<P: AsRef<Path>>(path: P) -> Result<Secret<String>, ServerError> {
    let contents = std::fs::read_to_string(path)?;
    let config: DatabaseConfigFile = serde_json::from_str(&contents)
        .map_err(|e| ServerError::ConfigurationError(format!("Invalid database config file. {e}")))?;
    if config.db_config.is_blank() {
        return Err(ServerError::ConfigurationError("DB_CONFIG is empty".into()));
    }
    Ok(config.db_config)
}
