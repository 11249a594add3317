//! Configuration loading from the process environment.
//!
//! | key | default |
//! |---|---|
//! | `BROKER_URL` / `BROKER_HOST` | `redis://localhost:6379` |
//! | `STORE_URL` / `STORE_HOST` | `redis://localhost:6379` |
//! | `QUEUE_NAME` | `asyncalc:jobs` |
//! | `CONSUMER_GROUP` | `asyncalc.workers` |
//! | `RESULT_KEY_PREFIX` | empty |
//! | `PENDING_TIMEOUT_MS` | `60000` |
//! | `WORKER_CONCURRENCY` | `1` |
//! | `WORKER_NAME` | `worker` |
//! | `ACK_POLICY` | `after_publish` |
//! | `POLL_INTERVAL_MS` | `250` |
//! | `PUBLISH_MAX_ATTEMPTS` | `3` |
//! | `HTTP_ADDR` | `0.0.0.0:5000` |
//! | `USE_PERSISTENT_STORES` | `false` |
//!
//! A `*_HOST` key expands to `redis://<host>:6379` and is only consulted when
//! the matching `*_URL` key is absent.

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::retry::RetryPolicy;
use crate::worker::{AckPolicy, WorkerConfig};

const DEFAULT_REDIS_PORT: u16 = 6379;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub url: String,
    pub queue_name: String,
    pub consumer_group: String,
    /// Idle time after which an unacknowledged delivery is reclaimed
    pub pending_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub url: String,
    pub key_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    pub concurrency: usize,
    /// Consumer name prefix; pool members are `<name>-<i>`
    pub name: String,
    pub ack_policy: AckPolicy,
    pub poll_interval: Duration,
    pub publish_max_attempts: u32,
}

impl WorkerSettings {
    pub fn worker_config(&self) -> WorkerConfig {
        let defaults = WorkerConfig::default();
        WorkerConfig {
            name: self.name.clone(),
            poll_interval: self.poll_interval,
            ack_policy: self.ack_policy,
            publish_retry: RetryPolicy {
                max_attempts: Some(self.publish_max_attempts),
                ..defaults.publish_retry
            },
            connect_retry: defaults.connect_retry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub broker: BrokerConfig,
    pub store: StoreConfig,
    pub worker: WorkerSettings,
    pub http: HttpConfig,
    /// Use Redis for the queue and the store instead of in-process adapters
    pub use_persistent_stores: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let broker = BrokerConfig {
            url: redis_url(&get, "BROKER_URL", "BROKER_HOST"),
            queue_name: get("QUEUE_NAME").unwrap_or_else(|| "asyncalc:jobs".to_string()),
            consumer_group: get("CONSUMER_GROUP").unwrap_or_else(|| "asyncalc.workers".to_string()),
            pending_timeout: Duration::from_millis(at_least_one(&get, "PENDING_TIMEOUT_MS", 60_000u64)?),
        };

        let store = StoreConfig {
            url: redis_url(&get, "STORE_URL", "STORE_HOST"),
            key_prefix: get("RESULT_KEY_PREFIX").unwrap_or_default(),
        };

        let worker = WorkerSettings {
            concurrency: at_least_one(&get, "WORKER_CONCURRENCY", 1usize)?,
            name: get("WORKER_NAME").unwrap_or_else(|| "worker".to_string()),
            ack_policy: parse(&get, "ACK_POLICY", AckPolicy::default())?,
            poll_interval: Duration::from_millis(at_least_one(&get, "POLL_INTERVAL_MS", 250u64)?),
            publish_max_attempts: at_least_one(&get, "PUBLISH_MAX_ATTEMPTS", 3u32)?,
        };

        let http = HttpConfig {
            addr: parse(&get, "HTTP_ADDR", SocketAddr::from(([0, 0, 0, 0], 5000)))?,
        };

        Ok(Self {
            broker,
            store,
            worker,
            http,
            use_persistent_stores: parse(&get, "USE_PERSISTENT_STORES", false)?,
        })
    }
}

fn redis_url(get: &impl Fn(&str) -> Option<String>, url_key: &str, host_key: &str) -> String {
    get(url_key)
        .or_else(|| get(host_key).map(|host| format!("redis://{}:{DEFAULT_REDIS_PORT}", host.trim())))
        .unwrap_or_else(|| format!("redis://localhost:{DEFAULT_REDIS_PORT}"))
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

fn at_least_one<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + From<u8> + Display,
    T::Err: Display,
{
    let value = parse(get, key, default)?;
    if value < T::from(1) {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(value)
}
