//! Broker-backed job queue implementations.
//!
//! The queue abstraction lives in `asyncalc-queue` as pure mechanics.
//! This module provides infrastructure-backed implementations (e.g. Redis).

#[cfg(feature = "redis")]
pub mod redis_streams;

#[cfg(feature = "redis")]
pub use redis_streams::RedisStreamsJobQueue;
