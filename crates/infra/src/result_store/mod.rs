//! Result store boundary: job id -> outcome, polled by callers.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod r#trait;

pub use in_memory::InMemoryResultStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisResultStore;
pub use r#trait::{ResultStore, StoreError};
