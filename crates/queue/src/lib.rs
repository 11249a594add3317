//! `asyncalc-queue`: job channel mechanics.
//!
//! The queue abstraction, the pull-based delivery stream workers consume,
//! and an in-memory broker for tests/dev. Broker-backed implementations live
//! in `asyncalc-infra`.

pub mod in_memory;
pub mod queue;
pub mod stream;

pub use in_memory::InMemoryJobQueue;
pub use queue::{Delivery, JobQueue, QueueError};
pub use stream::JobStream;
