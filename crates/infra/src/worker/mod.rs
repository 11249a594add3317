//! Worker loop and worker pool.
//!
//! Each worker is a single-threaded loop pulling one delivery at a time from a
//! [`asyncalc_queue::JobStream`]. Horizontal scale comes from running more
//! workers (threads or processes) against the same channel.
//!
//! ## Per-delivery flow
//!
//! ```text
//! Dequeued -> [ack if OnDequeue] -> decode -> Computing -> Publishing -> [ack if AfterPublish] -> Idle
//! ```
//!
//! Poison messages (no job id) are acknowledged and dropped under both
//! policies. A record with an id but malformed fields is answered with a
//! computation-error outcome for that id.

pub mod config;
pub mod pool;
pub mod runner;
pub mod stats;

pub use config::{AckPolicy, ParseAckPolicyError, WorkerConfig};
pub use pool::{WorkerHandle, WorkerPool, WorkerPoolHandle};
pub use runner::{Processed, Worker};
pub use stats::WorkerStats;
