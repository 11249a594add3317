//! Job channel abstraction (mechanics only).
//!
//! A `JobQueue` is the durable FIFO channel between the submission side and
//! the workers. It makes minimal assumptions about the broker behind it:
//!
//! - **Competing consumers**: each delivery goes to exactly one consumer per attempt
//! - **Explicit acknowledgement**: a delivery stays owned by the broker until acked
//! - **Redelivery**: a released (or abandoned) delivery is handed out again
//! - **No ordering across jobs** once more than one consumer is active
//!
//! Whether a worker acknowledges before or after publishing the outcome is the
//! worker's decision; the queue only provides the mechanics.

use std::sync::Arc;
use std::time::Duration;

use asyncalc_core::Job;

/// Queue failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The broker could not be reached, declared, or refused the operation.
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    /// The job could not be encoded for the channel.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Ack/release for a delivery the broker does not know (already acked or released).
    #[error("unknown delivery: {0}")]
    UnknownDelivery(String),
}

/// One message handed to one consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    tag: String,
    body: String,
    delivery_count: u32,
}

impl Delivery {
    pub fn new(tag: impl Into<String>, body: impl Into<String>, delivery_count: u32) -> Self {
        Self {
            tag: tag.into(),
            body: body.into(),
            delivery_count,
        }
    }

    /// Broker-assigned handle used to ack or release this delivery.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Raw job record.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// How many times this message has been handed out, this one included.
    pub fn delivery_count(&self) -> u32 {
        self.delivery_count
    }

    pub fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }
}

/// Durable job channel.
///
/// ## Thread Safety
///
/// The trait requires `Send + Sync`; gateways enqueue concurrently from many
/// request handlers while any number of workers receive from the same channel.
pub trait JobQueue: Send + Sync {
    /// Declare the channel. Idempotent: safe from both gateway and worker startup.
    fn declare(&self) -> Result<(), QueueError>;

    /// Append a job. Returns once the broker has acknowledged the write.
    fn enqueue(&self, job: &Job) -> Result<(), QueueError>;

    /// Pull at most one delivery for `consumer`, waiting up to `timeout`.
    fn receive(&self, consumer: &str, timeout: Duration) -> Result<Option<Delivery>, QueueError>;

    /// Permanently remove a delivery from the channel.
    fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Give an unacknowledged delivery back for redelivery.
    fn release(&self, delivery: Delivery) -> Result<(), QueueError>;
}

impl<Q> JobQueue for Arc<Q>
where
    Q: JobQueue + ?Sized,
{
    fn declare(&self) -> Result<(), QueueError> {
        (**self).declare()
    }

    fn enqueue(&self, job: &Job) -> Result<(), QueueError> {
        (**self).enqueue(job)
    }

    fn receive(&self, consumer: &str, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        (**self).receive(consumer, timeout)
    }

    fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        (**self).ack(delivery)
    }

    fn release(&self, delivery: Delivery) -> Result<(), QueueError> {
        (**self).release(delivery)
    }
}
