//! Redis Streams-backed job queue (durable, at-least-once capable).
//!
//! This implementation uses Redis Streams (XADD/XREADGROUP) to provide:
//! - **Durable delivery**: entries persist in the stream until acknowledged
//! - **Competing consumers**: one consumer group shared by all workers, so each
//!   entry is handed to exactly one worker per attempt
//! - **Crash recovery**: entries left pending by a dead worker are claimed by
//!   another worker once idle longer than the pending timeout
//!
//! ## Layout
//!
//! - **Stream Key**: `asyncalc:jobs` (one entry per job)
//! - **Entry fields**: `job_id` and `payload` (the JSON record `{id, a, b, op, submitted_at}`)
//! - **Consumer Group**: `asyncalc.workers`
//! - **Consumers**: worker names within the group (e.g. `worker-0`, `worker-1`)

use std::time::Duration;

use redis::Commands;
use redis::streams::{
    StreamClaimReply, StreamId, StreamPendingCountReply, StreamPendingId, StreamReadOptions,
    StreamReadReply,
};
use tracing::{debug, instrument, warn};

use asyncalc_core::Job;
use asyncalc_queue::{Delivery, JobQueue, QueueError};

/// Default stream key for jobs
const DEFAULT_STREAM_KEY: &str = "asyncalc:jobs";

/// Default consumer group shared by all workers
const DEFAULT_GROUP: &str = "asyncalc.workers";

/// Default pending entry timeout (entries idle longer than this are reclaimed)
const DEFAULT_PENDING_TIMEOUT_MS: u64 = 60_000;

/// Pending entries inspected per reclaim attempt
const PENDING_SCAN_COUNT: usize = 16;

/// First pending entry idle for at least `timeout_ms`.
fn first_stale(pending: &[StreamPendingId], timeout_ms: u64) -> Option<&StreamPendingId> {
    pending
        .iter()
        .find(|entry| entry.last_delivered_ms as u64 >= timeout_ms)
}

#[derive(Debug, Clone)]
pub struct RedisStreamsJobQueue {
    client: redis::Client,
    stream_key: String,
    group: String,
    pending_timeout_ms: u64,
}

impl RedisStreamsJobQueue {
    /// Create a new Redis Streams job queue. No connection is made until first use.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `stream_key` - Redis stream key (default: "asyncalc:jobs")
    /// * `group` - consumer group (default: "asyncalc.workers")
    pub fn new(
        redis_url: impl AsRef<str>,
        stream_key: Option<String>,
        group: Option<String>,
    ) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            stream_key: stream_key.unwrap_or_else(|| DEFAULT_STREAM_KEY.to_string()),
            group: group.unwrap_or_else(|| DEFAULT_GROUP.to_string()),
            pending_timeout_ms: DEFAULT_PENDING_TIMEOUT_MS,
        })
    }

    /// How long a delivery may stay unacknowledged before another consumer claims it.
    pub fn with_pending_timeout(mut self, timeout: Duration) -> Self {
        self.pending_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    fn connection(&self) -> Result<redis::Connection, QueueError> {
        self.client
            .get_connection()
            .map_err(|e| QueueError::Unavailable(e.to_string()))
    }

    /// Claim the oldest pending entry that has been idle past the timeout.
    ///
    /// A recently redelivered entry at the head does not hide stale ones behind it.
    fn claim_stale(
        &self,
        conn: &mut redis::Connection,
        consumer: &str,
    ) -> Result<Option<Delivery>, QueueError> {
        let pending: StreamPendingCountReply = conn
            .xpending_count(&self.stream_key, &self.group, "-", "+", PENDING_SCAN_COUNT)
            .map_err(|e| QueueError::Unavailable(format!("XPENDING failed: {e}")))?;

        let Some(stale) = first_stale(&pending.ids, self.pending_timeout_ms) else {
            return Ok(None);
        };

        // XCLAIM re-checks the idle time, so a racing consumer cannot double-claim.
        let claimed: StreamClaimReply = conn
            .xclaim(
                &self.stream_key,
                &self.group,
                consumer,
                self.pending_timeout_ms,
                &[&stale.id],
            )
            .map_err(|e| QueueError::Unavailable(format!("XCLAIM failed: {e}")))?;

        let delivery_count = stale.times_delivered as u32 + 1;
        match claimed.ids.into_iter().next() {
            Some(entry) => {
                warn!(
                    entry_id = %entry.id,
                    previous_consumer = %stale.consumer,
                    delivery_count,
                    "reclaimed stale delivery"
                );
                Ok(Some(Self::to_delivery(entry, delivery_count)))
            }
            None => Ok(None),
        }
    }

    fn read_new(
        &self,
        conn: &mut redis::Connection,
        consumer: &str,
        timeout: Duration,
    ) -> Result<Option<Delivery>, QueueError> {
        // BLOCK 0 would wait forever; never let a short timeout round down to it.
        let block_ms = (timeout.as_millis() as usize).max(1);
        let opts = StreamReadOptions::default()
            .group(&self.group, consumer)
            .count(1)
            .block(block_ms);

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&self.stream_key], &[">"], &opts)
            .map_err(|e| QueueError::Unavailable(format!("XREADGROUP failed: {e}")))?;

        let entry = reply
            .into_iter()
            .flat_map(|r| r.keys)
            .flat_map(|k| k.ids)
            .next();

        match entry {
            Some(entry) => Ok(Some(Self::to_delivery(entry, 1))),
            None => Ok(None),
        }
    }

    /// Convert a stream entry into a delivery.
    ///
    /// An entry without a readable `payload` field is handed out with an empty
    /// body; the worker treats it as poison and acknowledges it.
    fn to_delivery(entry: StreamId, delivery_count: u32) -> Delivery {
        let body = entry.get::<String>("payload").unwrap_or_else(|| {
            warn!(entry_id = %entry.id, "stream entry has no payload field");
            String::new()
        });
        Delivery::new(entry.id, body, delivery_count)
    }
}

impl JobQueue for RedisStreamsJobQueue {
    /// `XGROUP CREATE ... MKSTREAM`; an existing group is not an error.
    #[instrument(skip(self), fields(stream_key = %self.stream_key, group = %self.group), err)]
    fn declare(&self) -> Result<(), QueueError> {
        let mut conn = self.connection()?;

        // "0": a group created after jobs were enqueued still sees them.
        let created: redis::RedisResult<()> =
            conn.xgroup_create_mkstream(&self.stream_key, &self.group, "0");

        match created {
            Ok(()) => {
                debug!("consumer group created");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(QueueError::Unavailable(format!("XGROUP CREATE failed: {e}"))),
        }
    }

    #[instrument(skip(self, job), fields(stream_key = %self.stream_key, job_id = %job.id), err)]
    fn enqueue(&self, job: &Job) -> Result<(), QueueError> {
        let payload = job
            .encode()
            .map_err(|e| QueueError::Serialization(e.to_string()))?;

        let mut conn = self.connection()?;
        let _: String = conn
            .xadd(
                &self.stream_key,
                "*",
                &[("job_id", job.id.to_string()), ("payload", payload)],
            )
            .map_err(|e| QueueError::Unavailable(format!("XADD failed: {e}")))?;

        Ok(())
    }

    fn receive(&self, consumer: &str, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        let mut conn = self.connection()?;

        if let Some(delivery) = self.claim_stale(&mut conn, consumer)? {
            return Ok(Some(delivery));
        }

        self.read_new(&mut conn, consumer, timeout)
    }

    fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut conn = self.connection()?;
        let acked: i64 = conn
            .xack(&self.stream_key, &self.group, &[delivery.tag()])
            .map_err(|e| QueueError::Unavailable(format!("XACK failed: {e}")))?;

        if acked == 0 {
            return Err(QueueError::UnknownDelivery(delivery.tag().to_string()));
        }
        Ok(())
    }

    /// The entry stays in the group's pending list and is reclaimed by
    /// `receive` once idle past the pending timeout.
    fn release(&self, delivery: Delivery) -> Result<(), QueueError> {
        debug!(entry_id = %delivery.tag(), "delivery released; awaiting reclaim");
        Ok(())
    }
}
