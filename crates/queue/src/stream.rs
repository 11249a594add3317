//! Pull-based delivery stream with explicit shutdown.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use crate::queue::{Delivery, JobQueue, QueueError};

/// A lazy, logically infinite sequence of deliveries for one consumer.
///
/// ## Usage Pattern
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = std::sync::mpsc::channel();
/// let mut stream = JobStream::new(queue, "worker-1", Duration::from_millis(250), shutdown_rx);
///
/// while let Some(item) = stream.next() {
///     match item {
///         Ok(delivery) => handle(stream.queue(), delivery),
///         Err(e) => { stream.pause(Duration::from_secs(1)); }
///     }
/// }
/// // `shutdown_tx.send(())` (or dropping it) ends the loop.
/// ```
///
/// Receive timeouts are absorbed internally; `next` only returns `None` once
/// shutdown has been requested, and every later call returns `None` as well.
#[derive(Debug)]
pub struct JobStream<Q> {
    queue: Q,
    consumer: String,
    poll_interval: Duration,
    shutdown: Receiver<()>,
    closed: bool,
}

impl<Q: JobQueue> JobStream<Q> {
    pub fn new(
        queue: Q,
        consumer: impl Into<String>,
        poll_interval: Duration,
        shutdown: Receiver<()>,
    ) -> Self {
        Self {
            queue,
            consumer: consumer.into(),
            poll_interval,
            shutdown,
            closed: false,
        }
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Sleep for up to `delay`, waking early on shutdown.
    ///
    /// Returns `true` if the stream is closed.
    pub fn pause(&mut self, delay: Duration) -> bool {
        if self.closed {
            return true;
        }
        match self.shutdown.recv_timeout(delay) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => self.closed = true,
            Err(RecvTimeoutError::Timeout) => {}
        }
        self.closed
    }

    fn shutdown_requested(&mut self) -> bool {
        if !self.closed {
            match self.shutdown.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => self.closed = true,
                Err(TryRecvError::Empty) => {}
            }
        }
        self.closed
    }
}

impl<Q: JobQueue> Iterator for JobStream<Q> {
    type Item = Result<Delivery, QueueError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.shutdown_requested() {
                return None;
            }

            match self.queue.receive(&self.consumer, self.poll_interval) {
                Ok(Some(delivery)) => return Some(Ok(delivery)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
