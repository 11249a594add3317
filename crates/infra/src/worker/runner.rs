//! The worker loop: dequeue, compute, publish, acknowledge.

use std::sync::{Arc, Mutex, MutexGuard, mpsc};
use std::thread;

use tracing::{debug, error, info, warn};

use asyncalc_core::{Computation, ComputationError, DecodeError, Job, Outcome};
use asyncalc_queue::{Delivery, JobQueue, JobStream};

use super::config::{AckPolicy, WorkerConfig};
use super::pool::WorkerHandle;
use super::stats::WorkerStats;
use crate::result_store::ResultStore;

/// What happened to one delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum Processed {
    /// The outcome is in the store.
    Published(Outcome),
    /// The record carried no job id; it was acknowledged and dropped.
    Poison,
    /// Publishing gave up. Under `AfterPublish` the delivery was released.
    Unpublished(Outcome),
}

/// One worker: a result store, a computation and a configuration.
///
/// The queue side is supplied by the [`JobStream`] passed to [`Worker::run`],
/// so the same worker logic drives both the Redis and in-memory channels.
pub struct Worker<S, C> {
    store: S,
    computation: C,
    config: WorkerConfig,
    stats: Arc<Mutex<WorkerStats>>,
}

impl<S, C> Worker<S, C>
where
    S: ResultStore,
    C: Computation,
{
    pub fn new(store: S, computation: C, config: WorkerConfig) -> Self {
        Self {
            store,
            computation,
            config,
            stats: Arc::new(Mutex::new(WorkerStats::default())),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats_mut().clone()
    }

    fn stats_mut(&self) -> MutexGuard<'_, WorkerStats> {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run on a dedicated thread named after the worker.
    pub fn spawn<Q>(self, queue: Q) -> std::io::Result<WorkerHandle>
    where
        Q: JobQueue + 'static,
        S: 'static,
        C: 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let name = self.config.name.clone();
        let stats = Arc::clone(&self.stats);

        let join = thread::Builder::new().name(name.clone()).spawn(move || {
            let mut stream = JobStream::new(
                queue,
                self.config.name.clone(),
                self.config.poll_interval,
                shutdown_rx,
            );
            self.run(&mut stream);
        })?;

        Ok(WorkerHandle::new(name, shutdown_tx, join, stats))
    }

    /// Consume `stream` until it is shut down.
    ///
    /// Declares the channel first, retrying per the connect policy, so a worker
    /// may start before its broker does.
    pub fn run<Q: JobQueue>(&self, stream: &mut JobStream<Q>) {
        if !self.await_broker(stream) {
            info!(worker = %self.config.name, "worker stopped before the broker became ready");
            return;
        }

        info!(
            worker = %self.config.name,
            ack_policy = %self.config.ack_policy,
            "worker started"
        );

        while let Some(item) = stream.next() {
            match item {
                Ok(delivery) => {
                    self.process(stream, delivery);
                }
                Err(e) => {
                    self.stats_mut().receive_errors += 1;
                    warn!(worker = %self.config.name, error = %e, "receive failed");
                    stream.pause(self.config.poll_interval);
                }
            }
        }

        info!(worker = %self.config.name, "worker stopped");
    }

    fn await_broker<Q: JobQueue>(&self, stream: &mut JobStream<Q>) -> bool {
        let policy = &self.config.connect_retry;
        let mut attempt = 1;

        loop {
            match stream.queue().declare() {
                Ok(()) => return true,
                Err(e) => {
                    if !policy.should_retry(attempt) {
                        error!(worker = %self.config.name, attempt, error = %e, "broker unreachable; giving up");
                        return false;
                    }
                    let delay = policy.delay_for_attempt(attempt);
                    warn!(
                        worker = %self.config.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "broker not ready"
                    );
                    if stream.pause(delay) {
                        return false;
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Handle a single delivery end to end.
    pub fn process<Q: JobQueue>(&self, stream: &mut JobStream<Q>, delivery: Delivery) -> Processed {
        let policy = self.config.ack_policy;
        {
            let mut stats = self.stats_mut();
            stats.received += 1;
            if delivery.is_redelivery() {
                stats.redeliveries += 1;
            }
        }

        if policy == AckPolicy::OnDequeue {
            self.ack(stream.queue(), &delivery);
        }

        let outcome = match Job::decode(delivery.body()) {
            Ok(job) => {
                debug!(
                    worker = %self.config.name,
                    job_id = %job.id,
                    delivery_count = delivery.delivery_count(),
                    "computing"
                );
                Outcome::from_result(job.id, self.computation.compute(&job.payload))
            }
            Err(DecodeError::Malformed { job_id, reason }) => {
                warn!(worker = %self.config.name, job_id = %job_id, %reason, "malformed job record");
                Outcome::computation_error(job_id, &ComputationError::MalformedPayload(reason))
            }
            Err(DecodeError::MissingId(reason)) => {
                warn!(
                    worker = %self.config.name,
                    tag = %delivery.tag(),
                    %reason,
                    "dropping poison message"
                );
                if policy == AckPolicy::AfterPublish {
                    self.ack(stream.queue(), &delivery);
                }
                self.stats_mut().poison_messages += 1;
                return Processed::Poison;
            }
        };

        if self.publish(stream, &outcome) {
            if policy == AckPolicy::AfterPublish {
                self.ack(stream.queue(), &delivery);
            }
            let mut stats = self.stats_mut();
            if outcome.is_success() {
                stats.succeeded += 1;
            } else {
                stats.computation_errors += 1;
            }
            debug!(worker = %self.config.name, job_id = %outcome.job_id, "outcome published");
            return Processed::Published(outcome);
        }

        self.stats_mut().publish_failures += 1;
        match policy {
            AckPolicy::AfterPublish => {
                if let Err(e) = stream.queue().release(delivery) {
                    warn!(worker = %self.config.name, job_id = %outcome.job_id, error = %e, "release failed");
                }
            }
            AckPolicy::OnDequeue => {
                error!(
                    worker = %self.config.name,
                    job_id = %outcome.job_id,
                    "outcome lost; job will stay pending"
                );
            }
        }
        Processed::Unpublished(outcome)
    }

    /// Store `outcome`, retrying per the publish policy. Backoff waits end early on shutdown.
    fn publish<Q: JobQueue>(&self, stream: &mut JobStream<Q>, outcome: &Outcome) -> bool {
        let policy = &self.config.publish_retry;
        let mut attempt = 1;

        loop {
            match self.store.put(outcome) {
                Ok(()) => return true,
                Err(e) => {
                    if !policy.should_retry(attempt) {
                        error!(
                            worker = %self.config.name,
                            job_id = %outcome.job_id,
                            attempt,
                            error = %e,
                            "publish failed; retries exhausted"
                        );
                        return false;
                    }
                    let delay = policy.delay_for_attempt(attempt);
                    warn!(
                        worker = %self.config.name,
                        job_id = %outcome.job_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "publish failed; retrying"
                    );
                    if stream.pause(delay) {
                        return false;
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn ack<Q: JobQueue>(&self, queue: &Q, delivery: &Delivery) {
        if let Err(e) = queue.ack(delivery) {
            warn!(worker = %self.config.name, tag = %delivery.tag(), error = %e, "ack failed");
        }
    }
}

impl<S, C> core::fmt::Debug for Worker<S, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Worker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
