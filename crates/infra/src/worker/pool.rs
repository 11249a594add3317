use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use tracing::{info, warn};

use asyncalc_core::Computation;
use asyncalc_queue::JobQueue;

use super::config::WorkerConfig;
use super::runner::Worker;
use super::stats::WorkerStats;
use crate::result_store::ResultStore;

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl WorkerHandle {
    pub(crate) fn new(
        name: String,
        shutdown: mpsc::Sender<()>,
        join: thread::JoinHandle<()>,
        stats: Arc<Mutex<WorkerStats>>,
    ) -> Self {
        Self {
            name,
            shutdown,
            join: Some(join),
            stats,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Whether the worker thread has exited (shut down or panicked).
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|j| j.is_finished())
    }

    fn signal(&self) {
        let _ = self.shutdown.send(());
    }

    fn join(&mut self) {
        if let Some(j) = self.join.take() {
            if j.join().is_err() {
                warn!(worker = %self.name, "worker thread panicked");
            }
        }
    }

    /// Request graceful shutdown and wait for the worker to stop.
    ///
    /// A delivery being processed is finished first.
    pub fn shutdown(mut self) {
        self.signal();
        self.join();
    }
}

/// `n` independent workers competing on one channel.
#[derive(Debug)]
pub struct WorkerPool;

impl WorkerPool {
    /// Spawn `concurrency` workers named `<config.name>-<i>`.
    pub fn spawn<Q, S, C>(
        concurrency: usize,
        queue: Q,
        store: S,
        computation: C,
        config: WorkerConfig,
    ) -> std::io::Result<WorkerPoolHandle>
    where
        Q: JobQueue + Clone + 'static,
        S: ResultStore + Clone + 'static,
        C: Computation + Clone + 'static,
    {
        let mut workers = Vec::with_capacity(concurrency);
        for i in 0..concurrency {
            let worker_config = config.clone().with_name(format!("{}-{i}", config.name));
            let worker = Worker::new(store.clone(), computation.clone(), worker_config);
            match worker.spawn(queue.clone()) {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    WorkerPoolHandle { workers }.shutdown();
                    return Err(e);
                }
            }
        }

        info!(prefix = %config.name, concurrency, "worker pool started");
        Ok(WorkerPoolHandle { workers })
    }
}

/// Handle over every worker of a pool.
#[derive(Debug)]
pub struct WorkerPoolHandle {
    workers: Vec<WorkerHandle>,
}

impl WorkerPoolHandle {
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    /// Statistics summed over all workers.
    pub fn stats(&self) -> WorkerStats {
        let mut total = WorkerStats::default();
        for worker in &self.workers {
            total.merge(&worker.stats());
        }
        total
    }

    /// Signal every worker, then join them all.
    ///
    /// Returns the summed statistics once every worker has stopped, so jobs
    /// finished during shutdown are counted.
    pub fn shutdown(mut self) -> WorkerStats {
        for worker in &self.workers {
            worker.signal();
        }
        for worker in &mut self.workers {
            worker.join();
        }
        self.stats()
    }
}
