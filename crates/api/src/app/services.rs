//! Infrastructure wiring behind the HTTP handlers.

use std::sync::{Arc, Mutex};

use tracing::info;

use asyncalc_core::Arithmetic;
use asyncalc_infra::config::AppConfig;
use asyncalc_infra::gateway::{ResultGateway, SubmissionGateway};
use asyncalc_infra::result_store::{InMemoryResultStore, ResultStore};
use asyncalc_infra::worker::{WorkerPool, WorkerPoolHandle, WorkerStats};
use asyncalc_queue::{InMemoryJobQueue, JobQueue};

pub type DynQueue = Arc<dyn JobQueue>;
pub type DynStore = Arc<dyn ResultStore>;

/// Which adapters back the gateways.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceMode {
    /// In-process queue and store, with embedded workers
    InMemory,
    /// Redis Streams queue and Redis store; workers run as separate processes
    Persistent,
}

pub struct AppServices {
    mode: ServiceMode,
    submissions: SubmissionGateway<DynQueue>,
    results: ResultGateway<DynStore>,
    workers: Mutex<Option<WorkerPoolHandle>>,
}

impl AppServices {
    pub fn new(
        mode: ServiceMode,
        queue: DynQueue,
        store: DynStore,
        workers: Option<WorkerPoolHandle>,
    ) -> Self {
        Self {
            mode,
            submissions: SubmissionGateway::new(queue),
            results: ResultGateway::new(store),
            workers: Mutex::new(workers),
        }
    }

    pub fn mode(&self) -> ServiceMode {
        self.mode
    }

    pub fn submissions(&self) -> &SubmissionGateway<DynQueue> {
        &self.submissions
    }

    pub fn results(&self) -> &ResultGateway<DynStore> {
        &self.results
    }

    /// Stats of the embedded workers, if any run in this process.
    pub fn worker_stats(&self) -> Option<WorkerStats> {
        self.workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(WorkerPoolHandle::stats)
    }

    /// Stop embedded workers. Blocks until they have finished their current job.
    pub fn shutdown(&self) {
        let pool = self
            .workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(pool) = pool {
            info!(workers = pool.len(), "stopping embedded workers");
            let stats = pool.shutdown();
            info!(
                received = stats.received,
                published = stats.published(),
                "embedded workers stopped"
            );
        }
    }
}

impl core::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppServices")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

pub fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    if config.use_persistent_stores {
        #[cfg(feature = "redis")]
        {
            return build_persistent_services(config);
        }
        #[cfg(not(feature = "redis"))]
        {
            tracing::warn!(
                "USE_PERSISTENT_STORES=true but redis feature not enabled, falling back to in-memory"
            );
            return build_in_memory_services(config);
        }
    }

    build_in_memory_services(config)
}

fn build_in_memory_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    // In-memory wiring (dev/test): queue + store + embedded worker pool.
    let queue = Arc::new(InMemoryJobQueue::new());
    let store = Arc::new(InMemoryResultStore::new());

    let pool = WorkerPool::spawn(
        config.worker.concurrency,
        Arc::clone(&queue),
        Arc::clone(&store),
        Arithmetic,
        config.worker.worker_config(),
    )?;

    info!(workers = pool.len(), "using in-memory queue and result store");
    Ok(AppServices::new(ServiceMode::InMemory, queue, store, Some(pool)))
}

#[cfg(feature = "redis")]
fn build_persistent_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    use asyncalc_infra::job_queue::RedisStreamsJobQueue;
    use asyncalc_infra::result_store::RedisResultStore;

    let queue = RedisStreamsJobQueue::new(
        &config.broker.url,
        Some(config.broker.queue_name.clone()),
        Some(config.broker.consumer_group.clone()),
    )?
    .with_pending_timeout(config.broker.pending_timeout);
    let store = RedisResultStore::new(&config.store.url, config.store.key_prefix.clone())?;

    info!(
        broker = %config.broker.url,
        store = %config.store.url,
        stream = %queue.stream_key(),
        "using redis queue and result store"
    );
    Ok(AppServices::new(
        ServiceMode::Persistent,
        Arc::new(queue),
        Arc::new(store),
        None,
    ))
}
