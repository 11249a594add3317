//! Standalone worker process: consumes jobs from Redis Streams and writes
//! outcomes to the Redis result store.

use std::sync::Arc;

use anyhow::Context;

use asyncalc_core::Arithmetic;
use asyncalc_infra::config::AppConfig;
use asyncalc_infra::job_queue::RedisStreamsJobQueue;
use asyncalc_infra::result_store::RedisResultStore;
use asyncalc_infra::worker::WorkerPool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    asyncalc_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let queue = RedisStreamsJobQueue::new(
        &config.broker.url,
        Some(config.broker.queue_name.clone()),
        Some(config.broker.consumer_group.clone()),
    )
    .context("invalid broker url")?
    .with_pending_timeout(config.broker.pending_timeout);
    let store = RedisResultStore::new(&config.store.url, config.store.key_prefix.clone())
        .context("invalid store url")?;

    tracing::info!(
        broker = %config.broker.url,
        store = %config.store.url,
        stream = %queue.stream_key(),
        group = %queue.group(),
        concurrency = config.worker.concurrency,
        ack_policy = %config.worker.ack_policy,
        "starting workers"
    );

    // Workers retry the broker on their own; startup order does not matter.
    let pool = WorkerPool::spawn(
        config.worker.concurrency,
        Arc::new(queue),
        Arc::new(store),
        Arithmetic,
        config.worker.worker_config(),
    )
    .context("failed to spawn worker threads")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("shutdown requested");

    let stats = tokio::task::spawn_blocking(move || pool.shutdown()).await?;

    tracing::info!(
        received = stats.received,
        succeeded = stats.succeeded,
        computation_errors = stats.computation_errors,
        poison_messages = stats.poison_messages,
        publish_failures = stats.publish_failures,
        redeliveries = stats.redeliveries,
        receive_errors = stats.receive_errors,
        "workers stopped"
    );
    Ok(())
}
