//! Integration tests for the full calculation pipeline.
//!
//! Tests: SubmissionGateway → JobQueue → Worker → ResultStore → ResultGateway
//!
//! Verifies:
//! - Submitted jobs complete with the right value or computation error
//! - Concurrent submissions never mix results
//! - Crash recovery follows the configured ack policy
//! - Store and broker outages delay results without losing them

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    use serde_json::json;

    use asyncalc_core::{
        Arithmetic, CalcPayload, Computation, ComputationError, Job, JobId, LookupResult, Outcome,
        OutcomeStatus, RawCalcRequest, ValidationError,
    };
    use asyncalc_queue::{Delivery, InMemoryJobQueue, JobQueue, QueueError};

    use crate::gateway::{ResultGateway, SubmissionGateway, SubmitError};
    use crate::result_store::{InMemoryResultStore, ResultStore, StoreError};
    use crate::retry::RetryPolicy;
    use crate::worker::{AckPolicy, Worker, WorkerConfig, WorkerPool};

    type Queue = Arc<InMemoryJobQueue>;
    type Store = Arc<InMemoryResultStore>;

    fn worker_config(policy: AckPolicy) -> WorkerConfig {
        WorkerConfig::default()
            .with_poll_interval(Duration::from_millis(10))
            .with_ack_policy(policy)
            .with_publish_retry(RetryPolicy::fixed(2, Duration::from_millis(1)))
            .with_connect_retry(RetryPolicy::fixed(u32::MAX, Duration::from_millis(5)))
    }

    fn setup() -> (Queue, Store, SubmissionGateway<Queue>, ResultGateway<Store>) {
        let queue = Arc::new(InMemoryJobQueue::new());
        let store = Arc::new(InMemoryResultStore::new());
        let submissions = SubmissionGateway::new(Arc::clone(&queue));
        let results = ResultGateway::new(Arc::clone(&store));
        (queue, store, submissions, results)
    }

    fn request(a: impl Into<serde_json::Value>, b: impl Into<serde_json::Value>, op: &str) -> RawCalcRequest {
        serde_json::from_value(json!({"a": a.into(), "b": b.into(), "op": op})).unwrap()
    }

    /// Poll until `check` holds or `timeout` passes.
    fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        check()
    }

    fn await_outcome<S: ResultStore>(results: &ResultGateway<S>, id: JobId) -> Outcome {
        let mut found = None;
        let done = eventually(Duration::from_secs(5), || {
            found = results.fetch(id).ok().and_then(|r| r.outcome().cloned());
            found.is_some()
        });
        assert!(done, "job {id} never completed");
        found.unwrap()
    }

    /// Panics on its first computation, like a worker process dying mid-job.
    fn crash_once() -> impl Computation + Clone {
        let crashed = Arc::new(AtomicBool::new(false));
        move |payload: &CalcPayload| -> Result<f64, ComputationError> {
            if !crashed.swap(true, Ordering::SeqCst) {
                panic!("simulated worker crash");
            }
            Arithmetic.compute(payload)
        }
    }

    #[test]
    fn addition_completes_with_value() {
        let (queue, store, submissions, results) = setup();
        let pool = WorkerPool::spawn(2, queue, store, Arithmetic, worker_config(AckPolicy::AfterPublish)).unwrap();

        let id = submissions.submit(request(6, 3, "+")).unwrap();
        assert_eq!(await_outcome(&results, id), Outcome::success(id, 9.0));

        pool.shutdown();
    }

    #[test]
    fn division_by_zero_completes_with_error() {
        let (queue, store, submissions, results) = setup();
        let pool = WorkerPool::spawn(1, queue, store, Arithmetic, worker_config(AckPolicy::AfterPublish)).unwrap();

        let id = submissions.submit(request(6, 0, "/")).unwrap();
        let outcome = await_outcome(&results, id);
        assert_eq!(
            outcome.status,
            OutcomeStatus::ComputationError {
                detail: "division by zero".to_string()
            }
        );

        pool.shutdown();
    }

    #[test]
    fn unknown_operation_is_rejected_and_never_queued() {
        let (queue, _store, submissions, _results) = setup();

        let err = submissions.submit(request(6, 3, "%")).unwrap_err();
        assert!(matches!(
            err,
            SubmitError::InvalidRequest(ValidationError::UnknownOperation(_))
        ));
        assert!(queue.is_empty());
        assert_eq!(queue.in_flight(), 0);
    }

    #[test]
    fn unknown_id_stays_pending() {
        let (_queue, _store, _submissions, results) = setup();
        assert_eq!(results.fetch(JobId::new()).unwrap(), LookupResult::Pending);
        assert_eq!(results.fetch_key("not-a-task").unwrap(), LookupResult::Pending);
    }

    #[test]
    fn concurrent_submissions_never_mix_results() {
        let (queue, store, submissions, results) = setup();
        let pool = WorkerPool::spawn(4, queue, store, Arithmetic, worker_config(AckPolicy::AfterPublish)).unwrap();
        let submissions = Arc::new(submissions);

        let submitters: Vec<_> = (0..8)
            .map(|t| {
                let submissions = Arc::clone(&submissions);
                thread::spawn(move || {
                    (0..25)
                        .map(|i| {
                            let a = (t * 100 + i) as f64;
                            let id = submissions.submit(request(a, 0.5, "*")).unwrap();
                            (id, a * 0.5)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let expected: Vec<(JobId, f64)> = submitters
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        let mut ids: Vec<_> = expected.iter().map(|(id, _)| *id).collect();
        ids.sort_by_key(|id| *id.as_uuid());
        ids.dedup();
        assert_eq!(ids.len(), 200, "job ids must be unique");

        for (id, value) in expected {
            assert_eq!(await_outcome(&results, id), Outcome::success(id, value));
        }
        assert_eq!(pool.stats().succeeded, 200);

        pool.shutdown();
    }

    #[test]
    fn crash_after_dequeue_is_redelivered_under_after_publish() {
        let (queue, store, submissions, results) = setup();
        let id = submissions.submit(request(6, 3, "+")).unwrap();

        let doomed = Worker::new(Arc::clone(&store), crash_once(), worker_config(AckPolicy::AfterPublish))
            .spawn(Arc::clone(&queue))
            .unwrap();
        assert!(eventually(Duration::from_secs(5), || doomed.is_finished()));
        doomed.shutdown();

        assert_eq!(results.fetch(id).unwrap(), LookupResult::Pending);
        assert_eq!(queue.in_flight(), 1);
        assert_eq!(queue.requeue_unacked().unwrap(), 1);

        let survivor = Worker::new(Arc::clone(&store), Arithmetic, worker_config(AckPolicy::AfterPublish))
            .spawn(Arc::clone(&queue))
            .unwrap();
        assert_eq!(await_outcome(&results, id), Outcome::success(id, 9.0));
        assert!(eventually(Duration::from_secs(1), || survivor.stats().redeliveries == 1));

        survivor.shutdown();
    }

    #[test]
    fn crash_after_dequeue_loses_job_under_on_dequeue() {
        let (queue, store, submissions, results) = setup();
        let id = submissions.submit(request(6, 3, "+")).unwrap();

        let doomed = Worker::new(Arc::clone(&store), crash_once(), worker_config(AckPolicy::OnDequeue))
            .spawn(Arc::clone(&queue))
            .unwrap();
        assert!(eventually(Duration::from_secs(5), || doomed.is_finished()));
        doomed.shutdown();

        assert_eq!(queue.in_flight(), 0);
        assert_eq!(queue.requeue_unacked().unwrap(), 0);

        let survivor = Worker::new(Arc::clone(&store), Arithmetic, worker_config(AckPolicy::OnDequeue))
            .spawn(Arc::clone(&queue))
            .unwrap();
        let later = submissions.submit(request(1, 1, "+")).unwrap();
        assert_eq!(await_outcome(&results, later), Outcome::success(later, 2.0));
        assert_eq!(results.fetch(id).unwrap(), LookupResult::Pending);

        survivor.shutdown();
    }

    /// Store whose writes fail while `down` is set.
    struct OutageStore {
        inner: InMemoryResultStore,
        down: AtomicBool,
    }

    impl ResultStore for OutageStore {
        fn put(&self, outcome: &Outcome) -> Result<(), StoreError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("connection refused".into()));
            }
            self.inner.put(outcome)
        }

        fn get(&self, job_id: JobId) -> Result<LookupResult, StoreError> {
            self.inner.get(job_id)
        }
    }

    #[test]
    fn store_outage_delays_but_does_not_lose_results() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let store = Arc::new(OutageStore {
            inner: InMemoryResultStore::new(),
            down: AtomicBool::new(true),
        });
        let submissions = SubmissionGateway::new(Arc::clone(&queue));
        let results = ResultGateway::new(Arc::clone(&store));

        let worker = Worker::new(Arc::clone(&store), Arithmetic, worker_config(AckPolicy::AfterPublish))
            .spawn(Arc::clone(&queue))
            .unwrap();
        let id = submissions.submit(request(10, 4, "-")).unwrap();

        assert!(eventually(Duration::from_secs(5), || worker.stats().publish_failures >= 1));
        assert_eq!(results.fetch(id).unwrap(), LookupResult::Pending);

        store.down.store(false, Ordering::SeqCst);
        assert_eq!(await_outcome(&results, id), Outcome::success(id, 6.0));

        worker.shutdown();
        assert!(queue.is_empty());
        assert_eq!(queue.in_flight(), 0);
    }

    #[test]
    fn poison_messages_do_not_stop_the_worker() {
        let (queue, store, submissions, results) = setup();
        queue.push_raw("definitely not json").unwrap();
        queue.push_raw(r#"{"a": 1, "b": 2, "op": "+"}"#).unwrap();

        let worker = Worker::new(Arc::clone(&store), Arithmetic, worker_config(AckPolicy::AfterPublish))
            .spawn(Arc::clone(&queue))
            .unwrap();
        let id = submissions.submit(request("2.5", "4", "*")).unwrap();

        assert_eq!(await_outcome(&results, id), Outcome::success(id, 10.0));
        assert_eq!(worker.stats().poison_messages, 2);
        assert_eq!(queue.in_flight(), 0);

        worker.shutdown();
    }

    /// Broker that refuses every operation until `up` is set.
    struct LateBroker {
        inner: InMemoryJobQueue,
        up: AtomicBool,
    }

    impl LateBroker {
        fn check(&self) -> Result<(), QueueError> {
            if self.up.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(QueueError::Unavailable("connection refused".into()))
            }
        }
    }

    impl JobQueue for LateBroker {
        fn declare(&self) -> Result<(), QueueError> {
            self.check()
        }

        fn enqueue(&self, job: &Job) -> Result<(), QueueError> {
            self.check()?;
            self.inner.enqueue(job)
        }

        fn receive(&self, consumer: &str, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
            self.check()?;
            self.inner.receive(consumer, timeout)
        }

        fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
            self.check()?;
            self.inner.ack(delivery)
        }

        fn release(&self, delivery: Delivery) -> Result<(), QueueError> {
            self.check()?;
            self.inner.release(delivery)
        }
    }

    #[test]
    fn worker_started_before_broker_waits_for_it() {
        let broker = Arc::new(LateBroker {
            inner: InMemoryJobQueue::new(),
            up: AtomicBool::new(false),
        });
        let store = Arc::new(InMemoryResultStore::new());
        let submissions = SubmissionGateway::new(Arc::clone(&broker));
        let results = ResultGateway::new(Arc::clone(&store));

        let worker = Worker::new(Arc::clone(&store), Arithmetic, worker_config(AckPolicy::AfterPublish))
            .spawn(Arc::clone(&broker))
            .unwrap();

        assert!(matches!(
            submissions.submit(request(6, 3, "+")),
            Err(SubmitError::DispatchFailure(QueueError::Unavailable(_)))
        ));
        thread::sleep(Duration::from_millis(50));
        assert!(!worker.is_finished());

        broker.up.store(true, Ordering::SeqCst);
        let id = submissions.submit(request(6, 3, "+")).unwrap();
        assert_eq!(await_outcome(&results, id), Outcome::success(id, 9.0));

        worker.shutdown();
    }

    #[test]
    fn broker_outage_mid_run_does_not_end_the_worker() {
        let broker = Arc::new(LateBroker {
            inner: InMemoryJobQueue::new(),
            up: AtomicBool::new(true),
        });
        let store = Arc::new(InMemoryResultStore::new());
        let submissions = SubmissionGateway::new(Arc::clone(&broker));
        let results = ResultGateway::new(Arc::clone(&store));

        let worker = Worker::new(Arc::clone(&store), Arithmetic, worker_config(AckPolicy::AfterPublish))
            .spawn(Arc::clone(&broker))
            .unwrap();
        let before = submissions.submit(request(2, 2, "+")).unwrap();
        assert_eq!(await_outcome(&results, before), Outcome::success(before, 4.0));

        broker.up.store(false, Ordering::SeqCst);
        assert!(eventually(Duration::from_secs(5), || worker.stats().receive_errors >= 2));
        assert!(!worker.is_finished());

        broker.up.store(true, Ordering::SeqCst);
        let after = submissions.submit(request(3, 3, "*")).unwrap();
        assert_eq!(await_outcome(&results, after), Outcome::success(after, 9.0));

        worker.shutdown();
    }

    #[test]
    fn fetch_right_after_submit_is_pending() {
        let (queue, _store, submissions, results) = setup();

        let id = submissions.submit(request(6, 3, "+")).unwrap();

        assert_eq!(results.fetch(id).unwrap(), LookupResult::Pending);
        assert_eq!(results.fetch_key(&id.to_string()).unwrap(), LookupResult::Pending);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn redelivered_job_rewrites_the_same_outcome() {
        let (queue, store, submissions, results) = setup();
        let id = submissions.submit(request(7, 2, "/")).unwrap();

        // First attempt publishes but "dies" before acking.
        let delivery = queue.receive("first", Duration::ZERO).unwrap().unwrap();
        let job = Job::decode(delivery.body()).unwrap();
        store
            .put(&Outcome::from_result(job.id, Arithmetic.compute(&job.payload)))
            .unwrap();
        assert_eq!(queue.requeue_unacked().unwrap(), 1);

        let worker = Worker::new(Arc::clone(&store), Arithmetic, worker_config(AckPolicy::AfterPublish))
            .spawn(Arc::clone(&queue))
            .unwrap();
        assert!(eventually(Duration::from_secs(5), || worker.stats().succeeded == 1));

        assert_eq!(await_outcome(&results, id), Outcome::success(id, 3.5));
        assert_eq!(store.len(), 1);

        worker.shutdown();
    }
}
