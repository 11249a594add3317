//! In-memory job queue for tests/dev.

use std::collections::{HashMap, VecDeque};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

use asyncalc_core::Job;

use crate::queue::{Delivery, JobQueue, QueueError};

#[derive(Debug, Clone)]
struct Message {
    body: String,
    delivery_count: u32,
}

#[derive(Debug)]
struct InFlight {
    seq: u64,
    message: Message,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Message>,
    in_flight: HashMap<String, InFlight>,
    next_seq: u64,
}

/// In-process broker.
///
/// - No IO
/// - FIFO hand-out to competing consumers
/// - Deliveries stay in flight until acked or released
/// - `requeue_unacked` models the broker detecting dead consumers
#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>, QueueError> {
        self.state
            .lock()
            .map_err(|_| QueueError::Unavailable("in-memory queue lock poisoned".to_string()))
    }

    /// Append a raw record, bypassing job encoding (records from other submitters).
    pub fn push_raw(&self, body: impl Into<String>) -> Result<(), QueueError> {
        let mut state = self.lock()?;
        state.ready.push_back(Message {
            body: body.into(),
            delivery_count: 0,
        });
        self.available.notify_one();
        Ok(())
    }

    /// Return every unacknowledged delivery to the head of the queue, oldest first.
    ///
    /// Returns the number of deliveries requeued.
    pub fn requeue_unacked(&self) -> Result<usize, QueueError> {
        let mut state = self.lock()?;
        let mut in_flight: Vec<InFlight> = state.in_flight.drain().map(|(_, f)| f).collect();
        in_flight.sort_by_key(|f| f.seq);

        let count = in_flight.len();
        for f in in_flight.into_iter().rev() {
            state.ready.push_front(f.message);
        }
        if count > 0 {
            debug!(count, "requeued unacknowledged deliveries");
            self.available.notify_all();
        }
        Ok(count)
    }

    /// Messages waiting to be delivered.
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.ready.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliveries handed out but not yet acked or released.
    pub fn in_flight(&self) -> usize {
        self.state.lock().map(|s| s.in_flight.len()).unwrap_or(0)
    }
}

impl JobQueue for InMemoryJobQueue {
    fn declare(&self) -> Result<(), QueueError> {
        Ok(())
    }

    fn enqueue(&self, job: &Job) -> Result<(), QueueError> {
        let body = job
            .encode()
            .map_err(|e| QueueError::Serialization(e.to_string()))?;
        self.push_raw(body)
    }

    fn receive(&self, consumer: &str, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock()?;

        while state.ready.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (guard, _) = self
                .available
                .wait_timeout(state, deadline - now)
                .map_err(|_| QueueError::Unavailable("in-memory queue lock poisoned".to_string()))?;
            state = guard;
        }

        let Some(mut message) = state.ready.pop_front() else {
            return Ok(None);
        };
        message.delivery_count += 1;

        let seq = state.next_seq;
        state.next_seq += 1;
        let tag = format!("{consumer}#{seq}");

        let delivery = Delivery::new(tag.clone(), message.body.clone(), message.delivery_count);
        state.in_flight.insert(tag, InFlight { seq, message });
        Ok(Some(delivery))
    }

    fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut state = self.lock()?;
        state
            .in_flight
            .remove(delivery.tag())
            .map(|_| ())
            .ok_or_else(|| QueueError::UnknownDelivery(delivery.tag().to_string()))
    }

    fn release(&self, delivery: Delivery) -> Result<(), QueueError> {
        let mut state = self.lock()?;
        let f = state
            .in_flight
            .remove(delivery.tag())
            .ok_or_else(|| QueueError::UnknownDelivery(delivery.tag().to_string()))?;
        state.ready.push_front(f.message);
        self.available.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use asyncalc_core::{CalcPayload, Operation};

    use super::*;

    fn job() -> Job {
        Job::new(CalcPayload::new(6.0, 3.0, Operation::Add))
    }

    const NO_WAIT: Duration = Duration::from_millis(0);

    #[test]
    fn ack_removes_delivery_for_good() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(&job()).unwrap();

        let d = queue.receive("c", NO_WAIT).unwrap().unwrap();
        assert_eq!(queue.in_flight(), 1);
        queue.ack(&d).unwrap();

        assert_eq!(queue.in_flight(), 0);
        assert_eq!(queue.requeue_unacked().unwrap(), 0);
        assert!(queue.receive("c", NO_WAIT).unwrap().is_none());
        assert_eq!(queue.ack(&d), Err(QueueError::UnknownDelivery(d.tag().to_string())));
    }

    #[test]
    fn release_redelivers_first() {
        let queue = InMemoryJobQueue::new();
        let first = job();
        queue.enqueue(&first).unwrap();
        queue.enqueue(&job()).unwrap();

        let d = queue.receive("c", NO_WAIT).unwrap().unwrap();
        assert!(!d.is_redelivery());
        queue.release(d).unwrap();

        let again = queue.receive("c", NO_WAIT).unwrap().unwrap();
        assert_eq!(Job::decode(again.body()).unwrap().id, first.id);
        assert_eq!(again.delivery_count(), 2);
        assert!(again.is_redelivery());
    }

    #[test]
    fn requeue_unacked_restores_fifo_order() {
        let queue = InMemoryJobQueue::new();
        let jobs: Vec<Job> = (0..3).map(|_| job()).collect();
        for j in &jobs {
            queue.enqueue(j).unwrap();
        }

        // A consumer takes everything and dies without acking.
        for _ in 0..3 {
            queue.receive("dead", NO_WAIT).unwrap().unwrap();
        }
        assert_eq!(queue.requeue_unacked().unwrap(), 3);

        for j in &jobs {
            let d = queue.receive("alive", NO_WAIT).unwrap().unwrap();
            assert_eq!(Job::decode(d.body()).unwrap().id, j.id);
        }
    }

    #[test]
    fn receive_times_out_when_empty() {
        let queue = InMemoryJobQueue::new();
        let started = Instant::now();
        assert!(queue.receive("c", Duration::from_millis(20)).unwrap().is_none());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn blocked_receiver_wakes_on_enqueue() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let q = queue.clone();
        let receiver = thread::spawn(move || q.receive("c", Duration::from_secs(5)).unwrap());

        thread::sleep(Duration::from_millis(20));
        queue.enqueue(&job()).unwrap();

        assert!(receiver.join().unwrap().is_some());
    }

    #[test]
    fn each_message_goes_to_exactly_one_consumer() {
        let queue = Arc::new(InMemoryJobQueue::new());
        for _ in 0..100 {
            queue.enqueue(&job()).unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let q = queue.clone();
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(d) = q.receive(&format!("c{i}"), Duration::from_millis(20)).unwrap() {
                        seen.push(Job::decode(d.body()).unwrap().id);
                        q.ack(&d).unwrap();
                    }
                    seen
                })
            })
            .collect();

        let mut all: Vec<_> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        let total = all.len();
        all.sort_by_key(|id| *id.as_uuid());
        all.dedup();
        assert_eq!(total, 100);
        assert_eq!(all.len(), 100);
    }
}
