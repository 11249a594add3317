use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{info, warn};

use asyncalc_core::{CalcPayload, Job, JobId, RawCalcRequest, ValidationError};
use asyncalc_queue::{JobQueue, QueueError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Rejected before anything was enqueued.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    /// The channel did not accept the job; its id was never issued.
    #[error("dispatch failure: {0}")]
    DispatchFailure(#[source] QueueError),
}

/// Validates requests, assigns job ids and enqueues jobs.
#[derive(Debug)]
pub struct SubmissionGateway<Q> {
    queue: Q,
    declared: AtomicBool,
}

impl<Q: JobQueue> SubmissionGateway<Q> {
    pub fn new(queue: Q) -> Self {
        Self {
            queue,
            declared: AtomicBool::new(false),
        }
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Validate and enqueue one request.
    ///
    /// The returned id is only handed out once the broker has acknowledged
    /// the write.
    pub fn submit(&self, request: RawCalcRequest) -> Result<JobId, SubmitError> {
        let payload = CalcPayload::try_from(request)?;
        self.ensure_declared()?;

        let job = Job::new(payload);
        self.queue.enqueue(&job).map_err(|e| {
            warn!(job_id = %job.id, error = %e, "enqueue failed");
            SubmitError::DispatchFailure(e)
        })?;

        info!(job_id = %job.id, op = %payload.op, "job submitted");
        Ok(job.id)
    }

    /// Declare the channel on first use. Concurrent first calls may both declare.
    fn ensure_declared(&self) -> Result<(), SubmitError> {
        if self.declared.load(Ordering::Acquire) {
            return Ok(());
        }
        self.queue.declare().map_err(SubmitError::DispatchFailure)?;
        self.declared.store(true, Ordering::Release);
        Ok(())
    }
}
