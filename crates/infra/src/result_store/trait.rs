use std::sync::Arc;

use thiserror::Error;

use asyncalc_core::{JobId, LookupResult, Outcome};

/// Result store failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached or rejected the operation.
    #[error("result store unavailable: {0}")]
    Unavailable(String),

    /// A stored value is not a recognisable outcome.
    #[error("corrupt outcome for job {job_id}: {value:?}")]
    Corrupt { job_id: JobId, value: String },
}

/// Key-value mailbox mapping job id to outcome.
///
/// ## Semantics
///
/// - `put` is an unconditional upsert (last writer wins). Outcomes are computed
///   deterministically from immutable jobs, so a redelivered job overwrites
///   its key with an equal value.
/// - `get` returns `Pending` when no key exists.
/// - No cross-call transactions; eventual read-after-write visibility is
///   enough because callers poll.
pub trait ResultStore: Send + Sync {
    fn put(&self, outcome: &Outcome) -> Result<(), StoreError>;

    fn get(&self, job_id: JobId) -> Result<LookupResult, StoreError>;
}

impl<S> ResultStore for Arc<S>
where
    S: ResultStore + ?Sized,
{
    fn put(&self, outcome: &Outcome) -> Result<(), StoreError> {
        (**self).put(outcome)
    }

    fn get(&self, job_id: JobId) -> Result<LookupResult, StoreError> {
        (**self).get(job_id)
    }
}
