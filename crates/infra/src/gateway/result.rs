use thiserror::Error;
use tracing::{debug, warn};

use asyncalc_core::{JobId, LookupResult};

use crate::result_store::{ResultStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Distinct from `Pending`: the store could not answer at all.
    #[error("result store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
}

/// Read side of the result store, as seen by polling callers.
#[derive(Debug, Clone)]
pub struct ResultGateway<S> {
    store: S,
}

impl<S: ResultStore> ResultGateway<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn fetch(&self, job_id: JobId) -> Result<LookupResult, FetchError> {
        self.store.get(job_id).map_err(|e| {
            warn!(job_id = %job_id, error = %e, "result lookup failed");
            FetchError::StoreUnavailable(e)
        })
    }

    /// Look up a caller-supplied key.
    ///
    /// A key that is not a job id was never issued, so it reads as `Pending`
    /// just like an unknown id.
    pub fn fetch_key(&self, key: &str) -> Result<LookupResult, FetchError> {
        match key.parse::<JobId>() {
            Ok(job_id) => self.fetch(job_id),
            Err(_) => {
                debug!(key, "lookup for a key that is not a job id");
                Ok(LookupResult::Pending)
            }
        }
    }
}
