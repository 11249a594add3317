//! Redis-backed result store.
//!
//! One string key per job: `<prefix><job_id>` holding the encoded outcome
//! (`"9"`, `"2.5"`, `"error:division by zero"`). Absence of the key means
//! pending. Expiry is left to the Redis deployment.

use redis::Commands;
use tracing::instrument;

use asyncalc_core::{JobId, LookupResult, Outcome};

use super::r#trait::{ResultStore, StoreError};

#[derive(Debug, Clone)]
pub struct RedisResultStore {
    client: redis::Client,
    key_prefix: String,
}

impl RedisResultStore {
    /// Create a store. No connection is made until the first operation.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `key_prefix` - prepended to every job id (may be empty)
    pub fn new(redis_url: impl AsRef<str>, key_prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            key_prefix: key_prefix.into(),
        })
    }

    fn key(&self, job_id: JobId) -> String {
        format!("{}{}", self.key_prefix, job_id)
    }

    fn connection(&self) -> Result<redis::Connection, StoreError> {
        self.client
            .get_connection()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

impl ResultStore for RedisResultStore {
    #[instrument(skip(self, outcome), fields(job_id = %outcome.job_id), err)]
    fn put(&self, outcome: &Outcome) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        let _: () = conn
            .set(self.key(outcome.job_id), outcome.encode_value())
            .map_err(|e| StoreError::Unavailable(format!("SET failed: {e}")))?;
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    fn get(&self, job_id: JobId) -> Result<LookupResult, StoreError> {
        let mut conn = self.connection()?;
        let raw: Option<String> = conn
            .get(self.key(job_id))
            .map_err(|e| StoreError::Unavailable(format!("GET failed: {e}")))?;

        match raw {
            None => Ok(LookupResult::Pending),
            Some(value) => Outcome::decode_value(job_id, &value)
                .map(LookupResult::Completed)
                .ok_or(StoreError::Corrupt { job_id, value }),
        }
    }
}
