//! Job outcomes and lookup results.

use serde::{Deserialize, Serialize};

use crate::error::ComputationError;
use crate::id::JobId;

const ERROR_PREFIX: &str = "error:";

/// Terminal state of a job: a value, or a domain error detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success { value: f64 },
    ComputationError { detail: String },
}

/// The result published for a job id. Written once per job (idempotently
/// overwritten on redelivery), never retracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub job_id: JobId,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl Outcome {
    pub fn success(job_id: JobId, value: f64) -> Self {
        Self {
            job_id,
            status: OutcomeStatus::Success { value },
        }
    }

    pub fn computation_error(job_id: JobId, error: &ComputationError) -> Self {
        Self {
            job_id,
            status: OutcomeStatus::ComputationError {
                detail: error.to_string(),
            },
        }
    }

    pub fn from_result(job_id: JobId, result: Result<f64, ComputationError>) -> Self {
        match result {
            Ok(value) => Self::success(job_id, value),
            Err(e) => Self::computation_error(job_id, &e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success { .. })
    }

    /// Store encoding: the bare number on success, `error:<detail>` otherwise.
    pub fn encode_value(&self) -> String {
        match &self.status {
            OutcomeStatus::Success { value } => value.to_string(),
            OutcomeStatus::ComputationError { detail } => format!("{ERROR_PREFIX}{detail}"),
        }
    }

    /// Inverse of [`Outcome::encode_value`]. `None` if the value is neither form.
    pub fn decode_value(job_id: JobId, raw: &str) -> Option<Self> {
        if let Some(detail) = raw.strip_prefix(ERROR_PREFIX) {
            return Some(Self {
                job_id,
                status: OutcomeStatus::ComputationError {
                    detail: detail.to_string(),
                },
            });
        }

        let value = raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
        Some(Self::success(job_id, value))
    }
}

/// What a poller sees for a job id. Derived on read, never stored.
///
/// `Pending` covers both "accepted, not finished" and "never issued"; the
/// store has no record that would tell them apart.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupResult {
    Pending,
    Completed(Outcome),
}

impl LookupResult {
    pub fn is_pending(&self) -> bool {
        matches!(self, LookupResult::Pending)
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        match self {
            LookupResult::Pending => None,
            LookupResult::Completed(outcome) => Some(outcome),
        }
    }
}
