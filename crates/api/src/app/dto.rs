use serde::Serialize;

use asyncalc_core::{JobId, Outcome, OutcomeStatus};

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub task_id: String,
    pub status: &'static str,
}

impl SubmitResponse {
    pub fn accepted(task_id: JobId) -> Self {
        Self {
            task_id: task_id.to_string(),
            status: "accepted",
        }
    }
}

/// Poll response. `result` and `error` are mutually exclusive and only
/// present once the job has completed.
#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultResponse {
    pub fn pending() -> Self {
        Self {
            status: "pending",
            result: None,
            error: None,
        }
    }

    pub fn completed(outcome: &Outcome) -> Self {
        let (result, error) = match &outcome.status {
            OutcomeStatus::Success { value } => (Some(*value), None),
            OutcomeStatus::ComputationError { detail } => (None, Some(detail.clone())),
        };
        Self {
            status: "completed",
            result,
            error,
        }
    }
}
