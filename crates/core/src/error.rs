//! Domain error model.

use thiserror::Error;

use crate::id::JobId;

/// Result type for boundary validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// A submission was rejected before anything was queued.
///
/// Deterministic: retrying the same input yields the same error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was absent (or JSON `null`).
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// A numeric field could not be coerced to a number.
    #[error("field `{field}` is not numeric: {value}")]
    NotNumeric { field: &'static str, value: String },

    /// A numeric field parsed to NaN or infinity.
    #[error("field `{0}` must be a finite number")]
    NonFinite(&'static str),

    /// The operation is not one of the recognised symbols.
    #[error("unknown operation `{0}` (expected one of +, -, *, /)")]
    UnknownOperation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

/// A domain-level failure while computing a job.
///
/// These are terminal outcomes, not system faults: the worker records them
/// for the poller instead of propagating them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComputationError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NonFiniteResult,

    /// The queued record carried an id but its payload was unusable.
    #[error("malformed job payload: {0}")]
    MalformedPayload(String),
}

/// Failure to decode a queued job record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// No usable job id; nothing can be published for this message.
    #[error("job record has no valid id: {0}")]
    MissingId(String),

    /// The id is known but the rest of the record is malformed.
    #[error("job {job_id} is malformed: {reason}")]
    Malformed { job_id: JobId, reason: String },
}
