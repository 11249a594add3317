//! `asyncalc-core`: domain building blocks for the asynchronous calculator.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, boundary validation, the job record and its queue encoding,
//! outcomes, and the pluggable computation.

pub mod compute;
pub mod error;
pub mod id;
pub mod job;
pub mod operation;
pub mod outcome;

pub use compute::{Arithmetic, Computation};
pub use error::{ComputationError, DecodeError, ValidationError, ValidationResult};
pub use id::JobId;
pub use job::{CalcPayload, Job, JobMessage, RawCalcRequest};
pub use operation::Operation;
pub use outcome::{LookupResult, Outcome, OutcomeStatus};
