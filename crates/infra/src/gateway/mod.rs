//! Caller-facing gateways over the queue and the result store.
//!
//! Transport-agnostic: the HTTP layer maps their errors to status codes.

pub mod result;
pub mod submission;

pub use result::{FetchError, ResultGateway};
pub use submission::{SubmissionGateway, SubmitError};
