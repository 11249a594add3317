//! The pluggable computation performed by workers.

use crate::error::ComputationError;
use crate::job::CalcPayload;
use crate::operation::Operation;

/// A pure function from payload to value.
///
/// Implementations must be deterministic and side-effect free: jobs may be
/// delivered more than once and every delivery must publish the same outcome.
pub trait Computation: Send + Sync {
    fn compute(&self, payload: &CalcPayload) -> Result<f64, ComputationError>;
}

impl<F> Computation for F
where
    F: Fn(&CalcPayload) -> Result<f64, ComputationError> + Send + Sync,
{
    fn compute(&self, payload: &CalcPayload) -> Result<f64, ComputationError> {
        self(payload)
    }
}

/// Four-function calculator.
#[derive(Debug, Default, Clone, Copy)]
pub struct Arithmetic;

impl Computation for Arithmetic {
    fn compute(&self, payload: &CalcPayload) -> Result<f64, ComputationError> {
        let CalcPayload { a, b, op } = *payload;
        let value = match op {
            Operation::Add => a + b,
            Operation::Sub => a - b,
            Operation::Mul => a * b,
            Operation::Div => {
                if b == 0.0 {
                    return Err(ComputationError::DivisionByZero);
                }
                a / b
            }
        };

        if !value.is_finite() {
            return Err(ComputationError::NonFiniteResult);
        }
        Ok(value)
    }
}
