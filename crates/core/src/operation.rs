//! Arithmetic operations accepted by the calculator.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One of the four recognised operations, serialized as its symbol.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
}

impl Operation {
    pub const ALL: [Operation; 4] = [Operation::Add, Operation::Sub, Operation::Mul, Operation::Div];

    pub fn symbol(self) -> &'static str {
        match self {
            Operation::Add => "+",
            Operation::Sub => "-",
            Operation::Mul => "*",
            Operation::Div => "/",
        }
    }
}

impl core::fmt::Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operation {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.symbol() == s.trim())
            .ok_or_else(|| ValidationError::UnknownOperation(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_parse() {
        for op in Operation::ALL {
            assert_eq!(op.symbol().parse::<Operation>().unwrap(), op);
        }
    }

    #[test]
    fn modulo_is_not_an_operation() {
        assert_eq!(
            "%".parse::<Operation>().unwrap_err(),
            ValidationError::UnknownOperation("%".to_string())
        );
    }

    #[test]
    fn serializes_as_symbol() {
        assert_eq!(serde_json::to_string(&Operation::Div).unwrap(), "\"/\"");
        let op: Operation = serde_json::from_str("\"*\"").unwrap();
        assert_eq!(op, Operation::Mul);
    }
}
