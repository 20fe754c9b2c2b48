//! Trigger conditions: `index <op> threshold`.
//!
//! [`Condition::evaluate`] is the arithmetic truth table used off-chain by the
//! monitor. It is independent of how the predicate encoder maps
//! operators onto on-chain comparisons.

use ethers::types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::units;

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Neq,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown operator '{0}', expected one of gt, lt, gte, lte, eq, neq")]
pub struct UnknownOperator(pub String);

impl Operator {
    pub const ALL: [Operator; 6] = [
        Operator::Gt,
        Operator::Lt,
        Operator::Gte,
        Operator::Lte,
        Operator::Eq,
        Operator::Neq,
    ];

    /// Applies the operator to `value` (left) and `threshold` (right).
    #[must_use]
    pub fn compare(self, value: U256, threshold: U256) -> bool {
        match self {
            Operator::Gt => value > threshold,
            Operator::Lt => value < threshold,
            Operator::Gte => value >= threshold,
            Operator::Lte => value <= threshold,
            Operator::Eq => value == threshold,
            Operator::Neq => value != threshold,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Gte => "gte",
            Operator::Lte => "lte",
            Operator::Eq => "eq",
            Operator::Neq => "neq",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gt" | ">" => Ok(Operator::Gt),
            "lt" | "<" => Ok(Operator::Lt),
            "gte" | ">=" => Ok(Operator::Gte),
            "lte" | "<=" => Ok(Operator::Lte),
            "eq" | "==" => Ok(Operator::Eq),
            "neq" | "!=" => Ok(Operator::Neq),
            other => Err(UnknownOperator(other.to_string())),
        }
    }
}

/// A trigger condition. The threshold uses the index's own fixed-point scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub index_id: u64,
    pub operator: Operator,
    #[serde(with = "units::u256_dec")]
    pub threshold: U256,
}

impl Condition {
    #[must_use]
    pub const fn new(index_id: u64, operator: Operator, threshold: U256) -> Self {
        Self {
            index_id,
            operator,
            threshold,
        }
    }

    /// Returns true if the index value satisfies this condition.
    #[must_use]
    pub fn evaluate(&self, value: U256) -> bool {
        self.operator.compare(value, self.threshold)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "index[{}] {} {}", self.index_id, self.operator, self.threshold)
    }
}
