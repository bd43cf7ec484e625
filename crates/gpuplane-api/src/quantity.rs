//! Resource quantities for pool resources.
//!
//! Pool resources count whole devices, so a quantity is an integer count;
//! binary suffixes are accepted on parse and normalized.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum QuantityError {
    #[error("invalid quantity {0:?}")]
    Invalid(String),
    #[error("quantity {0:?} overflows")]
    Overflow(String),
}

/// An integer resource quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "QuantityRepr", into = "QuantityRepr")]
pub struct Quantity(pub i64);

/// Wire form: either a bare number or a suffixed string.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum QuantityRepr {
    Int(i64),
    Str(String),
}

impl TryFrom<QuantityRepr> for Quantity {
    type Error = QuantityError;

    fn try_from(repr: QuantityRepr) -> Result<Self, QuantityError> {
        match repr {
            QuantityRepr::Int(n) => Ok(Quantity(n)),
            QuantityRepr::Str(s) => s.parse(),
        }
    }
}

impl From<Quantity> for QuantityRepr {
    fn from(q: Quantity) -> Self {
        QuantityRepr::Str(q.0.to_string())
    }
}

impl Quantity {
    pub fn value(self) -> i64 {
        self.0
    }
}

impl std::str::FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, QuantityError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(QuantityError::Invalid(s.to_string()));
        }
        let (digits, multiplier) = match s {
            _ if s.ends_with("Ki") => (&s[..s.len() - 2], 1i64 << 10),
            _ if s.ends_with("Mi") => (&s[..s.len() - 2], 1i64 << 20),
            _ if s.ends_with("Gi") => (&s[..s.len() - 2], 1i64 << 30),
            _ => (s, 1),
        };
        let base: i64 = digits
            .parse()
            .map_err(|_| QuantityError::Invalid(s.to_string()))?;
        base.checked_mul(multiplier)
            .map(Quantity)
            .ok_or_else(|| QuantityError::Overflow(s.to_string()))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
