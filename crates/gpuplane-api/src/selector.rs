//! Label selectors: equality terms plus set-based requirements.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Validation failures for a selector document.
#[derive(Debug, Error, PartialEq)]
pub enum SelectorError {
    #[error("selector key must not be empty")]
    EmptyKey,
    #[error("selector value for key {0:?} must not be empty")]
    EmptyValue(String),
    #[error("operator {op} on key {key:?} requires at least one value")]
    ValuesRequired { key: String, op: &'static str },
    #[error("operator {op} on key {key:?} must not carry values")]
    ValuesForbidden { key: String, op: &'static str },
}

/// Set-based requirement operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

impl SelectorOperator {
    fn name(self) -> &'static str {
        match self {
            SelectorOperator::In => "In",
            SelectorOperator::NotIn => "NotIn",
            SelectorOperator::Exists => "Exists",
            SelectorOperator::DoesNotExist => "DoesNotExist",
        }
    }
}

/// A single `matchExpressions` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorRequirement {
    pub key: String,
    pub operator: SelectorOperator,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl SelectorRequirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            SelectorOperator::In => value.is_some_and(|v| self.values.iter().any(|x| x == v)),
            SelectorOperator::NotIn => !value.is_some_and(|v| self.values.iter().any(|x| x == v)),
            SelectorOperator::Exists => value.is_some(),
            SelectorOperator::DoesNotExist => value.is_none(),
        }
    }

    fn validate(&self) -> Result<(), SelectorError> {
        if self.key.trim().is_empty() {
            return Err(SelectorError::EmptyKey);
        }
        match self.operator {
            SelectorOperator::In | SelectorOperator::NotIn => {
                if self.values.is_empty() {
                    return Err(SelectorError::ValuesRequired {
                        key: self.key.clone(),
                        op: self.operator.name(),
                    });
                }
                if self.values.iter().any(|v| v.trim().is_empty()) {
                    return Err(SelectorError::EmptyValue(self.key.clone()));
                }
            }
            SelectorOperator::Exists | SelectorOperator::DoesNotExist => {
                if !self.values.is_empty() {
                    return Err(SelectorError::ValuesForbidden {
                        key: self.key.clone(),
                        op: self.operator.name(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Equality terms AND set-based requirements; an empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelSelector {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<SelectorRequirement>,
}

impl LabelSelector {
    /// Equality-only selector from `(key, value)` pairs.
    pub fn from_labels<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            match_labels: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            match_expressions: Vec::new(),
        }
    }

    /// True when every term and every requirement matches `labels`.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        for (k, v) in &self.match_labels {
            if labels.get(k) != Some(v) {
                return false;
            }
        }
        self.match_expressions.iter().all(|r| r.matches(labels))
    }

    /// Enforce non-empty keys/values and operator-appropriate cardinality.
    pub fn validate(&self) -> Result<(), SelectorError> {
        for (k, v) in &self.match_labels {
            if k.trim().is_empty() {
                return Err(SelectorError::EmptyKey);
            }
            if v.trim().is_empty() {
                return Err(SelectorError::EmptyValue(k.clone()));
            }
        }
        for req in &self.match_expressions {
            req.validate()?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.match_expressions.is_empty()
    }
}
