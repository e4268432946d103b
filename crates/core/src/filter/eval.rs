// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Evaluation of filter expressions against records.

use std::cmp::Ordering;

use serde_json::Value;

use crate::record::Record;

use super::expr::{CompareOp, FilterExpr, FilterValue};

impl FilterExpr {
    /// Evaluate this filter against a record.
    ///
    /// Missing fields behave as `null`. Ordering comparisons between values
    /// of different types never match.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            FilterExpr::And(left, right) => left.matches(record) && right.matches(record),
            FilterExpr::Or(left, right) => left.matches(record) || right.matches(record),
            FilterExpr::Compare { field, op, value } => {
                let actual = record.lookup(field);
                let actual = actual.as_deref().unwrap_or(&Value::Null);
                op.evaluate(actual, value)
            }
        }
    }
}

impl CompareOp {
    fn evaluate(&self, actual: &Value, expected: &FilterValue) -> bool {
        match self {
            CompareOp::Eq => values_equal(actual, expected),
            CompareOp::Ne => !values_equal(actual, expected),
            CompareOp::Lt => compare(actual, expected) == Some(Ordering::Less),
            CompareOp::Le => matches!(
                compare(actual, expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
            CompareOp::Gt => compare(actual, expected) == Some(Ordering::Greater),
            CompareOp::Ge => matches!(
                compare(actual, expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            CompareOp::Like => contains(actual, expected),
            CompareOp::NotLike => !contains(actual, expected),
        }
    }
}

fn values_equal(actual: &Value, expected: &FilterValue) -> bool {
    match (actual, expected) {
        (Value::Null, FilterValue::Null) => true,
        (Value::Bool(a), FilterValue::Bool(b)) => a == b,
        (Value::Number(a), FilterValue::Number(b)) => a.as_f64() == Some(*b),
        (Value::String(a), FilterValue::String(b)) => a == b,
        _ => false,
    }
}

fn compare(actual: &Value, expected: &FilterValue) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Number(a), FilterValue::Number(b)) => a.as_f64()?.partial_cmp(b),
        (Value::String(a), FilterValue::String(b)) => Some(a.as_str().cmp(b.as_str())),
        (Value::Bool(a), FilterValue::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn contains(actual: &Value, expected: &FilterValue) -> bool {
    let needle = match expected {
        FilterValue::String(s) => s.to_lowercase(),
        FilterValue::Number(n) => n.to_string(),
        FilterValue::Bool(_) | FilterValue::Null => return false,
    };

    match actual {
        Value::String(s) => s.to_lowercase().contains(&needle),
        Value::Array(items) => items.iter().any(|item| match item {
            Value::String(s) => s.to_lowercase() == needle,
            Value::Number(n) => n.to_string() == needle,
            _ => false,
        }),
        _ => false,
    }
}

#[cfg(test)]
#[path = "eval_tests.rs"]
mod tests;
