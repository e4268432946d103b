// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sort specifications for ordering records.
//!
//! A sort spec is a comma-separated list of field paths; a `-` prefix sorts
//! that field descending (`-created,title`). Values compare by type:
//! numbers numerically, strings lexicographically (so ISO-8601 timestamps
//! sort chronologically), booleans `false < true`. Values of different types
//! order by type (missing/null, bool, number, string, composite); records
//! that compare equal keep their existing relative order.

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::record::Record;

/// A single sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

/// An ordered list of sort keys.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    /// The default ordering: newest-created first.
    pub fn newest_first() -> Self {
        SortSpec {
            keys: vec![SortKey {
                field: "created".to_string(),
                descending: true,
            }],
        }
    }

    /// Parses a sort string. An empty string means "no ordering".
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(SortSpec::default());
        }

        let mut keys = Vec::new();
        for part in input.split(',') {
            let part = part.trim();
            let (field, descending) = match part.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (part.strip_prefix('+').unwrap_or(part), false),
            };

            let valid = !field.is_empty()
                && field
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '.');
            if !valid {
                return Err(Error::InvalidSort(part.to_string()));
            }

            keys.push(SortKey {
                field: field.to_string(),
                descending,
            });
        }

        Ok(SortSpec { keys })
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Compares two records by each key in turn.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        for key in &self.keys {
            let left = a.lookup(&key.field);
            let right = b.lookup(&key.field);
            let ord = compare_values(left.as_deref(), right.as_deref());
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Sorts records in place. The sort is stable.
    pub fn sort(&self, records: &mut [Record]) {
        if !self.is_empty() {
            records.sort_by(|a, b| self.compare(a, b));
        }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if key.descending {
                f.write_str("-")?;
            }
            f.write_str(&key.field)?;
        }
        Ok(())
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => Ordering::Equal,
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

// Orders values of different types so the comparison stays total.
fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) | Some(Value::Object(_)) => 4,
    }
}

#[cfg(test)]
#[path = "sort_tests.rs"]
mod tests;
