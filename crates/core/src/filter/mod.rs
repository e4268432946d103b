// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Filter expressions scoping which records belong to a collection view.
//!
//! The same expression is evaluated by the server (for bulk reads and change
//! feeds) and re-evaluated by clients against streamed change payloads.
//!
//! ```text
//! field op value [&& | || field op value ...]
//! ```
//!
//! # Operators
//!
//! - `=`, `!=`, `<`, `<=`, `>`, `>=`
//! - `~` (case-insensitive contains), `!~` (does not contain)
//!
//! # Values
//!
//! - Strings: `"open"` or `'open'`
//! - Numbers: `3`, `-1.5`
//! - Literals: `true`, `false`, `null`
//!
//! # Examples
//!
//! ```text
//! user = "u1" && is_read = false
//! (priority >= 2 || pinned = true) && title ~ "exam"
//! created > "2024-01-01"
//! ```

mod eval;
mod expr;
mod parser;

use std::fmt;

use crate::error::Result;
use crate::record::Record;

pub use expr::{CompareOp, FilterExpr, FilterValue};
pub use parser::parse_filter;

/// A parsed filter together with its source text.
///
/// An empty source matches every record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    source: String,
    expr: Option<FilterExpr>,
}

impl Filter {
    /// A filter that matches every record.
    pub fn all() -> Self {
        Filter::default()
    }

    /// Parses filter source text.
    pub fn parse(source: &str) -> Result<Self> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Ok(Filter::all());
        }
        let expr = parse_filter(trimmed)?;
        Ok(Filter {
            source: trimmed.to_string(),
            expr: Some(expr),
        })
    }

    /// The normalized source text (empty for match-all).
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true if this filter matches every record.
    pub fn is_all(&self) -> bool {
        self.expr.is_none()
    }

    /// Evaluates the filter against a record.
    pub fn matches(&self, record: &Record) -> bool {
        match &self.expr {
            Some(expr) => expr.matches(record),
            None => true,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.source.is_empty() {
            f.write_str("*")
        } else {
            f.write_str(&self.source)
        }
    }
}
