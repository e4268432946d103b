// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Filter expression types.

/// A parsed filter expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// `field op value`
    Compare {
        /// Dotted field path.
        field: String,
        op: CompareOp,
        value: FilterValue,
    },
    /// Both sides must match.
    And(Box<FilterExpr>, Box<FilterExpr>),
    /// Either side must match.
    Or(Box<FilterExpr>, Box<FilterExpr>),
}

impl FilterExpr {
    pub fn compare(field: impl Into<String>, op: CompareOp, value: FilterValue) -> Self {
        FilterExpr::Compare {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn and(self, other: FilterExpr) -> Self {
        FilterExpr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: FilterExpr) -> Self {
        FilterExpr::Or(Box::new(self), Box::new(other))
    }
}

/// Comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal (`=`).
    Eq,
    /// Not equal (`!=`).
    Ne,
    /// Less than (`<`).
    Lt,
    /// Less than or equal (`<=`).
    Le,
    /// Greater than (`>`).
    Gt,
    /// Greater than or equal (`>=`).
    Ge,
    /// Case-insensitive contains (`~`).
    Like,
    /// Case-insensitive does not contain (`!~`).
    NotLike,
}

impl CompareOp {
    /// Returns valid operator symbols for error messages.
    pub fn valid_symbols() -> &'static str {
        "=, !=, <, <=, >, >=, ~, !~"
    }
}

/// Literal values in filter expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}
