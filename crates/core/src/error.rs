// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for lc-core operations.

use thiserror::Error;

/// All possible errors that can occur in lc-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid filter: {message}\n  hint: filters look like `status = \"open\" && score >= 3`")]
    InvalidFilter { message: String },

    #[error("invalid sort field '{0}'\n  hint: sort is a comma-separated field list, prefix with '-' for descending")]
    InvalidSort(String),

    #[error("invalid change action: '{0}'\n  hint: valid actions are: create, update, delete")]
    InvalidAction(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("record belongs to collection '{found}', expected '{expected}'")]
    CollectionMismatch { expected: String, found: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn filter(message: impl Into<String>) -> Self {
        Error::InvalidFilter {
            message: message.into(),
        }
    }
}

/// A specialized Result type for lc-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
