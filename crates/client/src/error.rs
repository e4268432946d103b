// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::config::ConfigError;
use crate::fetch::FetchError;
use crate::transport::TransportError;

/// Errors surfaced by the livecoll client API.
///
/// Transient transport failures never reach callers: channels retry them.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("collection name must not be empty")]
    EmptyCollection,

    #[error("page numbers start at 1")]
    InvalidPage,

    #[error(transparent)]
    Core(#[from] lc_core::Error),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for livecoll client operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
