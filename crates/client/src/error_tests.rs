// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    empty_collection = { SyncError::EmptyCollection, "collection name" },
    invalid_page = { SyncError::InvalidPage, "start at 1" },
    fetch = { SyncError::Fetch(FetchError::Server { status: 503, message: "down".into() }), "503" },
    transport = { SyncError::Transport(TransportError::ConnectionClosed), "connection closed" },
    core = { SyncError::Core(lc_core::Error::InvalidSort("-".into())), "invalid sort" },
)]
fn error_display_contains(err: SyncError, expected: &str) {
    assert!(err.to_string().contains(expected), "{err}");
}

#[test]
fn filter_errors_convert() {
    let err: SyncError = lc_core::Filter::parse("a ==").unwrap_err().into();
    assert!(matches!(
        err,
        SyncError::Core(lc_core::Error::InvalidFilter { .. })
    ));
}
