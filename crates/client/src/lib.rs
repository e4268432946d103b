// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! livecoll - Live, race-safe mirrors of remote record collections.
//!
//! A consumer asks for a collection scoped by a filter; the crate subscribes
//! to its change feed and issues the initial bulk fetch concurrently, then
//! merges both into one ordered snapshot that never loses or double-applies
//! an event.
//!
//! # Main Components
//!
//! - [`SubscriptionChannel`] - one push connection per collection and filter,
//!   with capped exponential reconnect backoff
//! - [`Reconciler`] - runs the merge for one snapshot and publishes
//!   [`SnapshotView`]s through a [`SyncHandle`]
//! - [`LiveCollection`] - typed, scoped access that releases on drop
//! - [`Backend`] - the injected fetcher and connector
//!
//! ```rust,ignore
//! use livecoll::{Backend, ClientConfig, LiveCollection};
//!
//! let backend = Backend::from_config(&ClientConfig::load_or_default(None)?);
//! let mut notes = LiveCollection::<Note>::open(backend, "notes", "archived = false")?;
//! while notes.changed().await {
//!     render(notes.records());
//! }
//! ```

pub mod backoff;
pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod live;
pub mod merge;
pub mod reconciler;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use backoff::{Backoff, ReconnectConfig};
pub use channel::{ConnectionState, SubscriptionChannel, SubscriptionHandle};
pub use cli::{Cli, Command};
pub use config::{ClientConfig, ConfigError};
pub use error::{Result, SyncError};
pub use fetch::{FetchError, PageFetcher, RemoteFetcher};
pub use live::LiveCollection;
pub use merge::{MergeState, SnapshotView, SyncPhase};
pub use reconciler::{Backend, Reconciler, SyncHandle, SyncOptions};
pub use transport::{
    Connector, Transport, TransportError, WebSocketConnector, WebSocketTransport,
};
