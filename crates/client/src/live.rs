// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Typed, scoped access to a live collection.
//!
//! A [`LiveCollection`] wraps one running [`SyncHandle`] and decodes its
//! records into `T`. Changing the filter or page, or refreshing, starts a new
//! Reconciler before the old one is released; dropping the collection
//! releases the channel on every exit path.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use lc_core::Record;

use crate::error::Result;
use crate::fetch::FetchError;
use crate::merge::SnapshotView;
use crate::reconciler::{Backend, Reconciler, SyncHandle, SyncOptions};

/// A live view of one collection, decoded as `T`.
pub struct LiveCollection<T> {
    reconciler: Reconciler,
    options: SyncOptions,
    handle: SyncHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> LiveCollection<T> {
    /// Opens a newest-first view of `collection` scoped by `filter`.
    pub fn open(backend: Backend, collection: &str, filter: &str) -> Result<Self> {
        Self::open_with(backend, SyncOptions::new(collection).filter(filter))
    }

    pub fn open_with(backend: Backend, options: SyncOptions) -> Result<Self> {
        let reconciler = Reconciler::new(backend);
        let handle = reconciler.start_with(options.clone())?;
        Ok(LiveCollection {
            reconciler,
            options,
            handle,
            _marker: PhantomData,
        })
    }

    /// Current records decoded as `T`, in snapshot order.
    ///
    /// Records that do not decode are skipped with a warning.
    pub fn records(&self) -> Vec<T> {
        self.raw()
            .iter()
            .filter_map(|record| {
                serde_json::from_value(record.clone().into_value())
                    .map_err(|e| warn!(id = %record.id, "skipping undecodable record: {}", e))
                    .ok()
            })
            .collect()
    }

    /// Current records without decoding.
    pub fn raw(&self) -> Arc<Vec<Record>> {
        self.handle.records()
    }

    pub fn snapshot(&self) -> SnapshotView {
        self.handle.snapshot()
    }

    pub fn loading(&self) -> bool {
        self.handle.loading()
    }

    pub fn error(&self) -> Option<FetchError> {
        self.handle.error()
    }

    pub fn total_items(&self) -> u64 {
        self.handle.total_items()
    }

    pub fn filter(&self) -> &str {
        &self.options.filter
    }

    /// The requested 1-based page.
    pub fn page(&self) -> u32 {
        self.options.page
    }

    pub fn total_pages(&self) -> u32 {
        self.handle.total_pages()
    }

    /// Waits for the next change. Returns false once the view is closed.
    pub async fn changed(&mut self) -> bool {
        self.handle.changed().await
    }

    /// Switches to a new filter.
    ///
    /// On error the current view is kept.
    pub fn set_filter(&mut self, filter: &str) -> Result<()> {
        let options = self.options.clone().filter(filter);
        self.restart(options)
    }

    /// Switches to another page of the same query.
    ///
    /// Page 0 is rejected and the current view kept.
    pub fn set_page(&mut self, page: u32) -> Result<()> {
        let options = self.options.clone().page(page);
        self.restart(options)
    }

    /// Starts over with a fresh fetch and a fresh subscription.
    pub fn refresh(&mut self) -> Result<()> {
        self.restart(self.options.clone())
    }

    pub fn handle(&self) -> &SyncHandle {
        &self.handle
    }

    fn restart(&mut self, options: SyncOptions) -> Result<()> {
        let handle = self.reconciler.start_with(options.clone())?;
        let mut previous = std::mem::replace(&mut self.handle, handle);
        previous.stop();
        debug!(
            collection = %options.collection,
            filter = %options.filter,
            page = options.page,
            "live collection restarted"
        );
        self.options = options;
        Ok(())
    }
}

impl<T> std::fmt::Debug for LiveCollection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveCollection")
            .field("options", &self.options)
            .field("handle", &self.handle)
            .finish()
    }
}

#[cfg(test)]
#[path = "live_tests.rs"]
mod tests;
