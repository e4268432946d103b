// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciler: a live, ordered mirror of one filtered collection.
//!
//! [`Reconciler::start`] opens a subscription channel and issues the bulk
//! fetch concurrently. A single driver task owns the [`MergeState`]: it
//! polls the fetch and drains channel events with `tokio::select!`, so the
//! fetch result and event application are serialized without locks.
//! Consumers read the latest [`SnapshotView`] from a `watch` channel.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use lc_core::{ChangeEvent, Filter, PageQuery, Record, SortSpec};

use crate::backoff::ReconnectConfig;
use crate::channel::{ConnectionState, SubscriptionChannel, SubscriptionHandle};
use crate::config::ClientConfig;
use crate::error::{Result, SyncError};
use crate::fetch::{FetchError, PageFetcher, RemoteFetcher};
use crate::merge::{MergeState, SnapshotView, SyncPhase};
use crate::transport::{Connector, WebSocketConnector};

/// Default number of records requested by the bulk fetch.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// The collaborators a Reconciler talks to.
#[derive(Clone)]
pub struct Backend {
    pub fetcher: Arc<dyn PageFetcher>,
    pub connector: Arc<dyn Connector>,
    pub reconnect: ReconnectConfig,
}

impl Backend {
    pub fn new(fetcher: Arc<dyn PageFetcher>, connector: Arc<dyn Connector>) -> Self {
        Backend {
            fetcher,
            connector,
            reconnect: ReconnectConfig::default(),
        }
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// A backend that fetches and subscribes over WebSocket at `url`.
    pub fn websocket(url: &str, fetch_timeout: Duration) -> Self {
        let connector: Arc<dyn Connector> = Arc::new(WebSocketConnector::new(url));
        let fetcher = Arc::new(RemoteFetcher::new(Arc::clone(&connector), fetch_timeout));
        Backend::new(fetcher, connector)
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Backend::websocket(&config.url, Duration::from_secs(config.fetch_timeout_secs))
            .with_reconnect(config.reconnect.clone())
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("url", &self.connector.url())
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

/// What to synchronize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub collection: String,
    pub filter: String,
    pub sort: String,
    pub page: u32,
    pub page_size: u32,
}

impl SyncOptions {
    /// All records of `collection`, newest first.
    pub fn new(collection: impl Into<String>) -> Self {
        SyncOptions {
            collection: collection.into(),
            filter: String::new(),
            sort: SortSpec::newest_first().to_string(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into();
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }
}

type ChangeHook = Box<dyn FnMut(&ChangeEvent) + Send>;

/// Starts and stops live snapshots against one backend.
#[derive(Debug, Clone)]
pub struct Reconciler {
    backend: Backend,
}

impl Reconciler {
    pub fn new(backend: Backend) -> Self {
        Reconciler { backend }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Starts a newest-first snapshot of `collection` scoped by `filter`.
    pub fn start(&self, collection: &str, filter: &str, page_size: u32) -> Result<SyncHandle> {
        self.start_with(SyncOptions::new(collection).filter(filter).page_size(page_size))
    }

    pub fn start_with(&self, options: SyncOptions) -> Result<SyncHandle> {
        self.spawn(options, None)
    }

    /// Like [`start_with`](Self::start_with), also calling `on_change` with
    /// every change applied to the snapshot.
    pub fn start_observed<F>(&self, options: SyncOptions, on_change: F) -> Result<SyncHandle>
    where
        F: FnMut(&ChangeEvent) + Send + 'static,
    {
        self.spawn(options, Some(Box::new(on_change)))
    }

    /// Stops a snapshot. Idempotent.
    pub fn stop(&self, handle: &mut SyncHandle) {
        handle.stop();
    }

    fn spawn(&self, options: SyncOptions, hook: Option<ChangeHook>) -> Result<SyncHandle> {
        let collection = options.collection.trim().to_string();
        if collection.is_empty() {
            return Err(SyncError::EmptyCollection);
        }
        if options.page == 0 {
            return Err(SyncError::InvalidPage);
        }
        let filter = Filter::parse(&options.filter)?;
        let order = SortSpec::parse(&options.sort)?;

        let query = PageQuery::new(collection.as_str(), options.page_size)
            .filter(filter.as_str())
            .sort(order.to_string())
            .page(options.page);

        let mut state = MergeState::new(filter.clone(), order).with_page(options.page);
        state.begin();
        let (view_tx, view_rx) = watch::channel(state.view());

        // The channel and the fetch run concurrently; changes that reach the
        // driver before the fetch resolves are buffered
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let subscription = SubscriptionChannel::new(
            Arc::clone(&self.backend.connector),
            self.backend.reconnect.clone(),
        )
        .open(&collection, filter.as_str(), move |event| {
            let _ = event_tx.send(event);
        })?;

        let cancel = CancellationToken::new();
        let driver = Driver {
            collection: collection.clone(),
            state,
            events: event_rx,
            view: view_tx,
            cancel: cancel.clone(),
            hook,
        };

        info!(
            collection = %collection,
            filter = %filter,
            sub_id = subscription.id(),
            "starting sync"
        );
        let task = tokio::spawn(driver.run(Arc::clone(&self.backend.fetcher), query));

        Ok(SyncHandle {
            collection,
            filter,
            view: view_rx,
            subscription: Some(subscription),
            cancel,
            task: Some(task),
        })
    }
}

/// A running snapshot. Stopping (or dropping) it releases the channel.
pub struct SyncHandle {
    collection: String,
    filter: Filter,
    view: watch::Receiver<SnapshotView>,
    subscription: Option<SubscriptionHandle>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// The latest published view; the closed, empty view once stopped.
    pub fn snapshot(&self) -> SnapshotView {
        if self.is_stopped() {
            return SnapshotView::closed();
        }
        self.view.borrow().clone()
    }

    pub fn records(&self) -> Arc<Vec<Record>> {
        self.snapshot().records
    }

    pub fn loading(&self) -> bool {
        self.snapshot().loading
    }

    pub fn error(&self) -> Option<FetchError> {
        self.snapshot().error
    }

    pub fn phase(&self) -> SyncPhase {
        self.snapshot().phase
    }

    pub fn total_items(&self) -> u64 {
        self.snapshot().total_items
    }

    pub fn page(&self) -> u32 {
        self.snapshot().page
    }

    pub fn total_pages(&self) -> u32 {
        self.snapshot().total_pages
    }

    /// Waits for the next published view.
    ///
    /// Returns false once the snapshot is stopped.
    pub async fn changed(&mut self) -> bool {
        if self.is_stopped() {
            return false;
        }
        self.view.changed().await.is_ok() && !self.is_stopped()
    }

    /// A receiver of published views, for consumers that outlive a borrow.
    pub fn subscribe(&self) -> watch::Receiver<SnapshotView> {
        self.view.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.subscription
            .as_ref()
            .map_or(ConnectionState::Closed, SubscriptionHandle::state)
    }

    /// Stops the snapshot: cancels the driver, discards buffered events and
    /// closes the channel. Calling it again is a no-op.
    pub fn stop(&mut self) {
        if self.is_stopped() {
            warn!(collection = %self.collection, "sync already stopped");
            return;
        }
        self.release();
        info!(collection = %self.collection, filter = %self.filter, "sync stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stops and waits for the driver and channel tasks to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(subscription) = self.subscription.take() {
            subscription.shutdown().await;
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn release(&mut self) {
        self.cancel.cancel();
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        if !self.is_stopped() {
            self.release();
        }
    }
}

impl std::fmt::Debug for SyncHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncHandle")
            .field("collection", &self.collection)
            .field("filter", &self.filter.as_str())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

struct Driver {
    collection: String,
    state: MergeState,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    view: watch::Sender<SnapshotView>,
    cancel: CancellationToken,
    hook: Option<ChangeHook>,
}

impl Driver {
    async fn run(mut self, fetcher: Arc<dyn PageFetcher>, query: PageQuery) {
        let fetch = fetcher.fetch_page(query);
        tokio::pin!(fetch);
        let mut fetched = false;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = &mut fetch, if !fetched => {
                    fetched = true;
                    match &result {
                        Ok(page) => info!(
                            collection = %self.collection,
                            items = page.items.len(),
                            total = page.total_items,
                            "initial fetch complete"
                        ),
                        Err(e) => warn!(collection = %self.collection, "initial fetch failed: {}", e),
                    }
                    let applied = self.state.on_fetch(result);
                    self.notify(&applied);
                    self.publish();
                }
                event = self.events.recv() => match event {
                    Some(event) => {
                        if let Some(applied) = self.state.on_event(event) {
                            self.notify(std::slice::from_ref(&applied));
                            self.publish();
                        }
                    }
                    None => {
                        debug!(collection = %self.collection, "event feed closed");
                        break;
                    }
                },
            }
        }

        self.state.close();
        self.view.send_replace(SnapshotView::closed());
        debug!(collection = %self.collection, "sync driver finished");
    }

    fn publish(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.view.send_replace(self.state.view());
    }

    fn notify(&mut self, applied: &[ChangeEvent]) {
        let Some(hook) = self.hook.as_mut() else {
            return;
        };
        for event in applied {
            if catch_unwind(AssertUnwindSafe(|| hook(event))).is_err() {
                error!(collection = %self.collection, record = %event.id(), "change hook panicked");
            }
        }
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
