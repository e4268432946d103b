// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Race-safe merge of a bulk fetch with streamed change events.
//!
//! [`MergeState`] is the pure state machine behind a Reconciler. It has no
//! I/O and no locking; the driver task owns it exclusively and publishes
//! [`SnapshotView`]s after each step.
//!
//! Events that arrive before the fetch resolves are buffered in arrival
//! order and replayed on top of the fetched records, so no event is lost
//! or applied twice regardless of how the two sources interleave.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, trace};

use lc_core::{ChangeEvent, ChangeKind, Filter, Page, Record, SortSpec};

use crate::fetch::FetchError;

/// Lifecycle phase of a Reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    Idle,
    Loading,
    Synced,
    Closed,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Loading => "loading",
            SyncPhase::Synced => "synced",
            SyncPhase::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A read-only, point-in-time view of a snapshot.
///
/// Cloning is cheap: the records are shared.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotView {
    pub phase: SyncPhase,
    pub loading: bool,
    pub error: Option<FetchError>,
    pub records: Arc<Vec<Record>>,
    pub total_items: u64,
    /// Requested 1-based page.
    pub page: u32,
    /// Page count reported by the fetch; 1 until it succeeds.
    pub total_pages: u32,
    /// Bumped on every published change.
    pub version: u64,
}

impl SnapshotView {
    /// The empty view reported after a Reconciler is stopped.
    pub fn closed() -> Self {
        SnapshotView {
            phase: SyncPhase::Closed,
            loading: false,
            error: None,
            records: Arc::new(Vec::new()),
            total_items: 0,
            page: 1,
            total_pages: 1,
            version: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }
}

/// Merge state for one collection and filter.
#[derive(Debug)]
pub struct MergeState {
    phase: SyncPhase,
    records: Arc<Vec<Record>>,
    buffer: Vec<ChangeEvent>,
    filter: Filter,
    order: SortSpec,
    loading: bool,
    error: Option<FetchError>,
    total_items: u64,
    page: u32,
    total_pages: u32,
    version: u64,
}

impl MergeState {
    pub fn new(filter: Filter, order: SortSpec) -> Self {
        MergeState {
            phase: SyncPhase::Idle,
            records: Arc::new(Vec::new()),
            buffer: Vec::new(),
            filter,
            order,
            loading: false,
            error: None,
            total_items: 0,
            page: 1,
            total_pages: 1,
            version: 0,
        }
    }

    /// Sets the page the bulk fetch asks for.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of events waiting for the fetch to resolve.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Marks the bulk fetch as issued.
    pub fn begin(&mut self) {
        if self.phase != SyncPhase::Idle {
            return;
        }
        self.phase = SyncPhase::Loading;
        self.loading = true;
        self.version += 1;
    }

    /// Accepts one streamed event.
    ///
    /// Before the fetch resolves the event is buffered and `None` is
    /// returned. Once synced it is applied immediately and the effective
    /// change (if any) is returned.
    pub fn on_event(&mut self, event: ChangeEvent) -> Option<ChangeEvent> {
        match self.phase {
            SyncPhase::Idle | SyncPhase::Loading => {
                trace!(id = %event.id(), kind = %event.kind, "buffering event");
                self.buffer.push(event);
                None
            }
            SyncPhase::Synced => self.apply(event),
            SyncPhase::Closed => None,
        }
    }

    /// Accepts the bulk fetch result and replays buffered events.
    ///
    /// Returns the effective changes produced by the replay. A failed fetch
    /// leaves the snapshot empty with the error recorded; buffered and later
    /// events still apply. Ignored unless a fetch is outstanding.
    pub fn on_fetch(&mut self, result: Result<Page, FetchError>) -> Vec<ChangeEvent> {
        if self.phase != SyncPhase::Loading {
            debug!(phase = %self.phase, "ignoring fetch result");
            return Vec::new();
        }

        match result {
            Ok(page) => {
                let mut seen = HashSet::with_capacity(page.items.len());
                let items: Vec<Record> = page
                    .items
                    .into_iter()
                    .filter(|r| seen.insert(r.id.clone()))
                    .collect();
                self.total_items = page.total_items;
                self.total_pages = page.total_pages.max(1);
                self.records = Arc::new(items);
            }
            Err(e) => {
                self.error = Some(e);
                self.total_items = 0;
                self.records = Arc::new(Vec::new());
            }
        }

        self.loading = false;
        self.phase = SyncPhase::Synced;
        self.version += 1;

        let buffered = std::mem::take(&mut self.buffer);
        if !buffered.is_empty() {
            debug!(count = buffered.len(), "replaying buffered events");
        }
        buffered
            .into_iter()
            .filter_map(|event| self.apply(event))
            .collect()
    }

    /// Closes the state. Terminal and idempotent.
    pub fn close(&mut self) {
        if self.phase == SyncPhase::Closed {
            return;
        }
        self.phase = SyncPhase::Closed;
        self.loading = false;
        self.buffer.clear();
        self.records = Arc::new(Vec::new());
        self.total_items = 0;
        self.version += 1;
    }

    pub fn view(&self) -> SnapshotView {
        SnapshotView {
            phase: self.phase,
            loading: self.loading,
            error: self.error.clone(),
            records: Arc::clone(&self.records),
            total_items: self.total_items,
            page: self.page,
            total_pages: self.total_pages,
            version: self.version,
        }
    }

    fn apply(&mut self, event: ChangeEvent) -> Option<ChangeEvent> {
        let ChangeEvent { kind, record } = event;

        // A payload outside the filter is a removal, whatever the action says
        let kind = if kind != ChangeKind::Delete && !self.filter.matches(&record) {
            debug!(id = %record.id, filter = %self.filter, "record outside filter");
            ChangeKind::Delete
        } else {
            kind
        };

        let applied = match kind {
            ChangeKind::Create | ChangeKind::Update => Some(self.upsert(record)),
            ChangeKind::Delete => self.remove(&record.id),
        };
        if applied.is_some() {
            self.version += 1;
        }
        applied
    }

    fn upsert(&mut self, record: Record) -> ChangeEvent {
        let records = Arc::make_mut(&mut self.records);
        if let Some(existing) = records.iter_mut().find(|r| r.id == record.id) {
            *existing = record.clone();
            return ChangeEvent::update(record);
        }

        let at = records
            .iter()
            .position(|r| self.order.compare(&record, r) == Ordering::Less)
            .unwrap_or(records.len());
        records.insert(at, record.clone());
        self.total_items = self.total_items.saturating_add(1);
        ChangeEvent::create(record)
    }

    fn remove(&mut self, id: &str) -> Option<ChangeEvent> {
        let at = self.records.iter().position(|r| r.id == id)?;
        let removed = Arc::make_mut(&mut self.records).remove(at);
        self.total_items = self.total_items.saturating_sub(1);
        Some(ChangeEvent::new(ChangeKind::Delete, removed))
    }
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
