// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Server state management.
//!
//! Holds every collection in memory and broadcasts each applied write as a
//! [`Mutation`] carrying the record before and after the change, so each
//! connection can decide what its own subscriptions should see.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use lc_core::{ChangeKind, Filter, Page, PageQuery, Record, SortSpec};

/// Errors from reads and writes against the in-memory store.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("record '{id}' not found in '{collection}'")]
    NotFound { collection: String, id: String },

    #[error("record '{id}' already exists in '{collection}'")]
    Conflict { collection: String, id: String },

    #[error(transparent)]
    Core(#[from] lc_core::Error),

    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid seed file: {0}")]
    Seed(#[from] serde_json::Error),
}

impl StateError {
    /// HTTP-style status reported to clients.
    pub fn status(&self) -> u16 {
        match self {
            StateError::NotFound { .. } => 404,
            StateError::Conflict { .. } => 409,
            StateError::Core(_) => 400,
            StateError::Io(_) | StateError::Seed(_) => 500,
        }
    }
}

/// One applied write.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub collection: String,
    pub before: Option<Record>,
    pub after: Option<Record>,
}

impl Mutation {
    /// The change a subscriber with `filter` should see, if any.
    ///
    /// A record entering the filter is a create, one leaving it a delete.
    pub fn change_for(&self, filter: &Filter) -> Option<(ChangeKind, Record)> {
        let was = self.before.as_ref().filter(|r| filter.matches(r));
        let now = self.after.as_ref().filter(|r| filter.matches(r));
        match (was, now) {
            (Some(_), Some(after)) => Some((ChangeKind::Update, after.clone())),
            (None, Some(after)) => Some((ChangeKind::Create, after.clone())),
            (Some(before), None) => Some((ChangeKind::Delete, before.clone())),
            (None, None) => None,
        }
    }
}

/// Shared server state containing every collection.
#[derive(Clone)]
pub struct ServerState {
    inner: Arc<ServerStateInner>,
}

struct ServerStateInner {
    /// Records per collection, in insertion order.
    collections: RwLock<HashMap<String, Vec<Record>>>,
    /// Broadcast channel for notifying connections of applied writes.
    broadcast_tx: broadcast::Sender<Mutation>,
    next_id: AtomicU64,
}

/// Applied writes a connection may fall behind by before it is closed.
pub const DEFAULT_BACKLOG: usize = 1024;

impl ServerState {
    pub fn new() -> Self {
        Self::with_collections(HashMap::new())
    }

    pub fn with_collections(collections: HashMap<String, Vec<Record>>) -> Self {
        Self::with_backlog(collections, DEFAULT_BACKLOG)
    }

    /// State whose change broadcast holds at most `backlog` unread writes.
    pub fn with_backlog(collections: HashMap<String, Vec<Record>>, backlog: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(backlog.max(1));
        ServerState {
            inner: Arc::new(ServerStateInner {
                collections: RwLock::new(collections),
                broadcast_tx,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Loads collections from a JSON file shaped `{"name": [record, ...]}`.
    pub fn load_seed(path: &Path, backlog: usize) -> Result<Self, StateError> {
        let content = fs::read_to_string(path)?;
        let raw: HashMap<String, Vec<Value>> = serde_json::from_str(&content)?;

        let mut collections = HashMap::with_capacity(raw.len());
        for (name, values) in raw {
            let records = values
                .into_iter()
                .map(|v| Record::from_value(v, &name))
                .collect::<Result<Vec<_>, _>>()?;
            info!(collection = %name, records = records.len(), "seeded collection");
            collections.insert(name, records);
        }
        Ok(Self::with_backlog(collections, backlog))
    }

    /// Filters, sorts and paginates one collection.
    ///
    /// Unknown collections read as empty.
    pub async fn fetch(&self, query: &PageQuery) -> Result<Page, StateError> {
        let filter = Filter::parse(&query.filter)?;
        let order = SortSpec::parse(&query.sort)?;

        let mut matching: Vec<Record> = {
            let collections = self.inner.collections.read().await;
            collections
                .get(&query.collection)
                .map(|records| {
                    records
                        .iter()
                        .filter(|r| filter.matches(r))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };
        order.sort(&mut matching);

        Ok(Page::paginate(matching, query.page, query.per_page))
    }

    /// Applies a write and broadcasts it.
    ///
    /// Creates get an id if they lack one; creates and updates are stamped
    /// with `created`/`updated`. Updates merge fields into the stored record.
    pub async fn write(
        &self,
        collection: &str,
        action: ChangeKind,
        payload: Value,
    ) -> Result<Record, StateError> {
        let payload = self.with_id(action, payload);
        let record = Record::from_value(payload, collection)?;
        let now = timestamp();

        let (mutation, written) = {
            let mut collections = self.inner.collections.write().await;
            let records = collections.entry(collection.to_string()).or_default();
            let index = records.iter().position(|r| r.id == record.id);

            match (action, index) {
                (ChangeKind::Create, Some(_)) => {
                    return Err(StateError::Conflict {
                        collection: collection.to_string(),
                        id: record.id,
                    });
                }
                (ChangeKind::Create, None) => {
                    let mut created = record;
                    created.set("created", now.clone());
                    created.set("updated", now);
                    records.push(created.clone());
                    let mutation = Mutation {
                        collection: collection.to_string(),
                        before: None,
                        after: Some(created.clone()),
                    };
                    (mutation, created)
                }
                (ChangeKind::Update, Some(i)) => {
                    let before = records[i].clone();
                    let updated = &mut records[i];
                    for (name, value) in record.fields {
                        updated.set(name, value);
                    }
                    updated.set("updated", now);
                    let updated = updated.clone();
                    let mutation = Mutation {
                        collection: collection.to_string(),
                        before: Some(before),
                        after: Some(updated.clone()),
                    };
                    (mutation, updated)
                }
                (ChangeKind::Delete, Some(i)) => {
                    let removed = records.remove(i);
                    let mutation = Mutation {
                        collection: collection.to_string(),
                        before: Some(removed.clone()),
                        after: None,
                    };
                    (mutation, removed)
                }
                (ChangeKind::Update | ChangeKind::Delete, None) => {
                    return Err(StateError::NotFound {
                        collection: collection.to_string(),
                        id: record.id,
                    });
                }
            }
        };

        debug!(collection, action = %action, id = %written.id, "write applied");
        let _ = self.inner.broadcast_tx.send(mutation);
        Ok(written)
    }

    /// Number of records stored in `collection`.
    pub async fn len(&self, collection: &str) -> usize {
        let collections = self.inner.collections.read().await;
        collections.get(collection).map_or(0, Vec::len)
    }

    /// Subscribe to applied writes.
    pub fn subscribe(&self) -> broadcast::Receiver<Mutation> {
        self.inner.broadcast_tx.subscribe()
    }

    fn with_id(&self, action: ChangeKind, mut payload: Value) -> Value {
        if action != ChangeKind::Create {
            return payload;
        }
        if let Value::Object(map) = &mut payload {
            let missing = map
                .get("id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .is_none();
            if missing {
                let n = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                let id = format!("{:x}{:04x}", Utc::now().timestamp_millis(), n & 0xffff);
                map.insert("id".to_string(), Value::String(id));
            }
        }
        payload
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
