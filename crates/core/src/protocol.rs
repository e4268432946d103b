// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol messages for client-server communication.
//!
//! The protocol is simple:
//! - Client subscribes to filtered change feeds, requests pages, and writes
//! - Server pushes per-subscription change notifications and answers requests
//!
//! Change notifications keep the action and record as raw JSON so a client
//! can drop a single malformed notification without rejecting the frame
//! format as a whole.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::page::{Page, PageQuery};
use crate::record::{ChangeEvent, ChangeKind, Record};

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Open a change feed for a collection, scoped by a filter.
    Subscribe {
        /// Client-chosen id echoed on every change for this feed.
        sub_id: String,
        collection: String,
        /// Filter source text; empty means all records.
        #[serde(default)]
        filter: String,
    },

    /// Close a change feed.
    Unsubscribe { sub_id: String },

    /// Request one page of a bulk read.
    Fetch { request_id: u64, query: PageQuery },

    /// Create, update or delete a record.
    ///
    /// The server applies it and notifies matching subscriptions.
    Write {
        request_id: u64,
        collection: String,
        action: ChangeKind,
        record: Value,
    },

    /// Ping message for keepalive.
    Ping {
        /// Client-chosen ID echoed in Pong.
        id: u64,
    },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Acknowledges a Subscribe.
    Subscribed { sub_id: String },

    /// A change on a subscribed feed.
    Change {
        sub_id: String,
        /// `create`, `update` or `delete`.
        action: String,
        /// The record payload; deletes may carry only `id`.
        record: Value,
    },

    /// Response to a Fetch request.
    Page { request_id: u64, page: Page },

    /// A Fetch request failed.
    FetchFailed {
        request_id: u64,
        /// HTTP-style status code (400 for a bad filter or sort).
        status: u16,
        message: String,
    },

    /// Response to a Write request with the stored record.
    Written { request_id: u64, record: Record },

    /// Pong response to client Ping.
    Pong {
        /// Echoed from the Ping message.
        id: u64,
    },

    /// Error message.
    Error {
        /// Human-readable error description.
        message: String,
    },
}

impl ClientMessage {
    /// Creates a Subscribe message.
    pub fn subscribe(
        sub_id: impl Into<String>,
        collection: impl Into<String>,
        filter: impl Into<String>,
    ) -> Self {
        ClientMessage::Subscribe {
            sub_id: sub_id.into(),
            collection: collection.into(),
            filter: filter.into(),
        }
    }

    /// Creates an Unsubscribe message.
    pub fn unsubscribe(sub_id: impl Into<String>) -> Self {
        ClientMessage::Unsubscribe {
            sub_id: sub_id.into(),
        }
    }

    /// Creates a Fetch message.
    pub fn fetch(request_id: u64, query: PageQuery) -> Self {
        ClientMessage::Fetch { request_id, query }
    }

    /// Creates a Write message for a change event.
    pub fn write(request_id: u64, event: ChangeEvent) -> Self {
        let collection = event.record.collection.clone();
        ClientMessage::Write {
            request_id,
            collection,
            action: event.kind,
            record: event.record.into_value(),
        }
    }

    /// Creates a Ping message.
    pub fn ping(id: u64) -> Self {
        ClientMessage::Ping { id }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Creates a Subscribed message.
    pub fn subscribed(sub_id: impl Into<String>) -> Self {
        ServerMessage::Subscribed {
            sub_id: sub_id.into(),
        }
    }

    /// Creates a Change message.
    pub fn change(sub_id: impl Into<String>, kind: ChangeKind, record: Record) -> Self {
        ServerMessage::Change {
            sub_id: sub_id.into(),
            action: kind.as_str().to_string(),
            record: record.into_value(),
        }
    }

    /// Creates a Page message.
    pub fn page(request_id: u64, page: Page) -> Self {
        ServerMessage::Page { request_id, page }
    }

    /// Creates a FetchFailed message.
    pub fn fetch_failed(request_id: u64, status: u16, message: impl Into<String>) -> Self {
        ServerMessage::FetchFailed {
            request_id,
            status,
            message: message.into(),
        }
    }

    /// Creates a Written message.
    pub fn written(request_id: u64, record: Record) -> Self {
        ServerMessage::Written { request_id, record }
    }

    /// Creates a Pong message.
    pub fn pong(id: u64) -> Self {
        ServerMessage::Pong { id }
    }

    /// Creates an Error message.
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
