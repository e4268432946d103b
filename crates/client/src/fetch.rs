// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Bulk fetch service.
//!
//! The Reconciler loads the initial result set through a [`PageFetcher`].
//! [`RemoteFetcher`] performs the read as a one-shot request over its own
//! WebSocket connection.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use lc_core::protocol::{ClientMessage, ServerMessage};
use lc_core::{Page, PageQuery};

use crate::transport::{Connector, Transport};

/// Error type for bulk fetches.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The request never completed (connect, send, receive or timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with an error status.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
}

/// A paginated bulk read of one collection.
pub trait PageFetcher: Send + Sync {
    fn fetch_page(
        &self,
        query: PageQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Page, FetchError>> + Send + '_>>;
}

/// Fetches pages with a request/response exchange on a fresh connection.
pub struct RemoteFetcher {
    connector: Arc<dyn Connector>,
    timeout: Duration,
    next_request: AtomicU64,
}

impl RemoteFetcher {
    pub fn new(connector: Arc<dyn Connector>, timeout: Duration) -> Self {
        RemoteFetcher {
            connector,
            timeout,
            next_request: AtomicU64::new(1),
        }
    }
}

impl PageFetcher for RemoteFetcher {
    fn fetch_page(
        &self,
        query: PageQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Page, FetchError>> + Send + '_>> {
        Box::pin(async move {
            let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
            let mut transport = self.connector.transport();

            transport
                .connect(self.connector.url())
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;

            debug!(
                request_id,
                collection = %query.collection,
                page = query.page,
                "sending fetch"
            );
            let result = tokio::time::timeout(
                self.timeout,
                exchange(transport.as_mut(), request_id, query),
            )
            .await;
            let _ = transport.disconnect().await;

            match result {
                Ok(result) => result,
                Err(_) => Err(FetchError::Network(format!(
                    "no response within {}s",
                    self.timeout.as_secs_f32()
                ))),
            }
        })
    }
}

async fn exchange(
    transport: &mut dyn Transport,
    request_id: u64,
    query: PageQuery,
) -> Result<Page, FetchError> {
    transport
        .send(ClientMessage::fetch(request_id, query))
        .await
        .map_err(|e| FetchError::Network(e.to_string()))?;

    loop {
        match transport.recv().await {
            Ok(Some(ServerMessage::Page { request_id: id, page })) if id == request_id => {
                return Ok(page);
            }
            Ok(Some(ServerMessage::FetchFailed {
                request_id: id,
                status,
                message,
            })) if id == request_id => {
                return Err(FetchError::Server { status, message });
            }
            Ok(Some(ServerMessage::Error { message })) => {
                return Err(FetchError::Server {
                    status: 500,
                    message,
                });
            }
            Ok(Some(other)) => {
                debug!(request_id, "ignoring unrelated message: {:?}", other);
            }
            Ok(None) => {
                return Err(FetchError::Network(
                    "connection closed before response".to_string(),
                ));
            }
            Err(e) => return Err(FetchError::Network(e.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "fetch_tests.rs"]
mod tests;
