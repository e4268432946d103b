// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription channels: one push connection per (collection, filter).
//!
//! A channel runs in a background task that connects, subscribes, decodes
//! change notifications and hands each [`ChangeEvent`] to the sink given to
//! [`SubscriptionChannel::open`]. Connection failures are retried with capped
//! exponential backoff until the handle is closed; a malformed notification
//! is dropped without ending the subscription.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use lc_core::protocol::{ClientMessage, ServerMessage};
use lc_core::ChangeEvent;

use crate::backoff::{Backoff, ReconnectConfig};
use crate::error::{Result, SyncError};
use crate::transport::{Connector, Transport, TransportError};

/// Connection state of a subscription channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Attempting to connect (1-based attempt since the last success).
    Connecting { attempt: u32 },
    /// Subscribed and receiving changes.
    Connected,
    /// Waiting before the next attempt.
    Backoff { attempt: u32, delay: Duration },
    /// Closed by the owner. Terminal.
    Closed,
}

type Sink = Box<dyn FnMut(ChangeEvent) + Send>;
type SinkSlot = Arc<Mutex<Option<Sink>>>;

static NEXT_SUB_ID: AtomicU64 = AtomicU64::new(1);

/// Opens subscription channels against one backend.
#[derive(Clone)]
pub struct SubscriptionChannel {
    connector: Arc<dyn Connector>,
    reconnect: ReconnectConfig,
}

impl SubscriptionChannel {
    pub fn new(connector: Arc<dyn Connector>, reconnect: ReconnectConfig) -> Self {
        SubscriptionChannel {
            connector,
            reconnect,
        }
    }

    /// Opens a change feed for `collection` scoped by `filter`.
    ///
    /// An empty filter subscribes to all records. `on_event` runs on the
    /// channel task; a panic inside it is caught and logged. Must be called
    /// from within a Tokio runtime.
    pub fn open<F>(&self, collection: &str, filter: &str, on_event: F) -> Result<SubscriptionHandle>
    where
        F: FnMut(ChangeEvent) + Send + 'static,
    {
        let collection = collection.trim();
        if collection.is_empty() {
            warn!("refusing to open a subscription without a collection name");
            return Err(SyncError::EmptyCollection);
        }

        let sub_id = format!("sub-{}", NEXT_SUB_ID.fetch_add(1, Ordering::Relaxed));
        let sink: SinkSlot = Arc::new(Mutex::new(Some(Box::new(on_event))));
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting { attempt: 1 });

        let task = ChannelTask {
            connector: Arc::clone(&self.connector),
            reconnect: self.reconnect.clone(),
            sub_id: sub_id.clone(),
            collection: collection.to_string(),
            filter: filter.trim().to_string(),
            sink: Arc::clone(&sink),
            cancel: cancel.clone(),
            state: state_tx,
        };

        debug!(%sub_id, collection, filter, "opening subscription");
        let join = tokio::spawn(task.run());

        Ok(SubscriptionHandle {
            sub_id,
            sink,
            cancel,
            state: state_rx,
            task: Some(join),
        })
    }
}

/// An open subscription. Closing it (or dropping it) ends the feed.
pub struct SubscriptionHandle {
    sub_id: String,
    sink: SinkSlot,
    cancel: CancellationToken,
    state: watch::Receiver<ConnectionState>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// Subscription id sent to the server.
    pub fn id(&self) -> &str {
        &self.sub_id
    }

    /// Closes the subscription.
    ///
    /// Idempotent. Once this returns the sink is never invoked again.
    pub fn close(&mut self) {
        self.cancel.cancel();
        // Waits for an in-flight delivery to finish
        let previous = lock_sink(&self.sink).take();
        if previous.is_some() {
            debug!(sub_id = %self.sub_id, "subscription closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        if self.is_closed() {
            return ConnectionState::Closed;
        }
        *self.state.borrow()
    }

    /// A receiver notified on every connection state change.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Closes the subscription and waits for the channel task to finish,
    /// including its best-effort unsubscribe.
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

fn lock_sink(slot: &SinkSlot) -> std::sync::MutexGuard<'_, Option<Sink>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum Ended {
    Cancelled,
    Disconnected(String),
}

struct ChannelTask {
    connector: Arc<dyn Connector>,
    reconnect: ReconnectConfig,
    sub_id: String,
    collection: String,
    filter: String,
    sink: SinkSlot,
    cancel: CancellationToken,
    state: watch::Sender<ConnectionState>,
}

impl ChannelTask {
    async fn run(self) {
        let mut backoff = Backoff::new(&self.reconnect);

        loop {
            let attempt = backoff.attempt().saturating_add(1);
            self.state.send_replace(ConnectionState::Connecting { attempt });

            let mut transport = self.connector.transport();
            let connected = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.connect_and_subscribe(transport.as_mut()) => result,
            };

            match connected {
                Ok(()) => {
                    info!(sub_id = %self.sub_id, collection = %self.collection, "subscribed");
                    self.state.send_replace(ConnectionState::Connected);

                    match self.pump(transport.as_mut(), &mut backoff).await {
                        Ended::Cancelled => {
                            let _ = transport
                                .send(ClientMessage::unsubscribe(self.sub_id.as_str()))
                                .await;
                            let _ = transport.disconnect().await;
                            break;
                        }
                        Ended::Disconnected(reason) => {
                            warn!(sub_id = %self.sub_id, "subscription dropped: {}", reason);
                            let _ = transport.disconnect().await;
                        }
                    }
                }
                Err(e) => {
                    warn!(sub_id = %self.sub_id, attempt, "connect failed: {}", e);
                    let _ = transport.disconnect().await;
                }
            }

            let delay = backoff.next_delay();
            info!(
                sub_id = %self.sub_id,
                attempt = backoff.attempt(),
                "retrying in {}ms",
                delay.as_millis()
            );
            self.state.send_replace(ConnectionState::Backoff {
                attempt: backoff.attempt(),
                delay,
            });

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.state.send_replace(ConnectionState::Closed);
        debug!(sub_id = %self.sub_id, "channel task finished");
    }

    async fn connect_and_subscribe(
        &self,
        transport: &mut dyn Transport,
    ) -> std::result::Result<(), TransportError> {
        transport.connect(self.connector.url()).await?;
        transport
            .send(ClientMessage::subscribe(
                self.sub_id.as_str(),
                self.collection.as_str(),
                self.filter.as_str(),
            ))
            .await
    }

    /// Delivers changes until the connection ends.
    ///
    /// The backoff resets only once the server acknowledges this
    /// subscription or delivers a change on it.
    async fn pump(&self, transport: &mut dyn Transport, backoff: &mut Backoff) -> Ended {
        loop {
            let received = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ended::Cancelled,
                received = transport.recv() => received,
            };

            match received {
                Ok(Some(ServerMessage::Change {
                    sub_id,
                    action,
                    record,
                })) => {
                    if sub_id != self.sub_id {
                        warn!(sub_id = %self.sub_id, other = %sub_id, "dropping change for another subscription");
                        continue;
                    }
                    backoff.reset();
                    match ChangeEvent::decode(&action, record, &self.collection) {
                        Ok(event) => self.deliver(event),
                        Err(e) => {
                            warn!(sub_id = %self.sub_id, "dropping malformed change: {}", e);
                        }
                    }
                }
                Ok(Some(ServerMessage::Subscribed { sub_id })) => {
                    if sub_id == self.sub_id {
                        debug!(%sub_id, "subscription acknowledged");
                        backoff.reset();
                    }
                }
                Ok(Some(ServerMessage::Error { message })) => {
                    warn!(sub_id = %self.sub_id, "server error: {}", message);
                }
                Ok(Some(other)) => {
                    debug!(sub_id = %self.sub_id, "ignoring message: {:?}", other);
                }
                Ok(None) => return Ended::Disconnected("connection closed".to_string()),
                Err(TransportError::SerializationError(e)) => {
                    warn!(sub_id = %self.sub_id, "dropping malformed frame: {}", e);
                }
                Err(e) => return Ended::Disconnected(e.to_string()),
            }
        }
    }

    fn deliver(&self, event: ChangeEvent) {
        let mut slot = lock_sink(&self.sink);
        let Some(sink) = slot.as_mut() else {
            return;
        };
        let id = event.record.id.clone();
        if catch_unwind(AssertUnwindSafe(|| sink(event))).is_err() {
            error!(sub_id = %self.sub_id, record = %id, "event handler panicked; event skipped");
        }
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
