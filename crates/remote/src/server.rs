// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Each connection keeps its own subscriptions (sub id to collection and
//! filter). Reads and writes are answered on the same connection; applied
//! writes arrive through the state broadcast and are routed to every
//! subscription whose filter the record enters, stays in, or leaves.

use std::collections::HashMap;
use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use lc_core::protocol::{ClientMessage, ServerMessage};
use lc_core::Filter;

use crate::state::{Mutation, ServerState};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Run the WebSocket server on the given address.
pub async fn run(addr: SocketAddr, state: ServerState) -> Result<(), BoxError> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", addr);
    serve(listener, state).await
}

/// Accept connections on an already bound listener.
pub async fn serve(listener: TcpListener, state: ServerState) -> Result<(), BoxError> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: ServerState,
) -> Result<(), BoxError> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    info!("New WebSocket connection from: {}", peer_addr);

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    // Subscribe before handling any request so no write is missed
    let mut broadcast_rx = state.subscribe();
    let mut connection = Connection::default();

    loop {
        tokio::select! {
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = connection.handle_client_message(&text, &state).await;
                        if let Some(reply) = reply {
                            ws_sink.send(Message::Text(reply.to_json()?.into())).await?;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} disconnected", peer_addr);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_sink.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", peer_addr, e);
                        break;
                    }
                    None => {
                        info!("Client {} stream ended", peer_addr);
                        break;
                    }
                }
            }

            mutation = broadcast_rx.recv() => {
                match mutation {
                    Ok(mutation) => {
                        for msg in connection.route(&mutation) {
                            if let Err(e) = ws_sink.send(Message::Text(msg.to_json()?.into())).await {
                                warn!("Failed to send change to {}: {}", peer_addr, e);
                                return Ok(());
                            }
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        // Skipped changes would leave the client diverged
                        warn!("Client {} lagged by {} changes, closing", peer_addr, n);
                        let _ = ws_sink.send(Message::Close(None)).await;
                        break;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    info!("Connection closed: {}", peer_addr);
    Ok(())
}

/// Subscriptions of one connection.
#[derive(Debug, Default)]
pub(crate) struct Connection {
    subscriptions: HashMap<String, Subscription>,
}

#[derive(Debug)]
struct Subscription {
    collection: String,
    filter: Filter,
}

impl Connection {
    /// Process a client message and return an optional reply.
    pub(crate) async fn handle_client_message(
        &mut self,
        text: &str,
        state: &ServerState,
    ) -> Option<ServerMessage> {
        let msg = match ClientMessage::from_json(text) {
            Ok(msg) => msg,
            Err(e) => return Some(ServerMessage::error(format!("invalid message: {}", e))),
        };
        debug!("Received message: {:?}", msg);

        match msg {
            ClientMessage::Subscribe {
                sub_id,
                collection,
                filter,
            } => match Filter::parse(&filter) {
                Ok(filter) => {
                    debug!(%sub_id, %collection, %filter, "subscribed");
                    self.subscriptions
                        .insert(sub_id.clone(), Subscription { collection, filter });
                    Some(ServerMessage::subscribed(sub_id))
                }
                Err(e) => Some(ServerMessage::error(format!("subscription {}: {}", sub_id, e))),
            },

            ClientMessage::Unsubscribe { sub_id } => {
                if self.subscriptions.remove(&sub_id).is_none() {
                    debug!(%sub_id, "unsubscribe for unknown subscription");
                }
                None
            }

            ClientMessage::Fetch { request_id, query } => match state.fetch(&query).await {
                Ok(page) => {
                    debug!(
                        request_id,
                        collection = %query.collection,
                        items = page.items.len(),
                        "fetch"
                    );
                    Some(ServerMessage::page(request_id, page))
                }
                Err(e) => Some(ServerMessage::fetch_failed(
                    request_id,
                    e.status(),
                    e.to_string(),
                )),
            },

            ClientMessage::Write {
                request_id,
                collection,
                action,
                record,
            } => match state.write(&collection, action, record).await {
                Ok(record) => Some(ServerMessage::written(request_id, record)),
                Err(e) => Some(ServerMessage::error(e.to_string())),
            },

            ClientMessage::Ping { id } => Some(ServerMessage::pong(id)),
        }
    }

    /// Change notifications this connection should receive for `mutation`.
    pub(crate) fn route(&self, mutation: &Mutation) -> Vec<ServerMessage> {
        self.subscriptions
            .iter()
            .filter(|(_, sub)| sub.collection == mutation.collection)
            .filter_map(|(sub_id, sub)| {
                let (kind, record) = mutation.change_for(&sub.filter)?;
                Some(ServerMessage::change(sub_id.as_str(), kind, record))
            })
            .collect()
    }

    pub(crate) fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}
