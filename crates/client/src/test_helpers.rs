// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers: a scripted in-process server and controllable fetchers.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot, watch};

use lc_core::protocol::{ClientMessage, ServerMessage};
use lc_core::{ChangeKind, Page, PageQuery, Record};

use crate::fetch::{FetchError, PageFetcher};
use crate::transport::{Connector, Transport, TransportError, TransportResult};

/// A frame delivered to the connected mock transport.
#[derive(Debug)]
pub enum Frame {
    Message(ServerMessage),
    Malformed(String),
    Drop,
}

type Responder = Box<dyn Fn(&ClientMessage) -> Option<ServerMessage> + Send>;

struct MockInner {
    connect_failures: u32,
    connects: u32,
    disconnects: u32,
    sent: Vec<ClientMessage>,
    current: Option<mpsc::UnboundedSender<Frame>>,
    responder: Option<Responder>,
    drop_on_subscribe: bool,
}

/// Scripted server shared by every transport its connector hands out.
#[derive(Clone)]
pub struct MockServer {
    inner: Arc<Mutex<MockInner>>,
    subscribes: Arc<watch::Sender<usize>>,
}

impl MockServer {
    pub fn new() -> Self {
        MockServer {
            inner: Arc::new(Mutex::new(MockInner {
                connect_failures: 0,
                connects: 0,
                disconnects: 0,
                sent: Vec::new(),
                current: None,
                responder: None,
                drop_on_subscribe: false,
            })),
            subscribes: Arc::new(watch::channel(0).0),
        }
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(MockConnector {
            server: self.clone(),
        })
    }

    /// Makes the next `n` connection attempts fail.
    pub fn fail_next_connects(&self, n: u32) {
        self.inner.lock().unwrap().connect_failures = n;
    }

    /// Accepts every connection but closes it as soon as it subscribes.
    pub fn drop_on_subscribe(&self) {
        self.inner.lock().unwrap().drop_on_subscribe = true;
    }

    /// Replies to matching client messages on the same connection.
    pub fn respond_with<F>(&self, f: F)
    where
        F: Fn(&ClientMessage) -> Option<ServerMessage> + Send + 'static,
    {
        self.inner.lock().unwrap().responder = Some(Box::new(f));
    }

    fn feed(&self, frame: Frame) -> bool {
        let inner = self.inner.lock().unwrap();
        match &inner.current {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    pub fn push(&self, msg: ServerMessage) -> bool {
        self.feed(Frame::Message(msg))
    }

    pub fn push_malformed(&self, text: &str) -> bool {
        self.feed(Frame::Malformed(text.to_string()))
    }

    /// Pushes a change on the most recent subscription.
    pub fn push_change(&self, kind: ChangeKind, record: Record) -> bool {
        let sub_id = self.last_sub_id().expect("no subscription yet");
        self.push(ServerMessage::change(sub_id, kind, record))
    }

    /// Drops the live connection as if the network went away.
    pub fn drop_connection(&self) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(tx) = inner.current.take() {
            let _ = tx.send(Frame::Drop);
        }
    }

    pub fn sent(&self) -> Vec<ClientMessage> {
        self.inner.lock().unwrap().sent.clone()
    }

    pub fn connects(&self) -> u32 {
        self.inner.lock().unwrap().connects
    }

    pub fn disconnects(&self) -> u32 {
        self.inner.lock().unwrap().disconnects
    }

    pub fn last_sub_id(&self) -> Option<String> {
        self.sent().into_iter().rev().find_map(|msg| match msg {
            ClientMessage::Subscribe { sub_id, .. } => Some(sub_id),
            _ => None,
        })
    }

    /// Waits until `n` Subscribe messages have been received in total.
    pub async fn wait_for_subscribes(&self, n: usize) {
        let mut rx = self.subscribes.subscribe();
        rx.wait_for(|count| *count >= n).await.unwrap();
    }
}

struct MockConnector {
    server: MockServer,
}

impl Connector for MockConnector {
    fn url(&self) -> &str {
        "mock://server"
    }

    fn transport(&self) -> Box<dyn Transport> {
        Box::new(MockTransport {
            server: self.server.clone(),
            incoming: None,
        })
    }
}

/// Mock transport for testing without real sockets.
pub struct MockTransport {
    server: MockServer,
    incoming: Option<mpsc::UnboundedReceiver<Frame>>,
}

impl Transport for MockTransport {
    fn connect(
        &mut self,
        _url: &str,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let mut inner = self.server.inner.lock().unwrap();
            inner.connects += 1;
            if inner.connect_failures > 0 {
                inner.connect_failures -= 1;
                return Err(TransportError::ConnectionFailed("mock failure".into()));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            inner.current = Some(tx);
            self.incoming = Some(rx);
            Ok(())
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if self.incoming.take().is_some() {
                self.server.inner.lock().unwrap().disconnects += 1;
            }
            Ok(())
        })
    }

    fn send(
        &mut self,
        msg: ClientMessage,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if self.incoming.is_none() {
                return Err(TransportError::ConnectionClosed);
            }
            let is_subscribe = matches!(msg, ClientMessage::Subscribe { .. });
            {
                let mut inner = self.server.inner.lock().unwrap();
                inner.sent.push(msg.clone());
                let reply = inner.responder.as_ref().and_then(|f| f(&msg));
                if let (Some(reply), Some(tx)) = (reply, inner.current.as_ref()) {
                    let _ = tx.send(Frame::Message(reply));
                }
                if is_subscribe && inner.drop_on_subscribe {
                    if let Some(tx) = inner.current.take() {
                        let _ = tx.send(Frame::Drop);
                    }
                }
            }
            if is_subscribe {
                self.server.subscribes.send_modify(|count| *count += 1);
            }
            Ok(())
        })
    }

    fn recv(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Option<ServerMessage>>> + Send + '_>> {
        Box::pin(async move {
            let rx = self
                .incoming
                .as_mut()
                .ok_or(TransportError::ConnectionClosed)?;
            match rx.recv().await {
                Some(Frame::Message(msg)) => Ok(Some(msg)),
                Some(Frame::Malformed(text)) => Err(TransportError::SerializationError(text)),
                Some(Frame::Drop) | None => {
                    self.incoming = None;
                    Ok(None)
                }
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.incoming.is_some()
    }
}

/// A fetcher whose single response is released by the test.
pub struct DelayedFetcher {
    response: Mutex<Option<oneshot::Receiver<Result<Page, FetchError>>>>,
    queries: Mutex<Vec<PageQuery>>,
}

impl DelayedFetcher {
    pub fn new() -> (Arc<Self>, oneshot::Sender<Result<Page, FetchError>>) {
        let (tx, rx) = oneshot::channel();
        let fetcher = DelayedFetcher {
            response: Mutex::new(Some(rx)),
            queries: Mutex::new(Vec::new()),
        };
        (Arc::new(fetcher), tx)
    }

    pub fn queries(&self) -> Vec<PageQuery> {
        self.queries.lock().unwrap().clone()
    }
}

impl PageFetcher for DelayedFetcher {
    fn fetch_page(
        &self,
        query: PageQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Page, FetchError>> + Send + '_>> {
        self.queries.lock().unwrap().push(query);
        let rx = self.response.lock().unwrap().take();
        Box::pin(async move {
            match rx {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(FetchError::Network("fetch abandoned".into()))),
                None => Err(FetchError::Network("already fetched".into())),
            }
        })
    }
}

/// A fetcher that answers every request immediately with the same page.
pub struct StaticFetcher {
    page: Result<Page, FetchError>,
}

impl StaticFetcher {
    pub fn new(items: Vec<Record>) -> Arc<Self> {
        Arc::new(StaticFetcher {
            page: Ok(page_of(items)),
        })
    }

    pub fn failing(err: FetchError) -> Arc<Self> {
        Arc::new(StaticFetcher { page: Err(err) })
    }
}

impl PageFetcher for StaticFetcher {
    fn fetch_page(
        &self,
        _query: PageQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Page, FetchError>> + Send + '_>> {
        let page = self.page.clone();
        Box::pin(async move { page })
    }
}

/// A fetcher that slices a fixed record list by the requested page.
pub struct PagedFetcher {
    items: Vec<Record>,
    queries: Mutex<Vec<PageQuery>>,
}

impl PagedFetcher {
    pub fn new(items: Vec<Record>) -> Arc<Self> {
        Arc::new(PagedFetcher {
            items,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn pages_requested(&self) -> Vec<u32> {
        self.queries.lock().unwrap().iter().map(|q| q.page).collect()
    }
}

impl PageFetcher for PagedFetcher {
    fn fetch_page(
        &self,
        query: PageQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Page, FetchError>> + Send + '_>> {
        let page = Page::paginate(self.items.clone(), query.page, query.per_page);
        self.queries.lock().unwrap().push(query);
        Box::pin(async move { Ok(page) })
    }
}

pub fn page_of(items: Vec<Record>) -> Page {
    let per_page = items.len().max(1) as u32;
    Page::paginate(items, 1, per_page)
}

/// Record in the default test collection.
pub fn rec(id: &str) -> Record {
    Record::new(id, "items")
}

pub fn ids(records: &[Record]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
}
