// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use super::*;
use crate::test_helpers::{page_of, rec, MockServer};

fn fetcher(server: &MockServer, timeout_ms: u64) -> RemoteFetcher {
    RemoteFetcher::new(server.connector(), Duration::from_millis(timeout_ms))
}

#[tokio::test]
async fn remote_fetch_returns_page() {
    let server = MockServer::new();
    server.respond_with(|msg| match msg {
        ClientMessage::Fetch { request_id, .. } => Some(ServerMessage::page(
            *request_id,
            page_of(vec![rec("a"), rec("b")]),
        )),
        _ => None,
    });

    let page = fetcher(&server, 1000)
        .fetch_page(PageQuery::new("items", 20).filter("v > 1"))
        .await
        .unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(server.disconnects(), 1);
    match &server.sent()[0] {
        ClientMessage::Fetch { query, .. } => {
            assert_eq!(query.collection, "items");
            assert_eq!(query.filter, "v > 1");
        }
        other => panic!("expected fetch, got {:?}", other),
    }
}

#[tokio::test]
async fn remote_fetch_maps_server_failure() {
    let server = MockServer::new();
    server.respond_with(|msg| match msg {
        ClientMessage::Fetch { request_id, .. } => Some(ServerMessage::fetch_failed(
            *request_id,
            404,
            "unknown collection",
        )),
        _ => None,
    });

    let err = fetcher(&server, 1000)
        .fetch_page(PageQuery::new("nope", 20))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        FetchError::Server {
            status: 404,
            message: "unknown collection".into()
        }
    );
}

#[tokio::test]
async fn remote_fetch_ignores_other_requests() {
    let server = MockServer::new();
    server.respond_with(|msg| match msg {
        ClientMessage::Fetch { request_id, .. } => Some(ServerMessage::page(
            request_id + 100,
            page_of(vec![rec("stale")]),
        )),
        _ => None,
    });

    let err = fetcher(&server, 50)
        .fetch_page(PageQuery::new("items", 20))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Network(_)));
}

#[tokio::test]
async fn remote_fetch_connect_failure_is_network_error() {
    let server = MockServer::new();
    server.fail_next_connects(1);

    let err = fetcher(&server, 1000)
        .fetch_page(PageQuery::new("items", 20))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Network(_)));
}

#[tokio::test]
async fn remote_fetch_connection_closed_before_response() {
    let server = MockServer::new();
    let fetcher = fetcher(&server, 1000);
    let pending = fetcher.fetch_page(PageQuery::new("items", 20));

    let (result, _) = tokio::join!(pending, async {
        while server.sent().is_empty() {
            tokio::task::yield_now().await;
        }
        server.drop_connection();
    });

    assert!(matches!(result, Err(FetchError::Network(_))));
}
