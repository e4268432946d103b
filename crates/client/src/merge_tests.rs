// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::test_helpers::{ids, page_of, rec};
use serde_json::json;
use yare::parameterized;

fn state(filter: &str, sort: &str) -> MergeState {
    let mut state = MergeState::new(Filter::parse(filter).unwrap(), SortSpec::parse(sort).unwrap());
    state.begin();
    state
}

fn synced(items: Vec<Record>) -> MergeState {
    let mut state = state("", "");
    state.on_fetch(Ok(page_of(items)));
    state
}

fn created(id: &str, at: &str) -> Record {
    rec(id).with_field("created", at)
}

#[test]
fn new_state_is_idle_and_empty() {
    let state = MergeState::new(Filter::all(), SortSpec::default());
    assert_eq!(state.phase(), SyncPhase::Idle);
    let view = state.view();
    assert!(!view.loading);
    assert!(view.is_empty());
}

#[test]
fn begin_sets_loading_once() {
    let mut state = MergeState::new(Filter::all(), SortSpec::default());
    state.begin();
    assert_eq!(state.phase(), SyncPhase::Loading);
    assert!(state.view().loading);

    let version = state.view().version;
    state.begin();
    assert_eq!(state.view().version, version);
}

#[test]
fn events_before_fetch_are_buffered_then_replayed() {
    // Empty remote, creates arrive before the fetch resolves
    let mut state = state("", "-created");
    assert_eq!(state.on_event(ChangeEvent::create(rec("a"))), None);
    assert_eq!(state.on_event(ChangeEvent::create(rec("b"))), None);
    assert_eq!(state.buffered(), 2);
    assert!(state.records().is_empty());

    let applied = state.on_fetch(Ok(page_of(vec![])));

    assert_eq!(applied.len(), 2);
    assert_eq!(ids(state.records()), vec!["a", "b"]);
    assert_eq!(state.buffered(), 0);
    assert_eq!(state.phase(), SyncPhase::Synced);
    assert!(!state.view().loading);
}

#[test]
fn update_after_fetch_replaces_in_place() {
    let mut state = synced(vec![rec("x").with_field("v", "v1")]);

    let applied = state.on_event(ChangeEvent::update(rec("x").with_field("v", "v2")));

    assert_eq!(applied.map(|e| e.kind), Some(ChangeKind::Update));
    assert_eq!(ids(state.records()), vec!["x"]);
    assert_eq!(state.records()[0].fields.get("v"), Some(&json!("v2")));
}

#[test]
fn delete_after_fetch_removes_record() {
    let mut state = synced(vec![rec("x"), rec("y")]);

    let applied = state.on_event(ChangeEvent::delete("y", "items"));

    assert_eq!(applied.map(|e| e.kind), Some(ChangeKind::Delete));
    assert_eq!(ids(state.records()), vec!["x"]);
    assert_eq!(state.view().total_items, 1);
}

#[test]
fn create_for_existing_id_is_an_update() {
    let mut state = synced(vec![rec("x"), rec("y")]);

    let applied = state.on_event(ChangeEvent::create(rec("x").with_field("v", 2)));

    assert_eq!(applied.map(|e| e.kind), Some(ChangeKind::Update));
    assert_eq!(ids(state.records()), vec!["x", "y"]);
    assert_eq!(state.view().total_items, 2);
}

#[test]
fn update_for_absent_id_is_a_create() {
    let mut state = synced(vec![rec("x")]);

    let applied = state.on_event(ChangeEvent::update(rec("z")));

    assert_eq!(applied.map(|e| e.kind), Some(ChangeKind::Create));
    assert_eq!(ids(state.records()), vec!["x", "z"]);
    assert_eq!(state.view().total_items, 2);
}

#[test]
fn delete_of_absent_id_is_noop() {
    let mut state = synced(vec![rec("x")]);
    let before = state.view();

    assert_eq!(state.on_event(ChangeEvent::delete("nope", "items")), None);
    assert_eq!(state.view(), before);
}

#[test]
fn buffered_event_already_in_fetch_is_not_duplicated() {
    // The create raced the fetch and the fetch already includes it
    let mut state = state("", "");
    state.on_event(ChangeEvent::create(rec("x").with_field("v", 2)));

    state.on_fetch(Ok(page_of(vec![rec("x").with_field("v", 1)])));

    assert_eq!(ids(state.records()), vec!["x"]);
    assert_eq!(state.records()[0].fields.get("v"), Some(&json!(2)));
    assert_eq!(state.view().total_items, 1);
}

#[test]
fn buffered_delete_of_fetched_record_applies() {
    let mut state = state("", "");
    state.on_event(ChangeEvent::delete("y", "items"));

    state.on_fetch(Ok(page_of(vec![rec("x"), rec("y")])));

    assert_eq!(ids(state.records()), vec!["x"]);
}

#[test]
fn fetch_duplicates_are_collapsed() {
    let state = synced(vec![rec("x"), rec("y"), rec("x")]);
    assert_eq!(ids(state.records()), vec!["x", "y"]);
}

#[test]
fn insert_follows_sort_order() {
    let mut state = state("", "-created");
    state.on_fetch(Ok(page_of(vec![
        created("c", "2026-03-01"),
        created("a", "2026-01-01"),
    ])));

    state.on_event(ChangeEvent::create(created("newest", "2026-04-01")));
    state.on_event(ChangeEvent::create(created("middle", "2026-02-01")));
    state.on_event(ChangeEvent::create(created("oldest", "2025-12-01")));

    assert_eq!(
        ids(state.records()),
        vec!["newest", "c", "middle", "a", "oldest"]
    );
}

#[test]
fn equal_sort_keys_keep_arrival_order() {
    let mut state = state("", "-created");
    state.on_fetch(Ok(page_of(vec![])));

    state.on_event(ChangeEvent::create(created("first", "2026-01-01")));
    state.on_event(ChangeEvent::create(created("second", "2026-01-01")));

    assert_eq!(ids(state.records()), vec!["first", "second"]);
}

#[test]
fn update_keeps_position_even_if_sort_key_changes() {
    let mut state = state("", "-created");
    state.on_fetch(Ok(page_of(vec![
        created("b", "2026-02-01"),
        created("a", "2026-01-01"),
    ])));

    state.on_event(ChangeEvent::update(created("a", "2026-05-01")));

    assert_eq!(ids(state.records()), vec!["b", "a"]);
}

#[parameterized(
    create = { ChangeKind::Create },
    update = { ChangeKind::Update },
)]
fn non_matching_payload_is_treated_as_delete(kind: ChangeKind) {
    let mut state = state("status = 'open'", "");
    state.on_fetch(Ok(page_of(vec![rec("x").with_field("status", "open")])));

    let applied = state.on_event(ChangeEvent::new(kind, rec("x").with_field("status", "done")));

    assert_eq!(applied.map(|e| e.kind), Some(ChangeKind::Delete));
    assert!(state.records().is_empty());
    assert_eq!(state.view().total_items, 0);
}

#[test]
fn non_matching_create_never_enters() {
    let mut state = state("status = 'open'", "");
    state.on_fetch(Ok(page_of(vec![])));

    let applied = state.on_event(ChangeEvent::create(rec("x").with_field("status", "done")));

    assert_eq!(applied, None);
    assert!(state.records().is_empty());
}

#[test]
fn totals_track_inserts_and_removes() {
    let mut page = page_of(vec![rec("x")]);
    page.total_items = 40;
    let mut state = state("", "");
    state.on_fetch(Ok(page));

    state.on_event(ChangeEvent::create(rec("y")));
    assert_eq!(state.view().total_items, 41);
    state.on_event(ChangeEvent::update(rec("y")));
    assert_eq!(state.view().total_items, 41);
    state.on_event(ChangeEvent::delete("x", "items"));
    state.on_event(ChangeEvent::delete("y", "items"));
    assert_eq!(state.view().total_items, 39);
}

#[test]
fn totals_never_underflow() {
    let mut page = page_of(vec![rec("x")]);
    page.total_items = 0;
    let mut state = state("", "");
    state.on_fetch(Ok(page));

    state.on_event(ChangeEvent::delete("x", "items"));
    assert_eq!(state.view().total_items, 0);
}

#[test]
fn fetch_failure_degrades_but_keeps_applying_events() {
    let mut state = state("", "");
    state.on_event(ChangeEvent::create(rec("early")));

    let applied = state.on_fetch(Err(FetchError::Server {
        status: 503,
        message: "unavailable".into(),
    }));
    assert_eq!(applied.len(), 1);

    let view = state.view();
    assert!(!view.loading);
    assert_eq!(view.phase, SyncPhase::Synced);
    assert!(matches!(view.error, Some(FetchError::Server { status: 503, .. })));
    assert_eq!(ids(&view.records), vec!["early"]);

    state.on_event(ChangeEvent::create(rec("late")));
    assert_eq!(ids(state.records()), vec!["early", "late"]);
}

#[test]
fn fetch_reports_page_count() {
    let items = vec![rec("a"), rec("b"), rec("c")];
    let mut state = state("", "").with_page(2);
    assert_eq!(state.view().page, 2);
    assert_eq!(state.view().total_pages, 1);

    state.on_fetch(Ok(Page::paginate(items, 2, 2)));
    state.on_event(ChangeEvent::create(rec("d")));

    let view = state.view();
    assert_eq!(view.page, 2);
    assert_eq!(view.total_pages, 2);
    assert_eq!(ids(&view.records), vec!["c", "d"]);
}

#[test]
fn failed_fetch_keeps_one_page() {
    let mut state = state("", "").with_page(3);
    state.on_fetch(Err(FetchError::Network("down".into())));
    assert_eq!(state.view().page, 3);
    assert_eq!(state.view().total_pages, 1);
}

#[test]
fn second_fetch_result_is_ignored() {
    let mut state = synced(vec![rec("x")]);
    let applied = state.on_fetch(Ok(page_of(vec![rec("other")])));
    assert!(applied.is_empty());
    assert_eq!(ids(state.records()), vec!["x"]);
}

#[test]
fn closed_state_discards_everything() {
    let mut state = state("", "");
    state.on_event(ChangeEvent::create(rec("buffered")));
    state.close();

    assert!(state.on_fetch(Ok(page_of(vec![rec("x")]))).is_empty());
    assert_eq!(state.on_event(ChangeEvent::create(rec("y"))), None);

    let view = state.view();
    assert_eq!(view.phase, SyncPhase::Closed);
    assert!(!view.loading);
    assert!(view.is_empty());
    assert_eq!(state.buffered(), 0);
}

#[test]
fn close_is_idempotent() {
    let mut state = synced(vec![rec("x")]);
    state.close();
    let version = state.view().version;
    state.close();
    assert_eq!(state.view().version, version);
}

#[test]
fn views_are_snapshots() {
    let mut state = synced(vec![rec("x")]);
    let before = state.view();

    state.on_event(ChangeEvent::create(rec("y")));

    assert_eq!(ids(&before.records), vec!["x"]);
    assert_eq!(ids(&state.view().records), vec!["x", "y"]);
    assert!(state.view().version > before.version);
}

#[test]
fn view_lookup_by_id() {
    let state = synced(vec![rec("x").with_field("v", 1)]);
    let view = state.view();
    assert_eq!(view.len(), 1);
    assert_eq!(view.get("x").and_then(|r| r.fields.get("v")), Some(&json!(1)));
    assert!(view.get("missing").is_none());
}

#[test]
fn closed_view_is_empty() {
    let view = SnapshotView::closed();
    assert_eq!(view.phase, SyncPhase::Closed);
    assert!(view.is_empty());
    assert!(!view.loading);
}

#[parameterized(
    idle = { SyncPhase::Idle, "idle" },
    loading = { SyncPhase::Loading, "loading" },
    synced = { SyncPhase::Synced, "synced" },
    closed = { SyncPhase::Closed, "closed" },
)]
fn phase_display(phase: SyncPhase, expected: &str) {
    assert_eq!(phase.to_string(), expected);
}
