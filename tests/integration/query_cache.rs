//! Integration tests for query paging, coalescing, and stale result handling

use crate::integration::test_utils::{query_payload, rows, signed_in_client};
use objsync::events::QueryEvent;
use objsync::query::Query;
use objsync::transport::mock::ScriptedTransport;
use serde_json::json;
use std::sync::{Arc, Weak};
use std::time::Duration;

fn build_query(client: &objsync::Client, page_size: Option<i64>) -> Arc<Query> {
    client.construct_query(
        serde_json::from_value(query_payload(page_size, &[])).unwrap(),
        Weak::new(),
        false,
        false,
    )
}

async fn wait_for_requests(transport: &ScriptedTransport, method: &str, count: usize) {
    while transport.request_count(method) < count {
        tokio::task::yield_now().await;
    }
}

fn ids(rows: &[Arc<objsync::Row>]) -> Vec<String> {
    rows.iter().map(|r| r.id().to_string()).collect()
}

#[tokio::test]
async fn test_page_aligned_fetches_for_twenty_row_pages() {
    let (client, transport) = signed_in_client().await;
    let query = build_query(&client, Some(20));
    transport.push_json(
        "ExecuteQuery",
        json!({ "result": { "totalItems": 55, "pageSize": 20, "skip": 0, "items": rows(0..20) } }),
    );
    transport.push_json(
        "ExecuteQuery",
        json!({ "result": { "totalItems": 55, "pageSize": 20, "skip": 20, "items": rows(20..40) } }),
    );

    let first = query.ensure_range(&client, 0, 10).await;
    assert_eq!(ids(&first), (0..10).map(|i| i.to_string()).collect::<Vec<_>>());

    let second = query.ensure_range(&client, 25, 10).await;
    assert_eq!(second.len(), 10);
    assert_eq!(second[0].id(), "25");

    let sent = transport.requests_for("ExecuteQuery");
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].body["query"]["skip"], 0);
    assert_eq!(sent[0].body["query"]["top"], 20);
    assert_eq!(sent[1].body["query"]["skip"], 20);
    assert_eq!(sent[1].body["query"]["top"], 20);

    let spanning = query.ensure_range(&client, 15, 10).await;
    assert_eq!(spanning.first().map(|r| r.id()), Some("15"));
    assert_eq!(spanning.last().map(|r| r.id()), Some("24"));
    assert_eq!(transport.request_count("ExecuteQuery"), 2);
    assert_eq!(query.total_items(), 55);
    assert!(query.is_page_fetched(0) && query.is_page_fetched(1) && !query.is_page_fetched(2));
}

#[tokio::test]
async fn test_unfetched_edge_pages_fetch_one_window() {
    let (client, transport) = signed_in_client().await;
    let query = build_query(&client, Some(10));
    transport.push_json(
        "ExecuteQuery",
        json!({ "result": { "totalItems": 50, "pageSize": 10, "skip": 10, "items": rows(10..20) } }),
    );
    transport.push_json(
        "ExecuteQuery",
        json!({ "result": { "totalItems": 50, "pageSize": 10, "skip": 0, "items": rows(0..30) } }),
    );

    query.ensure_range(&client, 12, 3).await;
    let all = query.ensure_range(&client, 5, 20).await;

    let sent = transport.requests_for("ExecuteQuery");
    assert_eq!(sent[1].body["query"]["skip"], 0);
    assert_eq!(sent[1].body["query"]["top"], 30);
    assert_eq!(all.len(), 20);
}

#[tokio::test]
async fn test_unknown_page_size_fetches_every_range() {
    let (client, transport) = signed_in_client().await;
    let query = build_query(&client, None);
    transport.set_fallback("ExecuteQuery", json!({ "result": { "items": rows(0..5) } }));

    query.ensure_range(&client, 0, 5).await;
    query.ensure_range(&client, 0, 5).await;

    let sent = transport.requests_for("ExecuteQuery");
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].body["query"]["top"], 5);
}

#[tokio::test]
async fn test_unpaged_result_is_fully_resident() {
    let (client, transport) = signed_in_client().await;
    let query = build_query(&client, Some(0));
    transport.push_json(
        "ExecuteQuery",
        json!({ "result": { "totalItems": 8, "pageSize": 0, "items": rows(0..8) } }),
    );

    assert_eq!(query.ensure_range(&client, 0, 3).await.len(), 3);
    assert_eq!(query.ensure_range(&client, 5, 10).await.len(), 3);
    assert_eq!(transport.request_count("ExecuteQuery"), 1);
    assert!(transport.requests_for("ExecuteQuery")[0].body["query"]["top"].is_null());
}

#[tokio::test]
async fn test_concurrent_ranges_share_one_fetch() {
    let (client, transport) = signed_in_client().await;
    let query = build_query(&client, Some(20));
    transport.push_delayed(
        "ExecuteQuery",
        Duration::from_millis(20),
        json!({ "result": { "totalItems": 55, "pageSize": 20, "items": rows(0..20) } }),
    );

    let (a, b) = tokio::join!(
        query.ensure_range(&client, 0, 10),
        query.ensure_range(&client, 5, 10)
    );

    assert_eq!(a.len(), 10);
    assert_eq!(b[0].id(), "5");
    assert_eq!(transport.request_count("ExecuteQuery"), 1);
}

#[tokio::test]
async fn test_late_result_of_superseded_search_is_discarded() {
    let (client, transport) = signed_in_client().await;
    let query = build_query(&client, Some(20));
    let gate_a = transport.push_gated("ExecuteQuery");
    let gate_b = transport.push_gated("ExecuteQuery");

    let search_a = {
        let (client, query) = (Arc::clone(&client), Arc::clone(&query));
        tokio::spawn(async move { query.refresh(&client).await })
    };
    wait_for_requests(&transport, "ExecuteQuery", 1).await;

    let search_b = {
        let (client, query) = (Arc::clone(&client), Arc::clone(&query));
        tokio::spawn(async move { query.search_text(&client, Some("ada")).await })
    };
    wait_for_requests(&transport, "ExecuteQuery", 2).await;

    let b_rows = json!([{ "id": "b1", "values": [] }, { "id": "b2", "values": [] }]);
    gate_b
        .send(json!({ "result": { "totalItems": 2, "pageSize": 20, "items": b_rows } }))
        .unwrap();
    assert!(search_b.await.unwrap());

    gate_a
        .send(json!({ "result": { "totalItems": 55, "pageSize": 20, "items": rows(0..20) } }))
        .unwrap();
    assert!(!search_a.await.unwrap());

    assert_eq!(ids(&query.rows()), vec!["b1", "b2"]);
    assert_eq!(query.total_items(), 2);
    assert_eq!(query.text_search().as_deref(), Some("ada"));
}

#[tokio::test]
async fn test_auto_search_signals_change() {
    let (client, transport) = signed_in_client().await;
    let query = build_query(&client, Some(20));
    transport.push_json(
        "ExecuteQuery",
        json!({ "result": { "totalItems": 3, "pageSize": 20, "items": rows(0..3) } }),
    );
    let mut events = query.subscribe();

    let handle = query.spawn_auto_search(Arc::clone(&client)).unwrap();
    assert!(handle.await.unwrap());
    assert_eq!(query.count(), 3);
    assert!(query.spawn_auto_search(Arc::clone(&client)).is_none());

    let mut saw_change = false;
    while let Ok(event) = events.try_recv() {
        saw_change |= matches!(event, QueryEvent::Changed);
    }
    assert!(saw_change);
}
