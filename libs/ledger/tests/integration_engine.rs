//! End-to-end tests: snapshot server, three feed servers, one engine

#[macro_use]
mod common;

use common::{eventually, ledger_config, snapshot_server, wait_for_view, MockFeedServer};
use ledger::{ConnectionState, FeedKind, LedgerEngine, OrderStatus};
use std::time::Duration;
use wiremock::MockServer;

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    http: MockServer,
    book: MockFeedServer,
    price: MockFeedServer,
    tap: MockFeedServer,
}

impl Harness {
    async fn start(status: u16, snapshot: &str) -> Self {
        Self {
            http: snapshot_server(status, snapshot).await,
            book: MockFeedServer::start("book-session-token").await,
            price: MockFeedServer::start("price-session-token").await,
            tap: MockFeedServer::start("tap-session-token").await,
        }
    }

    fn config(&self) -> ledger::LedgerConfig {
        ledger_config(&self.http.uri(), &self.book, &self.price, &self.tap)
    }
}

async fn wait_connected(handle: &ledger::LedgerHandle) {
    let connected = eventually(WAIT, || {
        handle
            .feed_states()
            .is_some_and(|states| states.all_connected())
    })
    .await;
    assert!(connected, "streams never connected: {:?}", handle.feed_states());
}

#[tokio::test]
async fn test_open_then_close_scenario() {
    verbose_println!("Testing snapshot -> open -> close...");

    let harness = Harness::start(200, "[]").await;
    let handle = LedgerEngine::start(&harness.config()).await.unwrap();
    let mut views = handle.subscribe();

    let view = wait_for_view(&mut views, WAIT, |v| v.initial_load_complete)
        .await
        .expect("initial load never completed");
    assert!(view.open_orders.is_empty());

    wait_connected(&handle).await;

    harness.book.send(
        r#"{"uuid":"m1","data":{"uuid":"A","date":"2024-01-01T00:00:00Z","status":1,"public":true,"asset":3,"escrow":"E1","wallet":"W","type":2}}"#,
    );
    let view = wait_for_view(&mut views, WAIT, |v| v.open_orders.len() == 1)
        .await
        .expect("open order never appeared");
    assert_eq!(view.open_orders[0].uuid, "A");
    assert!(view.is_highlighted(&view.open_orders[0]));
    verbose_println!("  Open orders: {}", view.open_orders.len());

    harness.book.send(
        r#"{"uuid":"m2","data":{"uuid":"A","date":"2024-01-01T00:00:05Z","status":3,"public":true,"asset":3,"escrow":"E1","wallet":"W","type":2}}"#,
    );
    let view = wait_for_view(&mut views, WAIT, |v| v.open_orders.is_empty())
        .await
        .expect("open order never closed");
    let history = view.history_for("A");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, OrderStatus::Closed);

    // Only the handshake was dropped; both deltas made it through
    let metrics = handle.feed_metrics(FeedKind::Book).unwrap();
    assert_eq!(metrics.handshakes_discarded, 1);
    assert_eq!(metrics.parse_failures, 0);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_snapshot_failure_starts_empty() {
    let harness = Harness::start(500, "boom").await;
    let handle = LedgerEngine::start(&harness.config()).await.unwrap();
    let mut views = handle.subscribe();

    let view = wait_for_view(&mut views, WAIT, |v| v.initial_load_complete)
        .await
        .expect("initial load never completed");
    assert!(view.open_orders.is_empty());
    assert!(view.history.is_empty());

    // Streams still run on top of the empty ledger
    wait_connected(&handle).await;
    harness.book.send(
        r#"{"uuid":"X","date":"2024-02-01T00:00:00Z","status":1,"public":"True","escrow":"E"}"#,
    );
    let view = wait_for_view(&mut views, WAIT, |v| v.open_orders.len() == 1).await;
    assert!(view.is_some(), "flat delta was not applied");

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_snapshot_seeds_ledger_before_streams() {
    let snapshot = r#"[
        {"uuid":"S1","date":"2024-01-02T00:00:00Z","status":1,"public":true,"escrow":"E1","asset":1},
        {"uuid":"S2","date":"2024-01-01T00:00:00Z","status":2,"public":true,"escrow":"E2","origin":"P"}
    ]"#;
    let harness = Harness::start(200, snapshot).await;
    let handle = LedgerEngine::start(&harness.config()).await.unwrap();
    let mut views = handle.subscribe();

    let view = wait_for_view(&mut views, WAIT, |v| v.initial_load_complete)
        .await
        .unwrap();
    assert_eq!(view.open_orders.len(), 1);
    assert_eq!(view.history_for("P").len(), 1);
    // Snapshot rows are not "freshly opened"
    assert!(view.highlights.is_empty());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_price_and_tap_streams() {
    let snapshot = r#"[{"uuid":"A","date":"2024-01-01T00:00:00Z","status":1,"public":true,"escrow":"E1","asset":7,"bid":1}]"#;
    let harness = Harness::start(200, snapshot).await;
    let handle = LedgerEngine::start(&harness.config()).await.unwrap();
    let mut views = handle.subscribe();
    wait_connected(&handle).await;

    harness
        .price
        .send(r#"{"price":{"7":0.5},"subnet_name":{"7":"seven"},"tao_in":{"7":100},"alpha_in":{}}"#);
    harness.price.send(r#"{"price":{"7":0.75}}"#);
    let view = wait_for_view(&mut views, WAIT, |v| v.prices.get(&7) == Some(&0.75))
        .await
        .expect("price never applied");
    assert_eq!(view.asset_name(7), Some("seven"));
    assert_eq!(view.tao_in.get(&7), Some(&100.0));

    // Double-encoded tap frame
    let tap = serde_json::to_string(r#"{"escrow":"E1","tao":2.5,"alpha":9,"price":0.3}"#).unwrap();
    harness.tap.send(tap);
    let view = wait_for_view(&mut views, WAIT, |v| {
        v.open_orders.first().is_some_and(|o| o.tao == 2.5)
    })
    .await
    .expect("tap never applied");
    assert_eq!(view.open_orders[0].alpha, 9.0);
    assert_eq!(view.open_orders[0].price, 0.3);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_malformed_frames_do_not_stop_stream() {
    let harness = Harness::start(200, "[]").await;
    let handle = LedgerEngine::start(&harness.config()).await.unwrap();
    let mut views = handle.subscribe();
    wait_connected(&handle).await;

    harness.book.send("ping");
    harness.book.send(r#"{"unrelated":true}"#);
    harness.book.send(
        r#"{"uuid":"m","data":[{"uuid":"B1","status":1,"public":true,"escrow":"E"},{"status":1,"public":true,"escrow":"F"}]}"#,
    );

    let view = wait_for_view(&mut views, WAIT, |v| v.open_orders.len() == 2)
        .await
        .expect("batch never applied");
    let mut uuids: Vec<&str> = view.open_orders.iter().map(|o| o.uuid.as_str()).collect();
    uuids.sort();
    assert_eq!(uuids, vec!["B1", "m"]);

    let failures = handle.feed_metrics(FeedKind::Book).unwrap().parse_failures;
    assert_eq!(failures, 2);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_batch_terminal_drops_order() {
    let snapshot = r#"[{"uuid":"C","date":"2024-01-01T00:00:00Z","status":1,"public":true,"escrow":"E1"}]"#;
    let harness = Harness::start(200, snapshot).await;
    let handle = LedgerEngine::start(&harness.config()).await.unwrap();
    let mut views = handle.subscribe();
    wait_for_view(&mut views, WAIT, |v| v.open_orders.len() == 1)
        .await
        .expect("snapshot never applied");
    wait_connected(&handle).await;

    harness
        .book
        .send(r#"{"uuid":"m","data":[{"uuid":"C","status":3,"public":true,"escrow":"E1"}]}"#);
    let view = wait_for_view(&mut views, WAIT, |v| v.open_orders.is_empty())
        .await
        .expect("batch terminal never applied");
    // Dropped outright, so it does not show up as history either
    assert!(view.history_for("C").is_empty());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_streams() {
    let harness = Harness::start(200, "[]").await;
    let handle = LedgerEngine::start(&harness.config()).await.unwrap();
    wait_connected(&handle).await;

    let states = handle.feed_states().unwrap();
    assert_eq!(states.get(FeedKind::Tap), ConnectionState::Connected);
    assert!(states.exhausted().is_empty());
    assert!(harness.book.connection_count() >= 1);

    tokio::time::timeout(WAIT, handle.shutdown())
        .await
        .expect("shutdown hung")
        .unwrap();
}
