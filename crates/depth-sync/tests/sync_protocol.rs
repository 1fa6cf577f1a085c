//! End-to-end tests of the snapshot + diff synchronization protocol
//!
//! The coordinator runs on a paused clock against a scripted snapshot fetcher;
//! the last tests also drive it through the stream source with a mock
//! transport.

mod common;

use common::*;
use depth_sync::{
    Command, DepthClient, DepthError, DepthSnapshot, DepthUpdate, MockSnapshotFetcher,
    MockTransport, SyncConfig, SyncEvent, SyncStatus,
};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Initialization and replay
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_replay_discards_covered_events() {
    let mut h = Harness::new();
    let pending = h.fetcher.defer();

    h.send(Command::Subscribe(btc())).await;
    h.diff(diff(90, 95)).await;
    h.diff(diff(96, 100).with_bid("100.0", "7")).await;
    h.diff(diff(99, 103).with_bid("99.0", "1")).await;
    h.diff(diff(104, 104).with_ask("101.0", "0")).await;
    h.wait_for_fetches(1).await;

    pending.send(Ok(snapshot(100))).unwrap();

    match h.next().await {
        SyncEvent::Synchronized {
            cursor,
            replayed,
            discarded,
            ..
        } => {
            assert_eq!(cursor, 104);
            assert_eq!(replayed, 2);
            assert_eq!(discarded, 2);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    let view = h.handle.view();
    assert_eq!(view.status, SyncStatus::Synced);
    // (96, 100) was covered by the snapshot, so its bid change is not applied
    assert_eq!(view.levels.bids[0].qty, dec!(2));
    assert_eq!(view.levels.bids[1].price, dec!(99));
    assert!(view.levels.asks.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_older_than_buffer_forces_refetch() {
    let mut h = Harness::new();
    h.fetcher.push_snapshot(snapshot(100));
    h.fetcher.push_snapshot(snapshot(152));

    h.send(Command::Subscribe(btc())).await;
    h.diff(diff(150, 155).with_bid("100.5", "1")).await;

    assert!(matches!(
        h.next().await,
        SyncEvent::GapDetected {
            cursor: 100,
            first_update_id: 150,
            ..
        }
    ));
    assert!(matches!(h.next().await, SyncEvent::Resyncing { .. }));

    // The buffer starts over; the next stream event triggers the refetch
    h.diff(diff(153, 156).with_bid("100.5", "1")).await;
    assert!(matches!(
        h.next().await,
        SyncEvent::Synchronized {
            cursor: 156,
            replayed: 1,
            ..
        }
    ));
    assert_eq!(h.fetcher.calls(), 2);
    assert_eq!(h.handle.view().levels.bids[0].price, dec!(100.5));
}

#[tokio::test(start_paused = true)]
async fn test_buffer_overflow_drops_oldest_and_recovers() {
    let mut h = Harness::with_config(SyncConfig::default().with_max_buffered_events(3));
    let pending = h.fetcher.defer();
    h.fetcher.push_snapshot(snapshot(105));

    h.send(Command::Subscribe(btc())).await;
    for id in 101..=105 {
        h.diff(diff(id, id)).await;
    }
    h.wait_for_fetches(1).await;

    // 101 and 102 were dropped; 103 does not continue a snapshot at 100
    pending.send(Ok(snapshot(100))).unwrap();

    assert!(matches!(
        h.next().await,
        SyncEvent::GapDetected {
            first_update_id: 103,
            ..
        }
    ));
    assert!(matches!(h.next().await, SyncEvent::Resyncing { .. }));

    h.diff(diff(106, 106)).await;
    match h.next().await {
        SyncEvent::Synchronized {
            cursor, replayed, ..
        } => {
            assert_eq!(cursor, 106);
            assert_eq!(replayed, 1);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

/// Diffs that straddle the snapshot id, as they would arrive on the stream
fn bridging_sequence() -> Vec<DepthUpdate> {
    vec![
        diff(98, 102).with_bid("100.0", "3").with_ask("101.5", "2"),
        diff(103, 105).with_bid("99.0", "4").with_ask("101.0", "0"),
        diff(106, 106).with_bid("100.0", "0").with_ask("102.0", "1"),
        diff(107, 110).with_bid("98.5", "2"),
    ]
}

#[tokio::test(start_paused = true)]
async fn test_buffered_replay_matches_live_application() {
    // Buffered while the snapshot is in flight
    let mut buffered = Harness::new();
    let pending = buffered.fetcher.defer();
    buffered.send(Command::Subscribe(btc())).await;
    for update in bridging_sequence() {
        buffered.diff(update).await;
    }
    buffered.wait_for_fetches(1).await;
    pending.send(Ok(snapshot(100))).unwrap();
    assert!(matches!(
        buffered.next().await,
        SyncEvent::Synchronized {
            cursor: 110,
            replayed: 4,
            ..
        }
    ));

    // Same events after the book is already live
    let mut live = Harness::new();
    live.fetcher.push_snapshot(snapshot(100));
    live.send(Command::Subscribe(btc())).await;
    assert!(matches!(
        live.next().await,
        SyncEvent::Synchronized { cursor: 100, .. }
    ));
    for update in bridging_sequence() {
        live.diff(update).await;
        assert!(matches!(live.next().await, SyncEvent::BookUpdated { .. }));
    }

    let a = buffered.handle.view();
    let b = live.handle.view();
    assert_eq!(a.cursor, 110);
    assert_eq!(a.cursor, b.cursor);
    assert_eq!(a.levels, b.levels);
    assert_eq!(a.levels.bids[0].price, dec!(99));
    assert_eq!(a.levels.asks[0].price, dec!(101.5));
}

#[tokio::test(start_paused = true)]
async fn test_futures_replay_bridges_on_prev_id() {
    let mut h = Harness::new();
    let pending = h.fetcher.defer();

    h.send(Command::Subscribe(btc())).await;
    // `pu` of the first event refers to a stream event, not the snapshot
    h.diff(diff(95, 105).with_prev(94).with_bid("100.0", "5")).await;
    h.diff(diff(106, 110).with_prev(105).with_ask("101.0", "2")).await;
    h.wait_for_fetches(1).await;
    pending.send(Ok(snapshot(100))).unwrap();

    assert!(matches!(
        h.next().await,
        SyncEvent::Synchronized {
            cursor: 110,
            replayed: 2,
            ..
        }
    ));

    // Live: a broken `pu` chain is a gap
    h.fetcher.push_snapshot(snapshot(200));
    h.diff(diff(111, 115).with_prev(109)).await;
    assert!(matches!(h.next().await, SyncEvent::GapDetected { cursor: 110, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_foreign_symbol_not_buffered() {
    let mut h = Harness::new();
    let pending = h.fetcher.defer();

    h.send(Command::Subscribe(btc())).await;
    h.diff(DepthUpdate::new("ETHUSDT", 1, 1)).await;
    h.diff(diff(100, 101)).await;
    h.diff(DepthUpdate::new("ETHUSDT", 2, 2)).await;
    h.wait_for_fetches(1).await;
    pending.send(Ok(snapshot(100))).unwrap();

    assert!(matches!(
        h.next().await,
        SyncEvent::Synchronized {
            replayed: 1,
            discarded: 0,
            ..
        }
    ));
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_late_snapshot_after_switch_is_discarded() {
    let mut h = Harness::new();
    let btc_fetch = h.fetcher.defer();
    h.fetcher.push_snapshot(
        DepthSnapshot::new(500)
            .with_bid("2000", "10")
            .with_ask("2001", "4"),
    );

    h.send(Command::Subscribe(btc())).await;
    h.diff(diff(1, 1)).await;
    h.wait_for_fetches(1).await;

    h.send(Command::Subscribe(eth())).await;
    h.diff(DepthUpdate::new("ETHUSDT", 499, 501)).await;

    assert!(matches!(
        h.next().await,
        SyncEvent::Synchronized { cursor: 501, .. }
    ));

    // The superseded fetch was aborted; completing it changes nothing
    let _ = btc_fetch.send(Ok(snapshot(9_999)));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let view = h.handle.view();
    assert_eq!(view.symbol, Some(eth()));
    assert_eq!(view.cursor, 501);
    assert_eq!(view.levels.bids[0].price, dec!(2000));
    assert_eq!(h.fetcher.requests()[1].0, eth());
}

#[tokio::test(start_paused = true)]
async fn test_retry_supersedes_inflight_fetch() {
    let mut h = Harness::new();
    let first = h.fetcher.defer();
    let second = h.fetcher.defer();

    h.send(Command::Subscribe(btc())).await;
    h.diff(diff(10, 10)).await;
    h.wait_for_fetches(1).await;

    h.send(Command::Retry).await;
    assert!(matches!(h.next().await, SyncEvent::Resyncing { .. }));

    let _ = first.send(Ok(snapshot(5_000)));
    h.diff(diff(11, 11)).await;
    h.wait_for_fetches(2).await;
    second.send(Ok(snapshot(10))).unwrap();

    assert!(matches!(
        h.next().await,
        SyncEvent::Synchronized { cursor: 11, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_can_keep_book() {
    let mut h = Harness::with_config(SyncConfig::default().keep_book_on_unsubscribe());
    h.fetcher.push_snapshot(snapshot(100));

    h.send(Command::Subscribe(btc())).await;
    h.until_synchronized().await;

    h.send(Command::Unsubscribe).await;
    h.diff(diff(101, 101)).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let view = h.handle.view();
    assert_eq!(view.status, SyncStatus::Idle);
    assert_eq!(view.cursor, 100);
    assert_eq!(view.levels.bids.len(), 1);
}

// =============================================================================
// Failure handling
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_failure_then_retry_recovers() {
    let mut h = Harness::new();
    h.fetcher.push_error(DepthError::Http {
        url: "https://api.binance.com/api/v3/depth".into(),
        status: 400,
        body: r#"{"code":-1121,"msg":"Invalid symbol."}"#.into(),
    });
    h.fetcher.push_snapshot(snapshot(100));

    h.send(Command::Subscribe(btc())).await;
    match h.next().await {
        SyncEvent::SnapshotFailed {
            symbol,
            error,
            retryable,
        } => {
            assert_eq!(symbol, btc());
            assert!(error.contains("400"));
            assert!(!retryable);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // Diffs while halted are not applied
    h.diff(diff(101, 101)).await;
    assert_eq!(h.handle.view().status, SyncStatus::Failed);

    h.send(Command::Retry).await;
    let seen = h.until_synchronized().await;
    assert!(matches!(seen[0], SyncEvent::Resyncing { .. }));
    assert_eq!(h.handle.view().cursor, 100);
    assert_eq!(h.fetcher.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_snapshot_halts() {
    let mut h = Harness::new();
    h.fetcher
        .push_snapshot(DepthSnapshot::new(100).with_bid("not-a-price", "1"));

    h.send(Command::Subscribe(btc())).await;
    match h.next().await {
        SyncEvent::SnapshotFailed { retryable, .. } => assert!(!retryable),
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(h.handle.view().cursor, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_resync_keeps_last_good_book() {
    let mut h = Harness::new();
    h.fetcher.push_snapshot(snapshot(100));
    h.fetcher.push_error(DepthError::RequestFailed {
        url: "mock".into(),
        reason: "connection reset".into(),
    });

    h.send(Command::Subscribe(btc())).await;
    h.until_synchronized().await;

    h.diff(diff(500, 501)).await;
    loop {
        if let SyncEvent::SnapshotFailed { retryable, .. } = h.next().await {
            assert!(retryable);
            break;
        }
    }

    let view = h.handle.view();
    assert_eq!(view.status, SyncStatus::Failed);
    assert_eq!(view.cursor, 100);
    assert_eq!(view.levels.bids[0].qty, dec!(2));
}

// =============================================================================
// Through the stream source
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_client_with_mock_stream() {
    let fetcher = Arc::new(MockSnapshotFetcher::new());
    fetcher.push_snapshot(DepthSnapshot::parse(SNAPSHOT_BODY).unwrap());
    fetcher.push_snapshot(DepthSnapshot::new(300).with_bid("98", "1"));

    let client = DepthClient::with_fetcher(SyncConfig::default(), fetcher.clone()).unwrap();
    let mut events = client.events().unwrap();

    let mut transport = MockTransport::new("wss://mock/btcusdt@depth@1000ms");
    transport.push_response(SPOT_FRAME);
    transport.push_response(
        r#"{"e":"depthUpdate","E":1,"s":"BTCUSDT","U":102,"u":102,"b":[],"a":[["102.5","1"]]}"#,
    );
    // Jump ahead: forces a resync
    transport.push_response(
        r#"{"e":"depthUpdate","E":2,"s":"BTCUSDT","U":250,"u":260,"b":[],"a":[]}"#,
    );

    client.subscribe_with("BTCUSDT", transport).await.unwrap();

    // Depending on when the first snapshot lands, the jump is seen live or
    // during replay; either way it ends in a second fetch
    let mut gap_seen = false;
    loop {
        let event = tokio::time::timeout(Duration::from_secs(60), events.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            SyncEvent::GapDetected {
                first_update_id: 250,
                ..
            } => gap_seen = true,
            SyncEvent::Synchronized { cursor: 300, .. } => break,
            _ => {}
        }
    }

    assert!(gap_seen);
    let view = client.view();
    assert_eq!(view.levels.bids[0].price, dec!(98));
    assert_eq!(fetcher.calls(), 2);

    client.shutdown().await;
}
