//! Common fixtures for the synchronization tests
//!
//! Frames follow the shape of live Binance spot and USD-M depth payloads.

#![allow(dead_code)]

use depth_sync::{
    Command, DepthSnapshot, DepthUpdate, MockSnapshotFetcher, SyncConfig, SyncCoordinator,
    SyncEvent, SyncHandle, Symbol,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Sample spot diff frame
pub const SPOT_FRAME: &str = r#"{
    "e": "depthUpdate",
    "E": 1700000000123,
    "s": "BTCUSDT",
    "U": 99,
    "u": 101,
    "b": [["100.00000000", "4.00000000"]],
    "a": [["101.00000000", "0.00000000"]]
}"#;

/// Sample REST depth body
pub const SNAPSHOT_BODY: &str = r#"{
    "lastUpdateId": 100,
    "bids": [["100.00000000", "2.00000000"], ["99.50000000", "1.00000000"]],
    "asks": [["101.00000000", "1.50000000"], ["102.00000000", "3.00000000"]]
}"#;

pub fn btc() -> Symbol {
    Symbol::new("BTCUSDT")
}

pub fn eth() -> Symbol {
    Symbol::new("ETHUSDT")
}

/// Diff for BTCUSDT covering `first..=last`
pub fn diff(first: u64, last: u64) -> DepthUpdate {
    DepthUpdate::new("BTCUSDT", first, last)
}

/// One-level-per-side snapshot
pub fn snapshot(id: u64) -> DepthSnapshot {
    DepthSnapshot::new(id)
        .with_bid("100.0", "2")
        .with_ask("101.0", "1.5")
}

/// Spawned coordinator plus its scripted fetcher
pub struct Harness {
    pub fetcher: Arc<MockSnapshotFetcher>,
    pub handle: SyncHandle,
    pub events: mpsc::UnboundedReceiver<SyncEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        let fetcher = Arc::new(MockSnapshotFetcher::new());
        let (handle, events, _task) = SyncCoordinator::spawn(config, fetcher.clone());
        Self {
            fetcher,
            handle,
            events,
        }
    }

    pub async fn send(&self, command: Command) {
        self.handle.send(command).await.expect("coordinator stopped");
    }

    pub async fn diff(&self, update: DepthUpdate) {
        self.send(Command::Diff(update)).await;
    }

    /// Next published event
    pub async fn next(&mut self) -> SyncEvent {
        tokio::time::timeout(Duration::from_secs(60), self.events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    /// Skip events until a synchronization completes; returns those seen
    pub async fn until_synchronized(&mut self) -> Vec<SyncEvent> {
        let mut seen = Vec::new();
        loop {
            let event = self.next().await;
            let done = matches!(event, SyncEvent::Synchronized { .. });
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    /// Yield until the fetcher has been called `n` times
    pub async fn wait_for_fetches(&self, n: usize) {
        while self.fetcher.calls() < n {
            tokio::task::yield_now().await;
        }
    }
}
