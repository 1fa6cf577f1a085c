//! Order book synchronization for Binance depth feeds
//!
//! Keeps a local book consistent with the exchange by combining a REST
//! snapshot with the `<symbol>@depth` diff stream.
//!
//! # Features
//!
//! - Buffering of diffs that race the snapshot fetch, with bounded wait
//! - Sequence gap detection and automatic resynchronization
//! - Cancellation of superseded snapshot fetches
//! - Stream reconnection with exponential backoff
//! - Ranked, depth-accumulated view published on a watch channel
//!
//! # Example
//!
//! ```no_run
//! use depth_sync::{DepthClient, SyncConfig, SyncEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = DepthClient::new(SyncConfig::default().with_limit(20))?;
//!     let mut events = client.events().unwrap();
//!     client.subscribe("BTCUSDT").await?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let SyncEvent::BookUpdated { cursor, .. } = event {
//!             let view = client.view();
//!             println!("{} {:?}", cursor, view.spread());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod coordinator;
pub mod endpoint;
pub mod events;
pub mod fetcher;
pub mod reconnect;
pub mod stream;
pub mod transport;

// Re-export main types
pub use client::{DepthClient, EventReceiver};
pub use config::{ConfigError, SyncConfig};
pub use coordinator::{Command, SyncCoordinator, SyncHandle};
pub use endpoint::Endpoint;
pub use events::{BookView, ConnectionEvent, DisconnectReason, SyncEvent, SyncStatus};
pub use fetcher::{RestSnapshotFetcher, SnapshotFetcher};
pub use reconnect::ReconnectConfig;
pub use stream::DepthStream;
pub use transport::{Transport, TransportError, WsTransport};

#[cfg(any(test, feature = "test-utils"))]
pub use fetcher::MockSnapshotFetcher;
#[cfg(any(test, feature = "test-utils"))]
pub use transport::MockTransport;

// Re-export the lower layers
pub use depth_book::{ApplyResult, BookEngine, RankedLevel, Spread, TopLevels};
pub use depth_types::{DepthError, DepthResult, DepthSnapshot, DepthUpdate, Symbol, UpdateSpeed};
