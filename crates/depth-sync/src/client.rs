//! High-level depth client
//!
//! Wires a [`SyncCoordinator`] to a REST snapshot fetcher and a diff stream
//! for the subscribed instrument.

use crate::{
    config::{ConfigError, SyncConfig},
    coordinator::{Command, SyncCoordinator, SyncHandle},
    events::{BookView, SyncEvent},
    fetcher::{RestSnapshotFetcher, SnapshotFetcher},
    stream::DepthStream,
    transport::Transport,
};
use depth_book::{Spread, TopLevels};
use depth_types::{DepthError, DepthResult, Symbol};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Receiver of synchronization events
pub type EventReceiver = mpsc::UnboundedReceiver<SyncEvent>;

/// Client maintaining a synchronized book for one instrument at a time
///
/// # Example
///
/// ```no_run
/// use depth_sync::{DepthClient, SyncConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = DepthClient::new(SyncConfig::default())?;
///     client.subscribe("BTCUSDT").await?;
///
///     let view = client.wait_synced().await?;
///     if let Some(spread) = view.spread() {
///         println!("BTCUSDT spread: {}", spread);
///     }
///
///     client.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct DepthClient {
    config: SyncConfig,
    handle: SyncHandle,
    events: Mutex<Option<EventReceiver>>,
    coordinator: Mutex<Option<JoinHandle<()>>>,
    stream: Mutex<Option<JoinHandle<()>>>,
}

impl DepthClient {
    /// Create a client fetching snapshots over REST
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: SyncConfig) -> DepthResult<Self> {
        config.validate()?;
        let fetcher = RestSnapshotFetcher::new(config.endpoint.clone(), config.request_timeout)?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Create a client with a custom snapshot fetcher
    pub fn with_fetcher(config: SyncConfig, fetcher: Arc<dyn SnapshotFetcher>) -> DepthResult<Self> {
        config.validate()?;
        let (handle, events, task) = SyncCoordinator::spawn(config.clone(), fetcher);

        info!(endpoint = %config.endpoint, "Depth client started");

        Ok(Self {
            config,
            handle,
            events: Mutex::new(Some(events)),
            coordinator: Mutex::new(Some(task)),
            stream: Mutex::new(None),
        })
    }

    /// Client configuration
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Track `symbol` over the configured WebSocket endpoint
    ///
    /// Replaces the current subscription, if any.
    pub async fn subscribe(&self, symbol: impl Into<Symbol>) -> DepthResult<()> {
        let symbol = symbol.into();
        let stream = DepthStream::websocket(&self.config, symbol.clone(), self.handle.commands());
        self.start(symbol, stream).await
    }

    /// Track `symbol` reading diffs from the given transport
    pub async fn subscribe_with<T>(&self, symbol: impl Into<Symbol>, transport: T) -> DepthResult<()>
    where
        T: Transport + 'static,
    {
        let symbol = symbol.into();
        let stream = DepthStream::new(
            transport,
            symbol.clone(),
            self.config.reconnect.clone(),
            self.handle.commands(),
        );
        self.start(symbol, stream).await
    }

    async fn start<T>(&self, symbol: Symbol, stream: DepthStream<T>) -> DepthResult<()>
    where
        T: Transport + 'static,
    {
        self.stop_stream();

        // Subscribe is queued ahead of the first diff of the new stream
        self.handle.send(Command::Subscribe(symbol.clone())).await?;

        let task = tokio::spawn(async move {
            if let Err(e) = stream.run().await {
                warn!(symbol = %symbol, error = %e, "Depth stream stopped");
            }
        });
        *self.stream.lock() = Some(task);
        Ok(())
    }

    /// Stop tracking the current instrument
    pub async fn unsubscribe(&self) -> DepthResult<()> {
        self.stop_stream();
        self.handle.send(Command::Unsubscribe).await
    }

    /// Fetch a fresh snapshot for the current instrument
    pub async fn retry(&self) -> DepthResult<()> {
        self.handle.send(Command::Retry).await
    }

    /// Change the number of levels per side in the view
    pub async fn set_limit(&self, limit: usize) -> DepthResult<()> {
        if limit == 0 {
            return Err(ConfigError::ZeroLimit.into());
        }
        self.handle.send(Command::SetLimit(limit)).await
    }

    /// Latest published view
    pub fn view(&self) -> BookView {
        self.handle.view()
    }

    /// Receiver notified whenever the view changes
    pub fn watch(&self) -> watch::Receiver<BookView> {
        self.handle.watch()
    }

    /// Ranked levels of the latest view
    pub fn top_levels(&self) -> TopLevels {
        self.handle.view().levels
    }

    /// Spread of the latest view
    pub fn spread(&self) -> Option<Spread> {
        self.handle.view().spread()
    }

    /// Currently subscribed instrument
    pub fn symbol(&self) -> Option<Symbol> {
        self.handle.view().symbol
    }

    /// Take the event receiver (can only be called once)
    pub fn events(&self) -> Option<EventReceiver> {
        self.events.lock().take()
    }

    /// Wait until the view is synchronized
    pub async fn wait_synced(&self) -> DepthResult<BookView> {
        let mut rx = self.handle.watch();
        loop {
            {
                let view = rx.borrow_and_update();
                if view.is_synced() {
                    return Ok(view.clone());
                }
            }
            rx.changed().await.map_err(|_| DepthError::ChannelClosed)?;
        }
    }

    /// Stop the stream and the coordinator
    pub async fn shutdown(&self) {
        debug!("Shutting down depth client");
        self.stop_stream();
        let _ = self.handle.send(Command::Shutdown).await;

        let task = self.coordinator.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    fn stop_stream(&self) {
        if let Some(task) = self.stream.lock().take() {
            task.abort();
        }
    }
}

impl Drop for DepthClient {
    fn drop(&mut self) {
        self.stop_stream();
        if let Some(task) = self.coordinator.lock().take() {
            task.abort();
        }
    }
}
