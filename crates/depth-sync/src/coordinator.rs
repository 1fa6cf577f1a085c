//! Snapshot + diff synchronization actor
//!
//! [`SyncCoordinator`] exclusively owns a [`BookEngine`] and processes its
//! inputs one at a time: commands (subscription changes, stream diffs,
//! connection notices) and completions of its own snapshot fetches.
//!
//! # Protocol
//!
//! ```text
//!  Subscribe / Retry / Gap
//!          |
//!          v
//!  AwaitingEvents --(first event or prefetch_wait)--> Fetching
//!          ^                                             |
//!          |                         snapshot + replay ok|  fetch failed
//!          +------------- gap during replay -------------+------------> Halted
//!                                                        v
//!                                                      Live --gap--> AwaitingEvents
//! ```
//!
//! Diffs that arrive before the book is live are buffered. Once a snapshot
//! lands, buffered events it already covers are dropped and the rest are
//! replayed on top of it. Every (re)initialization bumps a generation counter;
//! a fetch completion tagged with an older generation is discarded.

use crate::{
    config::SyncConfig,
    events::{BookView, ConnectionEvent, SyncEvent, SyncStatus},
    fetcher::SnapshotFetcher,
};
use depth_book::{ApplyResult, BookEngine};
use depth_types::{DepthError, DepthResult, DepthSnapshot, DepthUpdate, Symbol};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Capacity of the command channel
pub const COMMAND_CAPACITY: usize = 4096;

/// Input to the coordinator
#[derive(Debug, Clone)]
pub enum Command {
    /// Track an instrument; switching instruments discards the current book
    Subscribe(Symbol),
    /// Stop tracking
    Unsubscribe,
    /// A diff event from the stream
    Diff(DepthUpdate),
    /// Fetch a fresh snapshot for the current instrument
    Retry,
    /// Change the number of levels per side in the published view
    SetLimit(usize),
    /// Stream connection notice, forwarded to subscribers
    Connection(ConnectionEvent),
    /// Stop the coordinator
    Shutdown,
}

/// Completion of a snapshot fetch
struct SnapshotReady {
    generation: u64,
    result: DepthResult<DepthSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// Buffering; fetch on first event or at the deadline
    AwaitingEvents { deadline: Instant },
    Fetching,
    Live,
    Halted,
}

/// Cloneable handle to a running coordinator
#[derive(Debug, Clone)]
pub struct SyncHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<BookView>,
}

impl SyncHandle {
    /// Send a command
    pub async fn send(&self, command: Command) -> DepthResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| DepthError::ChannelClosed)
    }

    /// Sender for feeding commands from another task
    pub fn commands(&self) -> mpsc::Sender<Command> {
        self.commands.clone()
    }

    /// Latest published view
    pub fn view(&self) -> BookView {
        self.view.borrow().clone()
    }

    /// Receiver notified on every publication
    pub fn watch(&self) -> watch::Receiver<BookView> {
        self.view.clone()
    }

    /// True once the coordinator has stopped
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Actor synchronizing one book from snapshots and diffs
pub struct SyncCoordinator {
    config: SyncConfig,
    fetcher: Arc<dyn SnapshotFetcher>,
    engine: BookEngine,

    subject: Option<Symbol>,
    phase: Phase,
    resyncing: bool,
    buffer: VecDeque<DepthUpdate>,
    generation: u64,
    limit: usize,
    fetch_task: Option<JoinHandle<()>>,

    commands: mpsc::Receiver<Command>,
    snapshot_tx: mpsc::UnboundedSender<SnapshotReady>,
    snapshot_rx: mpsc::UnboundedReceiver<SnapshotReady>,
    view_tx: watch::Sender<BookView>,
    event_tx: mpsc::UnboundedSender<SyncEvent>,
}

impl SyncCoordinator {
    /// Create a coordinator, its handle and its event receiver
    ///
    /// Nothing runs until [`run`](Self::run) is awaited or spawned.
    pub fn new(
        config: SyncConfig,
        fetcher: Arc<dyn SnapshotFetcher>,
    ) -> (Self, SyncHandle, mpsc::UnboundedReceiver<SyncEvent>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(BookView::default());
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let coordinator = Self {
            limit: config.limit,
            config,
            fetcher,
            engine: BookEngine::new(),
            subject: None,
            phase: Phase::Idle,
            resyncing: false,
            buffer: VecDeque::new(),
            generation: 0,
            fetch_task: None,
            commands: command_rx,
            snapshot_tx,
            snapshot_rx,
            view_tx,
            event_tx,
        };

        let handle = SyncHandle {
            commands: command_tx,
            view: view_rx,
        };

        (coordinator, handle, event_rx)
    }

    /// Create a coordinator and spawn it on the current runtime
    pub fn spawn(
        config: SyncConfig,
        fetcher: Arc<dyn SnapshotFetcher>,
    ) -> (SyncHandle, mpsc::UnboundedReceiver<SyncEvent>, JoinHandle<()>) {
        let (coordinator, handle, events) = Self::new(config, fetcher);
        let task = tokio::spawn(coordinator.run());
        (handle, events, task)
    }

    /// Process inputs until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        debug!("Sync coordinator started");

        loop {
            let deadline = match self.phase {
                Phase::AwaitingEvents { deadline } => Some(deadline),
                _ => None,
            };

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(ready) = self.snapshot_rx.recv() => self.on_snapshot(ready),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    debug!("No event within prefetch wait, fetching anyway");
                    self.start_fetch();
                }
            }
        }

        self.abort_fetch();
        debug!("Sync coordinator stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Subscribe(symbol) => self.subscribe(symbol),
            Command::Unsubscribe => self.unsubscribe(),
            Command::Diff(update) => self.on_diff(update),
            Command::Retry => self.retry(),
            Command::SetLimit(limit) => self.set_limit(limit),
            Command::Connection(event) => self.emit(SyncEvent::Connection(event)),
            Command::Shutdown => {}
        }
    }

    // ------------------------------------------------------------------
    // Subscription lifecycle
    // ------------------------------------------------------------------

    fn subscribe(&mut self, symbol: Symbol) {
        if self.subject.as_ref() == Some(&symbol) {
            debug!(symbol = %symbol, "Already subscribed");
            return;
        }

        info!(symbol = %symbol, "Subscribing");
        self.engine.reset();
        self.subject = Some(symbol);
        self.begin_sync(false);
    }

    fn unsubscribe(&mut self) {
        let Some(symbol) = self.subject.take() else {
            return;
        };

        info!(symbol = %symbol, "Unsubscribing");
        self.abort_fetch();
        self.generation += 1;
        self.phase = Phase::Idle;
        self.resyncing = false;
        self.buffer.clear();
        if self.config.reset_on_unsubscribe {
            self.engine.reset();
        }
        self.publish();
    }

    fn retry(&mut self) {
        let Some(symbol) = self.subject.clone() else {
            debug!("Retry without subscription");
            return;
        };

        info!(symbol = %symbol, "Retrying synchronization");
        self.emit(SyncEvent::Resyncing { symbol });
        self.begin_sync(self.engine.is_seeded());
    }

    fn set_limit(&mut self, limit: usize) {
        if limit == 0 {
            warn!("Ignoring zero display limit");
            return;
        }
        self.limit = limit;
        self.publish();
    }

    /// Start a fresh initialization round for the current subject
    ///
    /// The buffer starts empty; the next fetch waits for a new stream event or
    /// the prefetch deadline.
    fn begin_sync(&mut self, resyncing: bool) {
        self.abort_fetch();
        self.generation += 1;
        self.resyncing = resyncing;
        self.buffer.clear();
        self.phase = Phase::AwaitingEvents {
            deadline: Instant::now() + self.config.prefetch_wait,
        };
        self.publish();
    }

    fn resync(&mut self) {
        let Some(symbol) = self.subject.clone() else {
            return;
        };
        self.emit(SyncEvent::Resyncing { symbol });
        self.begin_sync(true);
    }

    // ------------------------------------------------------------------
    // Diffs
    // ------------------------------------------------------------------

    fn on_diff(&mut self, update: DepthUpdate) {
        let Some(symbol) = self.subject.clone() else {
            return;
        };
        if !symbol.matches(&update.symbol) {
            debug!(
                subscribed = %symbol,
                received = %update.symbol,
                "Ignoring diff for another instrument"
            );
            return;
        }

        match self.phase {
            Phase::Live => self.apply_live(symbol, update),
            Phase::AwaitingEvents { .. } => {
                self.push_buffered(update);
                self.start_fetch();
            }
            Phase::Fetching => self.push_buffered(update),
            Phase::Halted | Phase::Idle => {}
        }
    }

    fn apply_live(&mut self, symbol: Symbol, update: DepthUpdate) {
        match self.engine.apply_diff(&update) {
            Ok(ApplyResult::Applied) => {
                let cursor = self.engine.cursor();
                self.publish();
                self.emit(SyncEvent::BookUpdated { symbol, cursor });
            }
            Ok(ApplyResult::Stale) => {
                debug!(
                    symbol = %symbol,
                    cursor = self.engine.cursor(),
                    final_update_id = update.final_update_id,
                    "Dropping stale diff"
                );
            }
            Ok(ApplyResult::Gap) => {
                let cursor = self.engine.cursor();
                warn!(
                    symbol = %symbol,
                    cursor,
                    first_update_id = update.first_update_id,
                    final_update_id = update.final_update_id,
                    prev_final_update_id = ?update.prev_final_update_id,
                    "Sequence gap, resynchronizing"
                );
                self.emit(SyncEvent::GapDetected {
                    symbol,
                    cursor,
                    first_update_id: update.first_update_id,
                    final_update_id: update.final_update_id,
                });
                self.resync();
            }
            Err(e) => {
                warn!(
                    symbol = %symbol,
                    final_update_id = update.final_update_id,
                    error = %e,
                    "Rejecting malformed diff"
                );
                self.emit(SyncEvent::MalformedUpdate {
                    symbol,
                    error: e.to_string(),
                });
            }
        }
    }

    fn push_buffered(&mut self, update: DepthUpdate) {
        self.buffer.push_back(update);
        self.trim_buffer();
    }

    /// Enforce the buffer capacity by dropping the oldest events
    ///
    /// Replay notices the missing range and forces another resync.
    fn trim_buffer(&mut self) {
        let max = self.config.max_buffered_events.max(1);
        while self.buffer.len() > max {
            if let Some(dropped) = self.buffer.pop_front() {
                warn!(
                    symbol = %dropped.symbol,
                    dropped_first = dropped.first_update_id,
                    dropped_final = dropped.final_update_id,
                    max,
                    "Event buffer full, dropping oldest event"
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    fn start_fetch(&mut self) {
        let Some(symbol) = self.subject.clone() else {
            return;
        };

        self.phase = Phase::Fetching;
        let generation = self.generation;
        let limit = self.config.snapshot_limit;
        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.snapshot_tx.clone();

        debug!(symbol = %symbol, generation, limit, "Fetching snapshot");
        self.fetch_task = Some(tokio::spawn(async move {
            let result = fetcher.fetch(&symbol, limit).await;
            let _ = tx.send(SnapshotReady { generation, result });
        }));
    }

    fn abort_fetch(&mut self) {
        if let Some(task) = self.fetch_task.take() {
            task.abort();
        }
    }

    fn on_snapshot(&mut self, ready: SnapshotReady) {
        if ready.generation != self.generation || self.phase != Phase::Fetching {
            debug!(
                generation = ready.generation,
                current = self.generation,
                "Discarding superseded snapshot"
            );
            return;
        }
        self.fetch_task = None;

        let snapshot = match ready.result {
            Ok(snapshot) => snapshot,
            Err(e) => return self.halt(e),
        };

        if let Err(e) = self.engine.apply_snapshot(&snapshot) {
            return self.halt(e.into());
        }

        self.replay(snapshot.last_update_id);
    }

    /// Apply buffered events on top of a freshly loaded snapshot
    fn replay(&mut self, snapshot_cursor: u64) {
        let Some(symbol) = self.subject.clone() else {
            return;
        };

        let mut pending = std::mem::take(&mut self.buffer);
        let mut discarded = 0;
        let mut replayed = 0;

        while let Some(update) = pending.pop_front() {
            if update.final_update_id <= snapshot_cursor {
                discarded += 1;
                continue;
            }

            let result = if replayed == 0 {
                self.engine.apply_bridging(&update)
            } else {
                self.engine.apply_diff(&update)
            };

            match result {
                Ok(ApplyResult::Applied) => replayed += 1,
                Ok(ApplyResult::Stale) => discarded += 1,
                Ok(ApplyResult::Gap) => {
                    let cursor = self.engine.cursor();
                    warn!(
                        symbol = %symbol,
                        cursor,
                        snapshot_cursor,
                        first_update_id = update.first_update_id,
                        final_update_id = update.final_update_id,
                        "Buffered events do not continue the snapshot"
                    );
                    self.emit(SyncEvent::GapDetected {
                        symbol,
                        cursor,
                        first_update_id: update.first_update_id,
                        final_update_id: update.final_update_id,
                    });
                    return self.resync();
                }
                Err(e) => {
                    warn!(
                        symbol = %symbol,
                        final_update_id = update.final_update_id,
                        error = %e,
                        "Malformed buffered event, resynchronizing"
                    );
                    self.emit(SyncEvent::MalformedUpdate {
                        symbol,
                        error: e.to_string(),
                    });
                    return self.resync();
                }
            }
        }

        self.phase = Phase::Live;
        self.resyncing = false;
        let cursor = self.engine.cursor();
        info!(
            symbol = %symbol,
            cursor,
            snapshot_cursor,
            replayed,
            discarded,
            "Book synchronized"
        );
        self.publish();
        self.emit(SyncEvent::Synchronized {
            symbol,
            cursor,
            replayed,
            discarded,
        });
    }

    fn halt(&mut self, error: DepthError) {
        self.phase = Phase::Halted;
        self.resyncing = false;
        self.buffer.clear();

        let Some(symbol) = self.subject.clone() else {
            return;
        };
        let retryable = error.is_retryable();
        warn!(symbol = %symbol, error = %error, retryable, "Snapshot failed");
        self.publish();
        self.emit(SyncEvent::SnapshotFailed {
            symbol,
            error: error.to_string(),
            retryable,
        });
    }

    // ------------------------------------------------------------------
    // Outputs
    // ------------------------------------------------------------------

    /// True while diffs go straight to the engine
    pub fn is_initialized(&self) -> bool {
        self.phase == Phase::Live
    }

    fn status(&self) -> SyncStatus {
        match self.phase {
            Phase::Idle => SyncStatus::Idle,
            Phase::Live => SyncStatus::Synced,
            Phase::Halted => SyncStatus::Failed,
            Phase::AwaitingEvents { .. } | Phase::Fetching if self.resyncing => {
                SyncStatus::Resyncing
            }
            Phase::AwaitingEvents { .. } | Phase::Fetching => SyncStatus::Initializing,
        }
    }

    fn publish(&self) {
        let view = BookView {
            symbol: self.subject.clone(),
            status: self.status(),
            cursor: self.engine.cursor(),
            levels: self.engine.top_levels(self.limit),
        };
        self.view_tx.send_replace(view);
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.event_tx.send(event);
    }
}
