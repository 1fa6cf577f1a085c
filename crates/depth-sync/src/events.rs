//! Published state and notifications
//!
//! - [`BookView`]: latest ranked view of the book, on a watch channel
//! - [`SyncEvent`]: lifecycle notifications, on an unbounded channel

use depth_book::{Spread, TopLevels};
use depth_types::Symbol;
use std::fmt;
use std::time::Duration;

/// Reason the stream connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Server closed the connection
    ServerClosed,
    /// Network or protocol error
    NetworkError(String),
    /// Connection attempt timed out
    Timeout,
    /// Client requested shutdown
    Shutdown,
}

/// Stream connection lifecycle events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Stream is open
    Connected {
        /// Stream URL
        url: String,
    },
    /// Stream was lost
    Disconnected {
        /// Reason for disconnection
        reason: DisconnectReason,
    },
    /// Waiting before the next connection attempt
    Reconnecting {
        /// Current attempt number (1-indexed)
        attempt: u32,
        /// Delay before this attempt
        delay: Duration,
    },
    /// Reconnection attempts exhausted; the stream is gone for good
    ReconnectFailed {
        /// Last error
        error: String,
    },
}

/// Synchronization status of the published book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// No subscription
    #[default]
    Idle,
    /// Waiting for the first snapshot of a subscription
    Initializing,
    /// A gap was seen; showing the last good book while resynchronizing
    Resyncing,
    /// Snapshot applied and diffs flowing
    Synced,
    /// Snapshot fetch failed; waiting for a retry
    Failed,
}

impl SyncStatus {
    /// Get the status as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Resyncing => "resyncing",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of what presentation code should render
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookView {
    /// Subscribed instrument
    pub symbol: Option<Symbol>,
    /// Synchronization status
    pub status: SyncStatus,
    /// Book cursor at the time of publication
    pub cursor: u64,
    /// Ranked levels, best first
    pub levels: TopLevels,
}

impl BookView {
    /// Spread at the top of the view
    pub fn spread(&self) -> Option<Spread> {
        self.levels.spread()
    }

    /// True once the view reflects a synchronized book
    pub fn is_synced(&self) -> bool {
        self.status == SyncStatus::Synced
    }
}

/// Synchronization lifecycle notifications
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Snapshot applied and buffer replayed
    Synchronized {
        /// Instrument
        symbol: Symbol,
        /// Cursor after replay
        cursor: u64,
        /// Buffered events applied on top of the snapshot
        replayed: usize,
        /// Buffered events already covered by the snapshot
        discarded: usize,
    },
    /// A live diff was applied
    BookUpdated {
        /// Instrument
        symbol: Symbol,
        /// New cursor
        cursor: u64,
    },
    /// A diff did not continue the book
    GapDetected {
        /// Instrument
        symbol: Symbol,
        /// Cursor at the time of the gap
        cursor: u64,
        /// `U` of the offending event
        first_update_id: u64,
        /// `u` of the offending event
        final_update_id: u64,
    },
    /// A new snapshot is being fetched for the current subscription
    Resyncing {
        /// Instrument
        symbol: Symbol,
    },
    /// Snapshot fetch failed; send a retry to try again
    SnapshotFailed {
        /// Instrument
        symbol: Symbol,
        /// Error description
        error: String,
        /// Whether the failure looks transient
        retryable: bool,
    },
    /// A live diff carried an unparsable level and was rejected
    MalformedUpdate {
        /// Instrument
        symbol: Symbol,
        /// Parse error
        error: String,
    },
    /// Stream connection event
    Connection(ConnectionEvent),
}

impl SyncEvent {
    /// Instrument this event refers to, if any
    pub fn symbol(&self) -> Option<&Symbol> {
        match self {
            Self::Synchronized { symbol, .. }
            | Self::BookUpdated { symbol, .. }
            | Self::GapDetected { symbol, .. }
            | Self::Resyncing { symbol }
            | Self::SnapshotFailed { symbol, .. }
            | Self::MalformedUpdate { symbol, .. } => Some(symbol),
            Self::Connection(_) => None,
        }
    }
}

impl From<ConnectionEvent> for SyncEvent {
    fn from(event: ConnectionEvent) -> Self {
        SyncEvent::Connection(event)
    }
}
