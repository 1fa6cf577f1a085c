//! Synchronization settings

use crate::{endpoint::Endpoint, reconnect::ReconnectConfig};
use depth_types::{DepthError, UpdateSpeed};
use std::time::Duration;
use thiserror::Error;

/// Invalid [`SyncConfig`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Display depth must be at least one level
    #[error("display limit must be greater than zero")]
    ZeroLimit,

    /// Snapshot depth must be at least one level
    #[error("snapshot limit must be greater than zero")]
    ZeroSnapshotLimit,

    /// Snapshot depth above what the endpoint serves
    #[error("snapshot limit {limit} exceeds the endpoint maximum of {max}")]
    SnapshotLimitTooLarge { limit: u32, max: u32 },

    /// Buffer must hold at least one event
    #[error("event buffer capacity must be greater than zero")]
    ZeroBufferCapacity,
}

impl From<ConfigError> for DepthError {
    fn from(err: ConfigError) -> Self {
        DepthError::Configuration(err.to_string())
    }
}

/// Configuration for the sync coordinator and its collaborators
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Where snapshots and diffs come from
    pub endpoint: Endpoint,
    /// Diff stream push interval
    pub speed: UpdateSpeed,
    /// Levels per side in the published view
    pub limit: usize,
    /// Levels per side requested from the snapshot endpoint
    pub snapshot_limit: u32,
    /// How long to wait for the first buffered event before fetching
    pub prefetch_wait: Duration,
    /// Events kept while waiting for a snapshot; the oldest is dropped beyond this
    pub max_buffered_events: usize,
    /// Clear the book when the subscription is dropped
    pub reset_on_unsubscribe: bool,
    /// Snapshot request timeout
    pub request_timeout: Duration,
    /// Stream connect timeout
    pub connect_timeout: Duration,
    /// Stream reconnection policy
    pub reconnect: ReconnectConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            speed: UpdateSpeed::default(),
            limit: 10,
            snapshot_limit: 100,
            prefetch_wait: Duration::from_secs(2),
            max_buffered_events: 1000,
            reset_on_unsubscribe: true,
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Set the stream push interval
    pub fn with_speed(mut self, speed: UpdateSpeed) -> Self {
        self.speed = speed;
        self
    }

    /// Set the display depth
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the snapshot depth
    pub fn with_snapshot_limit(mut self, limit: u32) -> Self {
        self.snapshot_limit = limit;
        self
    }

    /// Set the pre-fetch wait
    pub fn with_prefetch_wait(mut self, wait: Duration) -> Self {
        self.prefetch_wait = wait;
        self
    }

    /// Set the buffer capacity
    pub fn with_max_buffered_events(mut self, max: usize) -> Self {
        self.max_buffered_events = max;
        self
    }

    /// Keep book data after unsubscribing
    pub fn keep_book_on_unsubscribe(mut self) -> Self {
        self.reset_on_unsubscribe = false;
        self
    }

    /// Set the snapshot request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the stream connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the reconnection policy
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Disable stream reconnection
    pub fn without_reconnect(mut self) -> Self {
        self.reconnect = ReconnectConfig::disabled();
        self
    }

    /// Check the settings for values the coordinator cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limit == 0 {
            return Err(ConfigError::ZeroLimit);
        }
        if self.snapshot_limit == 0 {
            return Err(ConfigError::ZeroSnapshotLimit);
        }
        let max = self.endpoint.max_snapshot_limit();
        if self.snapshot_limit > max {
            return Err(ConfigError::SnapshotLimitTooLarge {
                limit: self.snapshot_limit,
                max,
            });
        }
        if self.max_buffered_events == 0 {
            return Err(ConfigError::ZeroBufferCapacity);
        }
        Ok(())
    }
}
