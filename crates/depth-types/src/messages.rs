//! Wire messages for the Binance depth API
//!
//! - [`DepthUpdate`]: one batch from the `<symbol>@depth` diff stream
//! - [`DepthSnapshot`]: the body of `GET /api/v3/depth` (or `/fapi/v1/depth`)

use crate::{Level, LevelParseError, RawLevel};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Stream Types
// ============================================================================

/// Diff depth event
///
/// Represents every change within a single upstream update batch, covering
/// update ids `first_update_id..=final_update_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthUpdate {
    /// Event type, always "depthUpdate"
    #[serde(rename = "e", default = "default_event_type")]
    pub event_type: String,
    /// Event time in milliseconds since the epoch
    #[serde(rename = "E", default)]
    pub event_time: u64,
    /// Instrument symbol
    #[serde(rename = "s")]
    pub symbol: String,
    /// First update id in this event (`U`)
    #[serde(rename = "U")]
    pub first_update_id: u64,
    /// Final update id in this event (`u`)
    #[serde(rename = "u")]
    pub final_update_id: u64,
    /// Final update id of the previous event (`pu`, futures streams only)
    #[serde(rename = "pu", default, skip_serializing_if = "Option::is_none")]
    pub prev_final_update_id: Option<u64>,
    /// Bid changes; a zero quantity removes the level
    #[serde(rename = "b", default)]
    pub bids: Vec<RawLevel>,
    /// Ask changes; a zero quantity removes the level
    #[serde(rename = "a", default)]
    pub asks: Vec<RawLevel>,
}

fn default_event_type() -> String {
    DepthUpdate::EVENT_TYPE.to_string()
}

/// Combined-stream envelope (`/stream?streams=...`)
#[derive(Debug, Deserialize)]
struct StreamEnvelope {
    #[allow(dead_code)]
    stream: String,
    data: DepthUpdate,
}

impl DepthUpdate {
    /// Value of the `e` field for diff depth events
    pub const EVENT_TYPE: &'static str = "depthUpdate";

    /// Create an update covering `first..=last` with no level changes
    pub fn new(symbol: impl Into<String>, first_update_id: u64, final_update_id: u64) -> Self {
        Self {
            event_type: default_event_type(),
            event_time: 0,
            symbol: symbol.into(),
            first_update_id,
            final_update_id,
            prev_final_update_id: None,
            bids: Vec::new(),
            asks: Vec::new(),
        }
    }

    /// Set the previous final update id (`pu`)
    pub fn with_prev(mut self, prev_final_update_id: u64) -> Self {
        self.prev_final_update_id = Some(prev_final_update_id);
        self
    }

    /// Add a bid change
    pub fn with_bid(mut self, price: impl Into<String>, qty: impl Into<String>) -> Self {
        self.bids.push((price.into(), qty.into()));
        self
    }

    /// Add an ask change
    pub fn with_ask(mut self, price: impl Into<String>, qty: impl Into<String>) -> Self {
        self.asks.push((price.into(), qty.into()));
        self
    }

    /// Parse a raw text frame from the stream
    ///
    /// Accepts both the raw event and the combined-stream envelope.
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(json)?;

        if value.get("stream").is_some() && value.get("data").is_some() {
            let envelope: StreamEnvelope = serde_json::from_value(value)?;
            return Ok(envelope.data);
        }

        serde_json::from_value(value)
    }

    /// Parse the bid and ask changes
    ///
    /// Fails as a whole if any entry is malformed, so callers can apply the
    /// result without risk of a partial update.
    pub fn parse_levels(&self) -> Result<(Vec<Level>, Vec<Level>), LevelParseError> {
        Ok((Level::parse_all(&self.bids)?, Level::parse_all(&self.asks)?))
    }

    /// Event time as a UTC timestamp
    pub fn event_timestamp(&self) -> Option<DateTime<Utc>> {
        let millis = i64::try_from(self.event_time).ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }

    /// Number of level changes carried by this event
    pub fn change_count(&self) -> usize {
        self.bids.len() + self.asks.len()
    }
}

// ============================================================================
// REST Types
// ============================================================================

/// Orderbook snapshot from the REST depth endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    /// Update id the snapshot is consistent with
    #[serde(rename = "lastUpdateId")]
    pub last_update_id: u64,
    /// Bid levels, best first
    pub bids: Vec<RawLevel>,
    /// Ask levels, best first
    pub asks: Vec<RawLevel>,
}

impl DepthSnapshot {
    /// Create an empty snapshot at the given update id
    pub fn new(last_update_id: u64) -> Self {
        Self {
            last_update_id,
            bids: Vec::new(),
            asks: Vec::new(),
        }
    }

    /// Add a bid level
    pub fn with_bid(mut self, price: impl Into<String>, qty: impl Into<String>) -> Self {
        self.bids.push((price.into(), qty.into()));
        self
    }

    /// Add an ask level
    pub fn with_ask(mut self, price: impl Into<String>, qty: impl Into<String>) -> Self {
        self.asks.push((price.into(), qty.into()));
        self
    }

    /// Parse a REST response body
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Parse the bid and ask levels, failing as a whole on any bad entry
    pub fn parse_levels(&self) -> Result<(Vec<Level>, Vec<Level>), LevelParseError> {
        Ok((Level::parse_all(&self.bids)?, Level::parse_all(&self.asks)?))
    }
}
