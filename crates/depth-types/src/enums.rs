//! Book side and stream speed enums

use serde::{Deserialize, Serialize};
use std::fmt;

/// Half of an orderbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    /// Buy side, best price is the highest
    Bid,
    /// Sell side, best price is the lowest
    Ask,
}

impl BookSide {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Self::Bid => Self::Ask,
            Self::Ask => Self::Bid,
        }
    }

    /// Returns the side name as used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bid => "bid",
            Self::Ask => "ask",
        }
    }
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Push interval of the diff depth stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum UpdateSpeed {
    /// One batch every 100ms
    #[serde(rename = "100ms")]
    Ms100,
    /// One batch every second
    #[serde(rename = "1000ms")]
    #[default]
    Ms1000,
}

impl UpdateSpeed {
    /// Stream name suffix (e.g., `100ms`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ms100 => "100ms",
            Self::Ms1000 => "1000ms",
        }
    }

    /// Push interval in milliseconds
    pub fn as_millis(&self) -> u64 {
        match self {
            Self::Ms100 => 100,
            Self::Ms1000 => 1000,
        }
    }
}

impl fmt::Display for UpdateSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
