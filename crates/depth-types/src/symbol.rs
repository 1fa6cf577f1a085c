//! Instrument symbols (BTCUSDT format)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Instrument symbol as used by the REST API (upper case, no separator)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// BTC/USDT spot pair
    pub const BTC_USDT: &'static str = "BTCUSDT";
    /// ETH/USDT spot pair
    pub const ETH_USDT: &'static str = "ETHUSDT";
    /// SOL/USDT spot pair
    pub const SOL_USDT: &'static str = "SOLUSDT";

    /// Create a new symbol, normalizing to upper case
    ///
    /// Does not validate; use [`str::parse`] for untrusted input.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().to_ascii_uppercase())
    }

    /// Get the symbol as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-case form used in stream names (e.g., `btcusdt@depth`)
    pub fn stream_name(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    /// Check whether a symbol field from the wire refers to this instrument
    pub fn matches(&self, wire: &str) -> bool {
        self.0.eq_ignore_ascii_case(wire)
    }
}

impl FromStr for Symbol {
    type Err = SymbolParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(SymbolParseError::Empty);
        }

        if let Some(bad) = trimmed.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(SymbolParseError::InvalidCharacter {
                symbol: s.to_string(),
                character: bad,
            });
        }

        Ok(Self::new(trimmed))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Error parsing a symbol
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolParseError {
    #[error("symbol is empty")]
    Empty,

    #[error("symbol {symbol:?} contains invalid character {character:?}")]
    InvalidCharacter { symbol: String, character: char },
}
