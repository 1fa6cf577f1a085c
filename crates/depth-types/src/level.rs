//! Price level types with decimal precision

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A price level as delivered on the wire: `["price", "qty"]`
///
/// Binance sends numeric strings to avoid floating-point ambiguity; they are
/// parsed into [`Level`] only when a book applies them.
pub type RawLevel = (String, String);

/// A single price level in the orderbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Level {
    /// Price of this level
    pub price: Decimal,
    /// Quantity at this price level
    pub qty: Decimal,
}

impl Level {
    /// Create a new price level
    pub fn new(price: Decimal, qty: Decimal) -> Self {
        Self { price, qty }
    }

    /// Parse a level from its wire strings
    ///
    /// Rejects anything that is not a plain decimal, as well as negative
    /// prices or quantities.
    pub fn parse(price: &str, qty: &str) -> Result<Self, LevelParseError> {
        Ok(Self {
            price: parse_component(price)?,
            qty: parse_component(qty)?,
        })
    }

    /// Parse a wire level
    pub fn from_raw(raw: &RawLevel) -> Result<Self, LevelParseError> {
        Self::parse(&raw.0, &raw.1)
    }

    /// Parse a full list of wire levels, failing on the first bad entry
    pub fn parse_all(raw: &[RawLevel]) -> Result<Vec<Self>, LevelParseError> {
        raw.iter().map(Self::from_raw).collect()
    }

    /// Notional value at this level (price * qty)
    pub fn notional(&self) -> Decimal {
        self.price * self.qty
    }

    /// Check if this level has zero quantity (should be removed)
    pub fn is_zero(&self) -> bool {
        self.qty.is_zero()
    }

    /// Get price as f64 (for display)
    pub fn price_f64(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        self.price.to_f64().unwrap_or(0.0)
    }

    /// Get quantity as f64 (for display)
    pub fn qty_f64(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        self.qty.to_f64().unwrap_or(0.0)
    }
}

fn parse_component(value: &str) -> Result<Decimal, LevelParseError> {
    let parsed = Decimal::from_str(value.trim()).map_err(|e| LevelParseError {
        value: value.to_string(),
        reason: e.to_string(),
    })?;

    if parsed.is_sign_negative() && !parsed.is_zero() {
        return Err(LevelParseError {
            value: value.to_string(),
            reason: "negative value".to_string(),
        });
    }

    Ok(parsed)
}

/// A price or quantity string that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed level value {value:?}: {reason}")]
pub struct LevelParseError {
    /// The offending wire string
    pub value: String,
    /// Why it was rejected
    pub reason: String,
}
