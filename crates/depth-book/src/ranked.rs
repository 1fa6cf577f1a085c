//! Ranked, depth-accumulated projection of a book
//!
//! Nothing here is stored; every value is computed from the level store on
//! read.

use depth_types::Level;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price level annotated with its notional and running depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedLevel {
    /// Price of this level
    pub price: Decimal,
    /// Quantity at this level
    pub qty: Decimal,
    /// price * qty
    pub notional: Decimal,
    /// Sum of notionals from the best price out to this level (inclusive)
    pub cumulative_notional: Decimal,
}

impl RankedLevel {
    /// Rank levels that are already in best-first order
    ///
    /// Takes at most `limit` levels and accumulates notional from the first
    /// one outward.
    pub fn rank<'a>(levels: impl IntoIterator<Item = &'a Level>, limit: usize) -> Vec<Self> {
        let mut cumulative = Decimal::ZERO;
        levels
            .into_iter()
            .take(limit)
            .map(|level| {
                let notional = level.notional();
                cumulative += notional;
                Self {
                    price: level.price,
                    qty: level.qty,
                    notional,
                    cumulative_notional: cumulative,
                }
            })
            .collect()
    }
}

/// Top of book for both sides, best price first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopLevels {
    /// Bids, highest price first
    pub bids: Vec<RankedLevel>,
    /// Asks, lowest price first
    pub asks: Vec<RankedLevel>,
}

impl TopLevels {
    /// Best bid, if any
    pub fn best_bid(&self) -> Option<&RankedLevel> {
        self.bids.first()
    }

    /// Best ask, if any
    pub fn best_ask(&self) -> Option<&RankedLevel> {
        self.asks.first()
    }

    /// Spread between the best bid and best ask
    ///
    /// `None` when either side is empty or the book is crossed.
    pub fn spread(&self) -> Option<Spread> {
        Spread::new(self.best_bid()?.price, self.best_ask()?.price)
    }

    /// Total notional shown on the bid side
    pub fn bid_depth(&self) -> Decimal {
        self.bids
            .last()
            .map(|l| l.cumulative_notional)
            .unwrap_or(Decimal::ZERO)
    }

    /// Total notional shown on the ask side
    pub fn ask_depth(&self) -> Decimal {
        self.asks
            .last()
            .map(|l| l.cumulative_notional)
            .unwrap_or(Decimal::ZERO)
    }

    /// True when neither side has levels
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// Spread information derived from the best bid and ask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spread {
    /// Absolute spread (ask - bid)
    pub absolute: Decimal,
    /// Spread as percentage of mid price
    pub percentage: Decimal,
    /// Mid price
    pub mid: Decimal,
    /// Best bid price
    pub bid: Decimal,
    /// Best ask price
    pub ask: Decimal,
}

impl Spread {
    /// Compute the spread for a bid/ask pair
    ///
    /// Returns `None` for a crossed book (ask below bid); it is treated as a
    /// transient anomaly rather than surfaced.
    pub fn new(bid: Decimal, ask: Decimal) -> Option<Self> {
        let absolute = ask - bid;
        if absolute.is_sign_negative() && !absolute.is_zero() {
            return None;
        }

        let mid = (bid + ask) / Decimal::TWO;
        let percentage = if mid.is_zero() {
            Decimal::ZERO
        } else {
            absolute / mid * Decimal::ONE_HUNDRED
        };

        Some(Self {
            absolute,
            percentage,
            mid,
            bid,
            ask,
        })
    }
}

impl std::fmt::Display for Spread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({:.4}%) [{} / {}]",
            self.absolute, self.percentage, self.bid, self.ask
        )
    }
}
