//! BTreeMap-based orderbook storage
//!
//! Provides O(log N) operations for orderbook management.
//! Uses `Reverse<Decimal>` for bids to maintain descending order.

use depth_types::{BookSide, Level};
use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Orderbook storage using BTreeMap for O(log N) operations
///
/// - Bids: Stored with `Reverse<Decimal>` key for descending order (highest first)
/// - Asks: Stored with `Decimal` key for ascending order (lowest first)
///
/// A level with zero quantity is never stored.
#[derive(Debug, Clone, Default)]
pub struct TreeBook {
    /// Bids: highest price first (use Reverse for descending order)
    bids: BTreeMap<Reverse<Decimal>, Level>,
    /// Asks: lowest price first (natural ascending order)
    asks: BTreeMap<Decimal, Level>,
}

impl TreeBook {
    /// Create a new empty orderbook
    pub fn new() -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        }
    }

    /// Apply a level change to one side
    /// If qty is zero, the level is removed
    pub fn apply(&mut self, side: BookSide, level: Level) {
        match side {
            BookSide::Bid => self.insert_bid(level.price, level.qty),
            BookSide::Ask => self.insert_ask(level.price, level.qty),
        }
    }

    /// Insert or update a bid level
    /// If qty is zero, the level is removed
    pub fn insert_bid(&mut self, price: Decimal, qty: Decimal) {
        if qty.is_zero() {
            self.bids.remove(&Reverse(price));
        } else {
            self.bids.insert(Reverse(price), Level::new(price, qty));
        }
    }

    /// Insert or update an ask level
    /// If qty is zero, the level is removed
    pub fn insert_ask(&mut self, price: Decimal, qty: Decimal) {
        if qty.is_zero() {
            self.asks.remove(&price);
        } else {
            self.asks.insert(price, Level::new(price, qty));
        }
    }

    /// Replace the whole book with the given levels
    pub fn load(&mut self, bids: &[Level], asks: &[Level]) {
        self.clear();
        for level in bids {
            self.insert_bid(level.price, level.qty);
        }
        for level in asks {
            self.insert_ask(level.price, level.qty);
        }
    }

    /// Quantity resting at a price, if any
    pub fn qty_at(&self, side: BookSide, price: Decimal) -> Option<Decimal> {
        match side {
            BookSide::Bid => self.bids.get(&Reverse(price)).map(|l| l.qty),
            BookSide::Ask => self.asks.get(&price).map(|l| l.qty),
        }
    }

    /// Get the best bid (highest price)
    pub fn best_bid(&self) -> Option<&Level> {
        self.bids.values().next()
    }

    /// Get the best ask (lowest price)
    pub fn best_ask(&self) -> Option<&Level> {
        self.asks.values().next()
    }

    /// Get the best bid price
    pub fn best_bid_price(&self) -> Option<Decimal> {
        self.best_bid().map(|l| l.price)
    }

    /// Get the best ask price
    pub fn best_ask_price(&self) -> Option<Decimal> {
        self.best_ask().map(|l| l.price)
    }

    /// Iterator over bids (highest to lowest price)
    pub fn bids(&self) -> impl Iterator<Item = &Level> {
        self.bids.values()
    }

    /// Iterator over asks (lowest to highest price)
    pub fn asks(&self) -> impl Iterator<Item = &Level> {
        self.asks.values()
    }

    /// Number of bid levels
    pub fn bid_count(&self) -> usize {
        self.bids.len()
    }

    /// Number of ask levels
    pub fn ask_count(&self) -> usize {
        self.asks.len()
    }

    /// Clear all levels
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_bid_order() {
        let mut book = TreeBook::new();
        book.insert_bid(dec!(100), dec!(1));
        book.insert_bid(dec!(101), dec!(2));
        book.insert_bid(dec!(99), dec!(3));

        let bids: Vec<_> = book.bids().collect();
        assert_eq!(bids.len(), 3);
        assert_eq!(bids[0].price, dec!(101));
        assert_eq!(bids[1].price, dec!(100));
        assert_eq!(bids[2].price, dec!(99));
    }

    #[test]
    fn test_ask_order() {
        let mut book = TreeBook::new();
        book.insert_ask(dec!(100), dec!(1));
        book.insert_ask(dec!(101), dec!(2));
        book.insert_ask(dec!(99), dec!(3));

        let asks: Vec<_> = book.asks().collect();
        assert_eq!(asks.len(), 3);
        assert_eq!(asks[0].price, dec!(99));
        assert_eq!(asks[1].price, dec!(100));
        assert_eq!(asks[2].price, dec!(101));
    }

    #[test]
    fn test_zero_qty_removes_level() {
        let mut book = TreeBook::new();
        book.apply(BookSide::Bid, Level::new(dec!(100), dec!(1)));
        assert_eq!(book.bid_count(), 1);

        book.apply(BookSide::Bid, Level::new(dec!(100), dec!(0)));
        assert_eq!(book.bid_count(), 0);
    }

    #[test]
    fn test_zero_qty_for_missing_price_is_noop() {
        let mut book = TreeBook::new();
        book.insert_ask(dec!(101), dec!(1));
        book.insert_ask(dec!(105), dec!(0));
        assert_eq!(book.ask_count(), 1);
        assert_eq!(book.qty_at(BookSide::Ask, dec!(101)), Some(dec!(1)));
    }

    #[test]
    fn test_scale_does_not_split_levels() {
        // "100.0" and "100.00" are the same price
        let mut book = TreeBook::new();
        book.insert_bid(dec!(100.0), dec!(1));
        book.insert_bid(dec!(100.00), dec!(3));
        assert_eq!(book.bid_count(), 1);
        assert_eq!(book.qty_at(BookSide::Bid, dec!(100)), Some(dec!(3)));
    }

    #[test]
    fn test_load_replaces_everything() {
        let mut book = TreeBook::new();
        book.insert_bid(dec!(1), dec!(1));
        book.insert_ask(dec!(2), dec!(1));

        book.load(
            &[Level::new(dec!(99), dec!(1)), Level::new(dec!(98), dec!(0))],
            &[Level::new(dec!(101), dec!(2))],
        );

        assert_eq!(book.bid_count(), 1);
        assert_eq!(book.ask_count(), 1);
        assert_eq!(book.best_bid_price(), Some(dec!(99)));
        assert_eq!(book.best_ask_price(), Some(dec!(101)));
    }
}
