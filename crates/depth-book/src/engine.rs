//! Sequence-checked book engine
//!
//! Owns both sides of the book plus the update-id cursor and decides, for
//! every incoming diff, whether it is applied, stale, or evidence of a gap.
//!
//! # Diff Rules
//!
//! ```text
//! cursor == 0                 -> Gap    (never seeded)
//! pu present && pu != cursor  -> Gap    (does not chain from current state)
//! u <= cursor                 -> Stale  (already covered)
//! U > cursor + 1              -> Gap    (missing updates)
//! U <= cursor + 1 <= u        -> Applied, cursor = u
//! ```
//!
//! The order matters: staleness is checked before contiguity, and `pu`
//! (when the stream provides it) wins over the `U` check.

use crate::{
    ranked::{RankedLevel, Spread, TopLevels},
    storage::TreeBook,
};
use depth_types::{BookSide, DepthSnapshot, DepthUpdate, Level, LevelParseError};

/// Outcome of applying a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    /// Changes were applied and the cursor advanced
    Applied,
    /// Event was already covered by the current state; nothing changed
    Stale,
    /// Event does not continue the current state; nothing changed
    Gap,
}

impl ApplyResult {
    /// True if the caller must resynchronize
    pub fn is_gap(&self) -> bool {
        matches!(self, Self::Gap)
    }
}

/// Orderbook with an update-id cursor
#[derive(Debug, Clone, Default)]
pub struct BookEngine {
    /// Price level storage
    storage: TreeBook,
    /// Last applied update id (0 = never seeded)
    cursor: u64,
}

impl BookEngine {
    /// Create an empty, unseeded engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Last applied update id
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// True once a snapshot has been loaded
    pub fn is_seeded(&self) -> bool {
        self.cursor != 0
    }

    /// Replace the whole book with a REST snapshot
    ///
    /// All levels are parsed before anything is touched; on a parse error the
    /// previous state is left intact.
    pub fn apply_snapshot(&mut self, snapshot: &DepthSnapshot) -> Result<(), LevelParseError> {
        let (bids, asks) = snapshot.parse_levels()?;
        self.load(&bids, &asks, snapshot.last_update_id);
        Ok(())
    }

    /// Replace the whole book with already-parsed levels
    pub fn load(&mut self, bids: &[Level], asks: &[Level], cursor: u64) {
        self.storage.load(bids, asks);
        self.cursor = cursor;
    }

    /// Apply a live diff
    ///
    /// Returns `Err` only for a malformed payload, in which case nothing was
    /// mutated. Sequencing problems are reported through [`ApplyResult`].
    pub fn apply_diff(&mut self, update: &DepthUpdate) -> Result<ApplyResult, LevelParseError> {
        if self.cursor == 0 {
            return Ok(ApplyResult::Gap);
        }

        if let Some(prev) = update.prev_final_update_id {
            if prev != self.cursor {
                return Ok(ApplyResult::Gap);
            }
        }

        self.apply_contiguous(update)
    }

    /// Apply the first event after a snapshot
    ///
    /// Same as [`apply_diff`](Self::apply_diff) without the `pu` check: the
    /// first event of a replay only has to straddle the snapshot id, since its
    /// `pu` links to a stream event the snapshot already covers.
    pub fn apply_bridging(&mut self, update: &DepthUpdate) -> Result<ApplyResult, LevelParseError> {
        if self.cursor == 0 {
            return Ok(ApplyResult::Gap);
        }
        self.apply_contiguous(update)
    }

    fn apply_contiguous(&mut self, update: &DepthUpdate) -> Result<ApplyResult, LevelParseError> {
        if update.final_update_id <= self.cursor {
            return Ok(ApplyResult::Stale);
        }

        let next = self.cursor + 1;
        if update.first_update_id > next {
            return Ok(ApplyResult::Gap);
        }

        let (bids, asks) = update.parse_levels()?;
        for level in bids {
            self.storage.apply(BookSide::Bid, level);
        }
        for level in asks {
            self.storage.apply(BookSide::Ask, level);
        }

        self.cursor = update.final_update_id;
        Ok(ApplyResult::Applied)
    }

    /// Ranked view of the best `limit` levels per side
    pub fn top_levels(&self, limit: usize) -> TopLevels {
        TopLevels {
            bids: RankedLevel::rank(self.storage.bids(), limit),
            asks: RankedLevel::rank(self.storage.asks(), limit),
        }
    }

    /// Spread at the top of book
    pub fn spread(&self) -> Option<Spread> {
        Spread::new(self.storage.best_bid_price()?, self.storage.best_ask_price()?)
    }

    /// Get the best bid
    pub fn best_bid(&self) -> Option<&Level> {
        self.storage.best_bid()
    }

    /// Get the best ask
    pub fn best_ask(&self) -> Option<&Level> {
        self.storage.best_ask()
    }

    /// Number of bid levels
    pub fn bid_count(&self) -> usize {
        self.storage.bid_count()
    }

    /// Number of ask levels
    pub fn ask_count(&self) -> usize {
        self.storage.ask_count()
    }

    /// Read-only access to the level store
    pub fn levels(&self) -> &TreeBook {
        &self.storage
    }

    /// Clear both sides and forget the cursor
    pub fn reset(&mut self) {
        self.storage.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn base_snapshot() -> DepthSnapshot {
        DepthSnapshot::new(100)
            .with_bid("100.0", "2")
            .with_bid("99.5", "1")
            .with_ask("101.0", "1.5")
            .with_ask("102.0", "0.5")
    }

    fn seeded() -> BookEngine {
        let mut book = BookEngine::new();
        book.apply_snapshot(&base_snapshot()).unwrap();
        book
    }

    fn update(first: u64, last: u64) -> DepthUpdate {
        DepthUpdate::new("BTCUSDT", first, last)
    }

    #[test]
    fn test_snapshot_builds_ranked_levels() {
        let mut book = BookEngine::new();
        book.apply_snapshot(
            &DepthSnapshot::new(100)
                .with_bid("100", "2")
                .with_ask("101", "1.5"),
        )
        .unwrap();

        let top = book.top_levels(1);
        let bid = top.bids[0];
        assert_eq!(bid.price, dec!(100));
        assert_eq!(bid.qty, dec!(2));
        assert_eq!(bid.notional, dec!(200));
        assert_eq!(bid.cumulative_notional, dec!(200));

        let ask = top.asks[0];
        assert_eq!(ask.price, dec!(101));
        assert_eq!(ask.qty, dec!(1.5));
        assert_eq!(ask.notional, dec!(151.5));
        assert_eq!(ask.cumulative_notional, dec!(151.5));
    }

    #[test]
    fn test_snapshot_replaces_prior_state() {
        let mut book = seeded();
        book.apply_snapshot(&DepthSnapshot::new(7).with_bid("50", "1"))
            .unwrap();

        assert_eq!(book.cursor(), 7);
        assert_eq!(book.bid_count(), 1);
        assert_eq!(book.ask_count(), 0);
    }

    #[test]
    fn test_malformed_snapshot_leaves_state_intact() {
        let mut book = seeded();
        let bad = DepthSnapshot::new(500)
            .with_bid("1", "1")
            .with_ask("nope", "1");

        assert!(book.apply_snapshot(&bad).is_err());
        assert_eq!(book.cursor(), 100);
        assert_eq!(book.bid_count(), 2);
    }

    #[test]
    fn test_contiguous_diff_applies() {
        let mut book = seeded();
        let diff = update(101, 101).with_bid("100.0", "1.5");

        assert_eq!(book.apply_diff(&diff).unwrap(), ApplyResult::Applied);
        assert_eq!(book.cursor(), 101);
        assert_eq!(book.best_bid().unwrap().qty, dec!(1.5));

        // Same event again is now stale
        assert_eq!(book.apply_diff(&diff).unwrap(), ApplyResult::Stale);
        assert_eq!(book.cursor(), 101);
    }

    #[test]
    fn test_overlapping_diff_applies() {
        let mut book = seeded();
        let diff = update(95, 110).with_ask("101.0", "3");

        assert_eq!(book.apply_diff(&diff).unwrap(), ApplyResult::Applied);
        assert_eq!(book.cursor(), 110);
        assert_eq!(book.best_ask().unwrap().qty, dec!(3));
    }

    #[test]
    fn test_stale_diff_is_ignored() {
        let mut book = seeded();
        for (first, last) in [(80, 80), (90, 100), (100, 100)] {
            let diff = update(first, last).with_bid("100.0", "5");
            assert_eq!(book.apply_diff(&diff).unwrap(), ApplyResult::Stale);
        }
        assert_eq!(book.cursor(), 100);
        assert_eq!(book.best_bid().unwrap().qty, dec!(2));
    }

    #[test]
    fn test_gap_leaves_state_untouched() {
        let mut book = seeded();
        book.apply_diff(&update(101, 101)).unwrap();

        let diff = update(200, 205).with_bid("100.0", "9");
        assert_eq!(book.apply_diff(&diff).unwrap(), ApplyResult::Gap);
        assert_eq!(book.cursor(), 101);
        assert_eq!(book.best_bid().unwrap().qty, dec!(2));
    }

    #[test]
    fn test_unseeded_book_reports_gap() {
        let mut book = BookEngine::new();
        assert_eq!(book.apply_diff(&update(1, 1)).unwrap(), ApplyResult::Gap);
        assert!(!book.is_seeded());
    }

    #[test]
    fn test_prev_id_mismatch_is_gap_even_if_stale() {
        let mut book = seeded();
        // Would be stale by `u`, but `pu` is checked first
        let diff = update(90, 95).with_prev(42);
        assert_eq!(book.apply_diff(&diff).unwrap(), ApplyResult::Gap);

        // Contiguous by `U`, but `pu` does not chain
        let diff = update(101, 105).with_prev(99);
        assert_eq!(book.apply_diff(&diff).unwrap(), ApplyResult::Gap);
        assert_eq!(book.cursor(), 100);
    }

    #[test]
    fn test_prev_id_match_still_needs_contiguous_first_id() {
        let mut book = seeded();
        let diff = update(101, 120).with_prev(100).with_bid("99.0", "1");
        assert_eq!(book.apply_diff(&diff).unwrap(), ApplyResult::Applied);
        assert_eq!(book.cursor(), 120);

        let next = update(130, 140).with_prev(120);
        assert_eq!(book.apply_diff(&next).unwrap(), ApplyResult::Gap);
    }

    #[test]
    fn test_bridging_ignores_prev_id() {
        let mut book = seeded();
        let first = update(95, 105).with_prev(94).with_bid("98", "1");

        assert_eq!(book.apply_diff(&first).unwrap(), ApplyResult::Gap);
        assert_eq!(book.apply_bridging(&first).unwrap(), ApplyResult::Applied);
        assert_eq!(book.cursor(), 105);

        // Gap rule still holds
        let far = update(200, 210);
        assert_eq!(book.apply_bridging(&far).unwrap(), ApplyResult::Gap);
    }

    #[test]
    fn test_zero_qty_removes_level() {
        let mut book = seeded();
        let diff = update(101, 101).with_bid("100.0", "0");
        assert_eq!(book.apply_diff(&diff).unwrap(), ApplyResult::Applied);

        let top = book.top_levels(2);
        assert!(top.bids.iter().all(|l| l.price != dec!(100)));
        assert_eq!(book.bid_count(), 1);
    }

    #[test]
    fn test_zero_qty_for_missing_price_is_noop() {
        let mut book = seeded();
        let diff = update(101, 101).with_ask("150", "0");
        assert_eq!(book.apply_diff(&diff).unwrap(), ApplyResult::Applied);
        assert_eq!(book.ask_count(), 2);
        assert_eq!(book.cursor(), 101);
    }

    #[test]
    fn test_malformed_diff_is_all_or_nothing() {
        let mut book = seeded();
        let diff = update(101, 101)
            .with_bid("100.0", "7")
            .with_ask("101.0", "NaN?");

        assert!(book.apply_diff(&diff).is_err());
        assert_eq!(book.cursor(), 100);
        assert_eq!(book.best_bid().unwrap().qty, dec!(2));
    }

    #[test]
    fn test_top_levels_smaller_than_limit() {
        let book = seeded();
        let top = book.top_levels(50);
        assert_eq!(top.bids.len(), 2);
        assert_eq!(top.asks.len(), 2);
        assert_eq!(top.bids[0].price, dec!(100));
        assert_eq!(top.asks[0].price, dec!(101));
        assert!(top.bids[1].cumulative_notional >= top.bids[0].cumulative_notional);
        assert!(top.asks[1].cumulative_notional >= top.asks[0].cumulative_notional);
    }

    #[test]
    fn test_top_levels_does_not_mutate() {
        let book = seeded();
        let _ = book.top_levels(1);
        assert_eq!(book.cursor(), 100);
        assert_eq!(book.bid_count(), 2);
    }

    #[test]
    fn test_spread() {
        let book = seeded();
        let spread = book.spread().unwrap();
        assert_eq!(spread.absolute, dec!(1));
        assert_eq!(spread.mid, dec!(100.5));
        assert!(BookEngine::new().spread().is_none());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut book = seeded();
        book.reset();
        book.reset();
        assert_eq!(book.cursor(), 0);
        assert_eq!(book.bid_count(), 0);
        assert_eq!(book.ask_count(), 0);
        assert_eq!(book.top_levels(10), TopLevels::default());
    }

    #[test]
    fn test_load_skips_zero_qty() {
        let mut book = BookEngine::new();
        book.load(
            &[Level::new(dec!(10), Decimal::ZERO)],
            &[Level::new(dec!(11), dec!(1))],
            9,
        );
        assert_eq!(book.bid_count(), 0);
        assert_eq!(book.ask_count(), 1);
        assert_eq!(book.cursor(), 9);
    }
}
