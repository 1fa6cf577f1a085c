//! Orderbook engine for Binance-style snapshot + diff depth feeds
//!
//! This crate provides the price level storage, the sequence-checked
//! [`BookEngine`] and the ranked, depth-accumulated projection consumed by
//! presentation code. It is synchronous and does no I/O.
//!
//! # Example
//!
//! ```
//! use depth_book::{ApplyResult, BookEngine};
//! use depth_types::{DepthSnapshot, DepthUpdate};
//!
//! let mut book = BookEngine::new();
//! book.apply_snapshot(
//!     &DepthSnapshot::new(100)
//!         .with_bid("100.0", "2")
//!         .with_ask("101.0", "1.5"),
//! )
//! .unwrap();
//!
//! let update = DepthUpdate::new("BTCUSDT", 101, 101).with_bid("100.0", "1.5");
//! assert_eq!(book.apply_diff(&update).unwrap(), ApplyResult::Applied);
//! assert_eq!(book.cursor(), 101);
//! ```

pub mod engine;
pub mod ranked;
pub mod storage;

// Re-export main types
pub use engine::{ApplyResult, BookEngine};
pub use ranked::{RankedLevel, Spread, TopLevels};
pub use storage::TreeBook;
