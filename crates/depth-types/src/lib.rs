//! Shared types for Binance depth synchronization
//!
//! This crate provides the wire and data model used across the workspace.
//! It has minimal dependencies and can be used independently.
//!
//! # Key Types
//!
//! - [`Symbol`] - Instrument symbols (e.g., "BTCUSDT")
//! - [`Level`] - Orderbook price level with decimal precision
//! - [`DepthUpdate`] - Incremental diff event from the depth stream
//! - [`DepthSnapshot`] - Point-in-time book from the REST depth endpoint
//! - [`BookSide`], [`UpdateSpeed`] - Enums
//! - [`DepthError`] - Error types

pub mod enums;
pub mod error;
pub mod level;
pub mod messages;
pub mod symbol;

// Re-export commonly used types
pub use enums::*;
pub use error::*;
pub use level::*;
pub use messages::*;
pub use symbol::*;

// Re-export rust_decimal for users
pub use rust_decimal::Decimal;
