//! Binance REST and stream endpoints

use depth_types::{Symbol, UpdateSpeed};
use std::fmt;

/// Environment variable overriding the REST base URL
pub const REST_URL_ENV: &str = "DEPTH_REST_URL";
/// Environment variable overriding the stream base URL
pub const WS_URL_ENV: &str = "DEPTH_WS_URL";

/// Where snapshots are fetched from and diffs are streamed from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Endpoint {
    /// Spot market data (default)
    #[default]
    Spot,
    /// Spot testnet
    Testnet,
    /// USD-M futures market data (`pu`-linked diff stream)
    ///
    /// Live diffs must satisfy both the `pu` link and `U <= cursor + 1`.
    /// Futures events are chained by `pu` only and their `U` may skip ahead
    /// of the previous `u + 1`; such an event is treated as a gap and costs a
    /// full resync.
    UsdmFutures,
    /// Custom base URLs using the spot REST layout
    Custom {
        /// REST base, e.g. `http://localhost:8080`
        rest: String,
        /// Raw stream base, e.g. `ws://localhost:8080/ws`
        ws: String,
    },
}

impl Endpoint {
    /// Endpoint from `DEPTH_REST_URL` / `DEPTH_WS_URL`, falling back to spot
    pub fn from_env() -> Self {
        Self::with_overrides(
            std::env::var(REST_URL_ENV).ok(),
            std::env::var(WS_URL_ENV).ok(),
        )
    }

    /// Spot endpoint with optionally overridden base URLs
    pub fn with_overrides(rest: Option<String>, ws: Option<String>) -> Self {
        let rest = rest.filter(|s| !s.trim().is_empty());
        let ws = ws.filter(|s| !s.trim().is_empty());

        if rest.is_none() && ws.is_none() {
            return Self::Spot;
        }

        Self::Custom {
            rest: rest.unwrap_or_else(|| Self::Spot.rest_base().to_string()),
            ws: ws.unwrap_or_else(|| Self::Spot.ws_base().to_string()),
        }
    }

    /// REST base URL
    pub fn rest_base(&self) -> &str {
        match self {
            Self::Spot => "https://api.binance.com",
            Self::Testnet => "https://testnet.binance.vision",
            Self::UsdmFutures => "https://fapi.binance.com",
            Self::Custom { rest, .. } => rest.trim_end_matches('/'),
        }
    }

    /// Raw stream base URL
    pub fn ws_base(&self) -> &str {
        match self {
            Self::Spot => "wss://stream.binance.com:9443/ws",
            Self::Testnet => "wss://testnet.binance.vision/ws",
            Self::UsdmFutures => "wss://fstream.binance.com/ws",
            Self::Custom { ws, .. } => ws.trim_end_matches('/'),
        }
    }

    /// Path of the depth snapshot resource
    pub fn depth_path(&self) -> &'static str {
        match self {
            Self::UsdmFutures => "/fapi/v1/depth",
            _ => "/api/v3/depth",
        }
    }

    /// Largest `limit` the depth resource accepts
    pub fn max_snapshot_limit(&self) -> u32 {
        match self {
            Self::UsdmFutures => 1000,
            _ => 5000,
        }
    }

    /// Full URL of the depth snapshot resource (without query)
    pub fn depth_url(&self) -> String {
        format!("{}{}", self.rest_base(), self.depth_path())
    }

    /// Stream URL for a symbol's diff depth stream
    pub fn stream_url(&self, symbol: &Symbol, speed: UpdateSpeed) -> String {
        let name = format!("{}@depth", symbol.stream_name());
        match speed {
            // 1000ms is the stream default and has no suffix on futures
            UpdateSpeed::Ms1000 if matches!(self, Self::UsdmFutures) => {
                format!("{}/{}", self.ws_base(), name)
            }
            _ => format!("{}/{}@{}", self.ws_base(), name, speed.as_str()),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.rest_base(), self.ws_base())
    }
}
