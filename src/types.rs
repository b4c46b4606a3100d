//! Core market data types shared across the pipeline

use serde::{Deserialize, Serialize};

/// Aggressor side of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// A single print from the trade tape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeTick {
    pub price: f64,
    pub size: f64,
    pub side: Side,
}

/// Aggregated volume observed since the previous snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    pub total_size: f64,
    pub buy_size: f64,
    pub sell_size: f64,
    #[serde(default)]
    pub recent_trades: Vec<TradeTick>,
}

/// One resting order-book level
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub size: f64,
}

/// Top-of-book plus aggregate depth at snapshot time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBook {
    pub top_bid: BookLevel,
    pub top_ask: BookLevel,
    pub buy_depth: f64,
    pub sell_depth: f64,
    pub spread: f64,
    #[serde(default)]
    pub changes: Vec<serde_json::Value>,
}

/// One timestamped observation of price, tape, and book state.
///
/// Immutable once ingested; the window store owns the full history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Monotonic milliseconds
    pub timestamp: u64,
    pub price: f64,
    pub volume: VolumeInfo,
    pub order_book: OrderBook,
    /// Opaque pass-through from the observation layer
    #[serde(default)]
    pub market_stats: serde_json::Value,
}

impl Snapshot {
    /// Minimal snapshot for tests and synthetic feeds
    pub fn simple(timestamp: u64, price: f64) -> Self {
        Self {
            timestamp,
            price,
            volume: VolumeInfo::default(),
            order_book: OrderBook::default(),
            market_stats: serde_json::Value::Null,
        }
    }
}

/// Rolling-window horizons and candle cadences.
///
/// All eight are valid snapshot-window horizons; the five in
/// [`Timeframe::CANDLE_CADENCES`] additionally drive candle aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1s")]
    S1,
    #[serde(rename = "5s")]
    S5,
    #[serde(rename = "15s")]
    S15,
    #[serde(rename = "30s")]
    S30,
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
}

impl Timeframe {
    /// Every window horizon served by the snapshot store
    pub const ALL: [Timeframe; 8] = [
        Timeframe::S1,
        Timeframe::S5,
        Timeframe::S15,
        Timeframe::S30,
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
    ];

    /// Subset aggregated into candles
    pub const CANDLE_CADENCES: [Timeframe; 5] = [
        Timeframe::S1,
        Timeframe::S5,
        Timeframe::S15,
        Timeframe::M1,
        Timeframe::M5,
    ];

    pub fn duration_ms(&self) -> u64 {
        match self {
            Timeframe::S1 => 1_000,
            Timeframe::S5 => 5_000,
            Timeframe::S15 => 15_000,
            Timeframe::S30 => 30_000,
            Timeframe::M1 => 60_000,
            Timeframe::M3 => 180_000,
            Timeframe::M5 => 300_000,
            Timeframe::M15 => 900_000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::S1 => "1s",
            Timeframe::S5 => "5s",
            Timeframe::S15 => "15s",
            Timeframe::S30 => "30s",
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
