//! Order-flow indicators
//!
//! Momentum, volatility, and book-imbalance metrics computed directly from a
//! snapshot window. Pure function of the window; every division is guarded so
//! no non-finite value leaves this module.

use serde::{Deserialize, Serialize};

use super::{mean, stddev};
use crate::types::{Snapshot, Timeframe};

/// Per-timeframe order-flow metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFlowIndicators {
    pub timeframe: Timeframe,
    /// Percent change first -> last
    pub price_change: f64,
    /// Price units per second
    pub price_momentum: f64,
    pub price_volatility: f64,
    pub avg_volume: f64,
    pub volume_delta: f64,
    /// Buy share of total volume, percent
    pub volume_imbalance: f64,
    pub max_trade_size: f64,
    /// Share of tape prints larger than the window's average volume, percent
    pub aggressive_volume_ratio: f64,
    /// Avg buy depth / avg sell depth; 0 when sell depth is 0
    pub depth_imbalance: f64,
    pub spread_avg: f64,
    pub order_flow_pressure: f64,
    pub ob_volatility: f64,
    pub wall_detection_score: f64,
    /// OLS slope of price against sample index
    pub slope: f64,
    /// Discrete second derivative of price, normalized by n^2
    pub acceleration: f64,
    /// 1 when book imbalance and momentum diverge
    pub early_reversal: u8,
}

impl OrderFlowIndicators {
    fn zeroed(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            price_change: 0.0,
            price_momentum: 0.0,
            price_volatility: 0.0,
            avg_volume: 0.0,
            volume_delta: 0.0,
            volume_imbalance: 0.0,
            max_trade_size: 0.0,
            aggressive_volume_ratio: 0.0,
            depth_imbalance: 0.0,
            spread_avg: 0.0,
            order_flow_pressure: 0.0,
            ob_volatility: 0.0,
            wall_detection_score: 0.0,
            slope: 0.0,
            acceleration: 0.0,
            early_reversal: 0,
        }
    }
}

/// Ordinary-least-squares slope of `values` against their index
fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let mean_x = (n - 1) as f64 / 2.0;
    let mean_y = mean(values);

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }

    if den != 0.0 {
        num / den
    } else {
        0.0
    }
}

/// Compute order-flow indicators for one timeframe window.
/// A window shorter than 2 snapshots yields a zeroed result.
pub fn compute(timeframe: Timeframe, snaps: &[Snapshot]) -> OrderFlowIndicators {
    let n = snaps.len();
    if n < 2 {
        return OrderFlowIndicators::zeroed(timeframe);
    }

    let first = &snaps[0];
    let last = &snaps[n - 1];
    let delta_t = (last.timestamp.saturating_sub(first.timestamp)) as f64 / 1000.0;

    let prices: Vec<f64> = snaps.iter().map(|s| s.price).collect();
    let price_change = (last.price - first.price) / first.price * 100.0;
    let price_momentum = if delta_t != 0.0 {
        (last.price - first.price) / delta_t
    } else {
        0.0
    };
    let price_volatility = stddev(&prices);

    let avg_volume = snaps.iter().map(|s| s.volume.total_size).sum::<f64>() / n as f64;
    let total_buy: f64 = snaps.iter().map(|s| s.volume.buy_size).sum();
    let total_sell: f64 = snaps.iter().map(|s| s.volume.sell_size).sum();
    let volume_delta = total_buy - total_sell;
    let volume_imbalance = if total_buy + total_sell > 0.0 {
        total_buy / (total_buy + total_sell) * 100.0
    } else {
        0.0
    };

    let trade_sizes: Vec<f64> = snaps
        .iter()
        .flat_map(|s| s.volume.recent_trades.iter().map(|t| t.size))
        .collect();
    let max_trade_size = trade_sizes.iter().copied().fold(0.0, f64::max);
    let aggressive_volume_ratio = if !trade_sizes.is_empty() {
        let large = trade_sizes.iter().filter(|&&sz| sz > avg_volume).count();
        large as f64 / trade_sizes.len() as f64 * 100.0
    } else {
        0.0
    };

    let bid_depths: Vec<f64> = snaps.iter().map(|s| s.order_book.buy_depth).collect();
    let ask_depths: Vec<f64> = snaps.iter().map(|s| s.order_book.sell_depth).collect();
    let buy_depth = mean(&bid_depths);
    let sell_depth = mean(&ask_depths);
    // 0 rather than infinity on an empty ask side
    let depth_imbalance = if sell_depth != 0.0 {
        buy_depth / sell_depth
    } else {
        0.0
    };

    let spread_avg = mean(
        &snaps
            .iter()
            .map(|s| s.order_book.spread)
            .collect::<Vec<_>>(),
    );
    let raw_pressure = (price_change / spread_avg) * depth_imbalance;
    let order_flow_pressure = if raw_pressure.is_finite() {
        raw_pressure
    } else {
        0.0
    };

    let ob_volatility = (stddev(&bid_depths) + stddev(&ask_depths)) / 2.0;

    let max_top_size = snaps
        .iter()
        .flat_map(|s| [s.order_book.top_bid.size, s.order_book.top_ask.size])
        .fold(0.0, f64::max);
    let total_depth = buy_depth + sell_depth;
    let wall_detection_score = if total_depth != 0.0 {
        max_top_size / total_depth * 100.0
    } else {
        0.0
    };

    let slope = linear_slope(&prices);
    let acceleration =
        (prices[n - 1] - 2.0 * prices[n / 2] + prices[0]) / (n as f64).powi(2);

    let early_reversal = if (depth_imbalance > 1.0 && price_momentum < 0.0)
        || (depth_imbalance < 1.0 && price_momentum > 0.0)
    {
        1
    } else {
        0
    };

    OrderFlowIndicators {
        timeframe,
        price_change,
        price_momentum,
        price_volatility,
        avg_volume,
        volume_delta,
        volume_imbalance,
        max_trade_size,
        aggressive_volume_ratio,
        depth_imbalance,
        spread_avg,
        order_flow_pressure,
        ob_volatility,
        wall_detection_score,
        slope,
        acceleration,
        early_reversal,
    }
}
