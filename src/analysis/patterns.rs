//! Candlestick pattern detection
//!
//! Scans a candle series and reports every named formation found at each
//! index. Rules are evaluated independently, so several patterns can
//! co-occur on the same candle and all are retained.

use serde::{Deserialize, Serialize};

use crate::candles::Candle;

/// Directional bias of a formation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternDirection {
    Bullish,
    Bearish,
    Neutral,
}

/// One recognized formation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedPattern {
    pub name: String,
    pub direction: PatternDirection,
    /// Fixed per-pattern weight, 1..=10
    pub strength: u8,
    /// Indexes of the candles forming the pattern
    pub candle_indexes: Vec<usize>,
    pub timestamp: u64,
}

fn body(c: &Candle) -> f64 {
    (c.close - c.open).abs()
}

fn is_bullish(c: &Candle) -> bool {
    c.close > c.open
}

fn is_bearish(c: &Candle) -> bool {
    c.close < c.open
}

/// Body within 10% of the full range
fn is_doji(c: &Candle) -> bool {
    body(c) <= 0.1 * (c.high - c.low)
}

/// Long lower shadow on a candle that closed up.
/// The bullish-close requirement applies to both hammer variants.
fn is_hammer(c: &Candle) -> bool {
    let lower_shadow = c.open.min(c.close) - c.low;
    lower_shadow > 2.0 * body(c) && is_bullish(c)
}

/// Long upper shadow on a candle that closed up
fn is_inverted_hammer(c: &Candle) -> bool {
    let upper_shadow = c.high - c.open.max(c.close);
    upper_shadow > 2.0 * body(c) && is_bullish(c)
}

/// Second candle's body fully contains the first's, opposite colors
fn is_engulfing(prev: &Candle, curr: &Candle) -> bool {
    let bullish = is_bearish(prev)
        && is_bullish(curr)
        && curr.open < prev.close
        && curr.close > prev.open;
    let bearish = is_bullish(prev)
        && is_bearish(curr)
        && curr.open > prev.close
        && curr.close < prev.open;
    bullish || bearish
}

fn engulfing_direction(curr: &Candle) -> PatternDirection {
    if is_bullish(curr) {
        PatternDirection::Bullish
    } else {
        PatternDirection::Bearish
    }
}

/// Down candle, doji, then an up candle closing beyond the first's open
fn is_morning_star(a: &Candle, b: &Candle, c: &Candle) -> bool {
    is_bearish(a) && is_doji(b) && is_bullish(c) && c.close > a.open
}

/// Up candle, doji, then a down candle closing beyond the first's open
fn is_evening_star(a: &Candle, b: &Candle, c: &Candle) -> bool {
    is_bullish(a) && is_doji(b) && is_bearish(c) && c.close < a.open
}

/// Three up candles with strictly rising closes
fn is_three_white_soldiers(a: &Candle, b: &Candle, c: &Candle) -> bool {
    is_bullish(a)
        && is_bullish(b)
        && is_bullish(c)
        && b.close > a.close
        && c.close > b.close
}

/// Three down candles with strictly falling closes
fn is_three_black_crows(a: &Candle, b: &Candle, c: &Candle) -> bool {
    is_bearish(a)
        && is_bearish(b)
        && is_bearish(c)
        && b.close < a.close
        && c.close < b.close
}

/// Scan a candle series for every known formation.
/// Fewer than 5 candles yields an empty list.
pub fn detect_all(candles: &[Candle]) -> Vec<DetectedPattern> {
    let mut patterns = Vec::new();
    if candles.len() < 5 {
        return patterns;
    }

    let mut push = |name: &str,
                    direction: PatternDirection,
                    indexes: Vec<usize>,
                    timestamp: u64,
                    strength: u8| {
        patterns.push(DetectedPattern {
            name: name.to_string(),
            direction,
            strength,
            candle_indexes: indexes,
            timestamp,
        });
    };

    for i in 2..candles.len() {
        let c = &candles[i];
        let c1 = &candles[i - 1];
        let c2 = &candles[i - 2];
        let ts = c.timestamp;

        if is_doji(c) {
            push("Doji", PatternDirection::Neutral, vec![i], ts, 3);
        }
        if is_hammer(c) {
            push("Hammer", PatternDirection::Bullish, vec![i], ts, 6);
        }
        if is_inverted_hammer(c) {
            push("Inverted Hammer", PatternDirection::Bullish, vec![i], ts, 5);
        }
        if is_engulfing(c1, c) {
            push("Engulfing", engulfing_direction(c), vec![i - 1, i], ts, 7);
        }
        if is_morning_star(c2, c1, c) {
            push(
                "Morning Star",
                PatternDirection::Bullish,
                vec![i - 2, i - 1, i],
                ts,
                8,
            );
        }
        if is_evening_star(c2, c1, c) {
            push(
                "Evening Star",
                PatternDirection::Bearish,
                vec![i - 2, i - 1, i],
                ts,
                8,
            );
        }
        if is_three_white_soldiers(c2, c1, c) {
            push(
                "Three White Soldiers",
                PatternDirection::Bullish,
                vec![i - 2, i - 1, i],
                ts,
                9,
            );
        }
        if is_three_black_crows(c2, c1, c) {
            push(
                "Three Black Crows",
                PatternDirection::Bearish,
                vec![i - 2, i - 1, i],
                ts,
                9,
            );
        }
    }

    patterns
}
