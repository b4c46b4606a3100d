//! Classic technical indicators over a candle series
//!
//! RSI, MACD, momentum, ROC, ATR, Bollinger width, OBV, and MFI. Full series
//! are intermediate; only the latest value of each surfaces in the snapshot.
//! Below 30 candles there is not enough history and no snapshot is produced.

use serde::{Deserialize, Serialize};

use super::{mean, stddev};
use crate::candles::Candle;

/// Minimum candles required before any technical value is trusted
pub const MIN_CANDLES: usize = 30;

/// Latest value of each technical indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalSnapshot {
    pub rsi: f64,
    pub macd_hist: f64,
    pub momentum: f64,
    pub roc: f64,
    pub atr: f64,
    pub bollinger_band_width: f64,
    pub obv: f64,
    pub mfi: f64,
    pub volume_spike: bool,
}

/// Exponential moving average seeded at the first value
fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = match values.first() {
        Some(&v) => v,
        None => return out,
    };
    out.push(prev);
    for &v in &values[1..] {
        prev = v * k + prev * (1.0 - k);
        out.push(prev);
    }
    out
}

/// Wilder-smoothed RSI. Returns one value per index from `period` onward.
/// A zero average loss pins the value at 100 instead of dividing by zero.
fn rsi(prices: &[f64], period: usize) -> Vec<f64> {
    if prices.len() <= period {
        return Vec::new();
    }

    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in 1..=period {
        let diff = prices[i] - prices[i - 1];
        if diff >= 0.0 {
            gains += diff;
        } else {
            losses -= diff;
        }
    }
    gains /= period as f64;
    losses /= period as f64;

    let value = |g: f64, l: f64| {
        if l == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + g / l)
        }
    };

    let mut out = vec![value(gains, losses)];
    for i in (period + 1)..prices.len() {
        let diff = prices[i] - prices[i - 1];
        if diff >= 0.0 {
            gains = (gains * (period - 1) as f64 + diff) / period as f64;
            losses = losses * (period - 1) as f64 / period as f64;
        } else {
            gains = gains * (period - 1) as f64 / period as f64;
            losses = (losses * (period - 1) as f64 - diff) / period as f64;
        }
        out.push(value(gains, losses));
    }
    out
}

/// MACD histogram series (12/26 lines, 9-period signal)
fn macd_histogram(prices: &[f64]) -> Vec<f64> {
    let fast = ema(prices, 12);
    let slow = ema(prices, 26);
    let macd_line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let signal_line = ema(&macd_line, 9);
    macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| m - s)
        .collect()
}

/// True range smoothed with EMA(period)
fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    let tr: Vec<f64> = highs
        .iter()
        .enumerate()
        .map(|(i, &h)| {
            let prev_close = if i > 0 { closes[i - 1] } else { closes[0] };
            (h - lows[i])
                .max((h - prev_close).abs())
                .max((lows[i] - prev_close).abs())
        })
        .collect();
    ema(&tr, period)
}

/// On-balance volume running sum
fn obv(closes: &[f64], volumes: &[f64]) -> f64 {
    let mut total = 0.0;
    for i in 1..closes.len() {
        if closes[i] > closes[i - 1] {
            total += volumes[i];
        } else if closes[i] < closes[i - 1] {
            total -= volumes[i];
        }
    }
    total
}

/// Money flow index over the trailing `period`. Zero negative flow is treated
/// as 1 so the ratio stays finite.
fn mfi(highs: &[f64], lows: &[f64], closes: &[f64], volumes: &[f64], period: usize) -> f64 {
    let n = closes.len();
    let typical: Vec<f64> = (0..n).map(|i| (highs[i] + lows[i] + closes[i]) / 3.0).collect();

    let mut pos = 0.0;
    let mut neg = 0.0;
    for j in (n - period)..n {
        let flow = typical[j] * volumes[j];
        if typical[j] > typical[j - 1] {
            pos += flow;
        } else {
            neg += flow;
        }
    }

    let ratio = pos / if neg != 0.0 { neg } else { 1.0 };
    100.0 - 100.0 / (1.0 + ratio)
}

/// Compute the technical snapshot for a candle series.
/// Returns None below [`MIN_CANDLES`].
pub fn compute(candles: &[Candle]) -> Option<TechnicalSnapshot> {
    if candles.len() < MIN_CANDLES {
        return None;
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
    let n = closes.len();

    let rsi_latest = *rsi(&closes, 14).last()?;
    let macd_hist = *macd_histogram(&closes).last()?;
    let momentum = closes[n - 1] - closes[n - 1 - 10];
    let roc = (closes[n - 1] - closes[n - 1 - 10]) / closes[n - 1 - 10] * 100.0;
    let atr_latest = *atr(&highs, &lows, &closes, 14).last()?;

    let tail = &closes[n - 20..];
    let mid = mean(tail);
    let sd = stddev(tail);
    let bollinger_band_width = (mid + 2.0 * sd) - (mid - 2.0 * sd);

    let obv_latest = obv(&closes, &volumes);
    let mfi_latest = mfi(&highs, &lows, &closes, &volumes, 14);

    // Latest volume against the average of the prior 9 buckets
    let prior = &volumes[n - 10..n - 1];
    let volume_spike = volumes[n - 1] > mean(prior) * 1.5;

    Some(TechnicalSnapshot {
        rsi: rsi_latest,
        macd_hist,
        momentum,
        roc,
        atr: atr_latest,
        bollinger_band_width,
        obv: obv_latest,
        mfi: mfi_latest,
        volume_spike,
    })
}
