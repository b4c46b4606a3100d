//! Candle aggregation
//!
//! Buckets ingested snapshots into OHLCV candles for every cadence in
//! [`Timeframe::CANDLE_CADENCES`]. Every snapshot lands in every cadence's
//! private buffer; a wall-clock tick (driven externally, once per second)
//! flushes whichever buffers hold in-cadence data. Candle boundaries follow
//! the tick clock, not the data.

use std::collections::VecDeque;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Snapshot, Timeframe};

/// Candles kept per cadence; oldest evicted first
pub const CANDLE_CAP: usize = 100;

/// OHLCV summary of one time bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket start, milliseconds
    pub timestamp: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Build one candle from the snapshots captured during a bucket.
    /// Returns None for an empty bucket (no zero-volume filler candles).
    pub fn from_snapshots(snaps: &[Snapshot], bucket_start: u64) -> Option<Self> {
        let first = snaps.first()?;
        let last = snaps.last()?;

        let mut high = f64::MIN;
        let mut low = f64::MAX;
        let mut volume = 0.0;
        for s in snaps {
            high = high.max(s.price);
            low = low.min(s.price);
            volume += s.volume.total_size;
        }

        Some(Self {
            timestamp: bucket_start,
            open: first.price,
            high,
            low,
            close: last.price,
            volume,
        })
    }
}

struct CadenceState {
    cadence: Timeframe,
    buffer: Vec<Snapshot>,
    candles: VecDeque<Candle>,
}

/// Accumulates snapshots per cadence and flushes them into capped candle lists
pub struct CandleAggregator {
    cadences: Vec<CadenceState>,
}

impl CandleAggregator {
    pub fn new() -> Self {
        let cadences = Timeframe::CANDLE_CADENCES
            .into_iter()
            .map(|cadence| CadenceState {
                cadence,
                buffer: Vec::new(),
                candles: VecDeque::new(),
            })
            .collect();
        Self { cadences }
    }

    /// Push one snapshot into every cadence buffer
    pub fn push(&mut self, snapshot: &Snapshot) {
        for state in &mut self.cadences {
            state.buffer.push(snapshot.clone());
        }
    }

    /// Flush buffers against the tick clock. For each cadence, snapshots newer
    /// than `now - cadence` form one candle stamped at `now - cadence`; the
    /// buffer is cleared once a candle is built. An empty bucket leaves the
    /// buffer untouched and emits nothing.
    pub fn on_tick(&mut self, now_ms: u64) -> Vec<(Timeframe, Candle)> {
        let mut completed = Vec::new();

        for state in &mut self.cadences {
            let bucket_start = now_ms.saturating_sub(state.cadence.duration_ms());
            let in_bucket: Vec<Snapshot> = state
                .buffer
                .iter()
                .filter(|s| s.timestamp >= bucket_start)
                .cloned()
                .collect();

            let Some(candle) = Candle::from_snapshots(&in_bucket, bucket_start) else {
                continue;
            };

            debug!(
                "Candle {}: o={:.4} h={:.4} l={:.4} c={:.4} v={:.2} ({} snaps)",
                state.cadence,
                candle.open,
                candle.high,
                candle.low,
                candle.close,
                candle.volume,
                in_bucket.len()
            );

            state.candles.push_back(candle.clone());
            while state.candles.len() > CANDLE_CAP {
                state.candles.pop_front();
            }
            state.buffer.clear();
            completed.push((state.cadence, candle));
        }

        completed
    }

    /// Candle series for one cadence, oldest first
    pub fn candles(&self, cadence: Timeframe) -> Vec<Candle> {
        self.cadences
            .iter()
            .find(|s| s.cadence == cadence)
            .map(|s| s.candles.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for CandleAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VolumeInfo;

    fn snap(ts: u64, price: f64, size: f64) -> Snapshot {
        let mut s = Snapshot::simple(ts, price);
        s.volume = VolumeInfo {
            total_size: size,
            ..Default::default()
        };
        s
    }

    #[test]
    fn test_candle_ohlc_invariant() {
        let snaps = vec![
            snap(1_000, 100.0, 1.0),
            snap(1_200, 104.0, 2.0),
            snap(1_400, 97.0, 0.5),
            snap(1_600, 101.0, 1.5),
        ];
        let c = Candle::from_snapshots(&snaps, 1_000).unwrap();
        assert_eq!(c.open, 100.0);
        assert_eq!(c.close, 101.0);
        assert_eq!(c.high, 104.0);
        assert_eq!(c.low, 97.0);
        assert_eq!(c.volume, 5.0);
        assert!(c.low <= c.open && c.open <= c.high);
        assert!(c.low <= c.close && c.close <= c.high);
    }

    #[test]
    fn test_empty_bucket_emits_nothing() {
        let mut agg = CandleAggregator::new();
        let completed = agg.on_tick(10_000);
        assert!(completed.is_empty());
        for cadence in Timeframe::CANDLE_CADENCES {
            assert!(agg.candles(cadence).is_empty());
        }
    }

    #[test]
    fn test_snapshot_fans_out_to_all_cadences() {
        let mut agg = CandleAggregator::new();
        let now = 1_000_000;
        agg.push(&snap(now - 500, 50.0, 1.0));
        let completed = agg.on_tick(now);
        assert_eq!(completed.len(), Timeframe::CANDLE_CADENCES.len());
    }

    #[test]
    fn test_candle_timestamp_is_bucket_start() {
        let mut agg = CandleAggregator::new();
        let now = 1_000_000;
        agg.push(&snap(now - 100, 50.0, 1.0));
        for (cadence, candle) in agg.on_tick(now) {
            assert_eq!(candle.timestamp, now - cadence.duration_ms());
        }
    }

    #[test]
    fn test_stale_snapshots_filtered_per_cadence() {
        let mut agg = CandleAggregator::new();
        let now = 1_000_000;
        // 3 seconds old: outside the 1s bucket, inside the 5s and longer buckets
        agg.push(&snap(now - 3_000, 50.0, 1.0));
        let completed = agg.on_tick(now);
        let cadences: Vec<Timeframe> = completed.iter().map(|(c, _)| *c).collect();
        assert!(!cadences.contains(&Timeframe::S1));
        assert!(cadences.contains(&Timeframe::S5));
    }

    #[test]
    fn test_candle_list_cap() {
        let mut agg = CandleAggregator::new();
        let mut now = 1_000_000;
        for i in 0..(CANDLE_CAP + 20) {
            agg.push(&snap(now - 200, 50.0 + i as f64, 1.0));
            agg.on_tick(now);
            now += 1_000;
        }
        let candles = agg.candles(Timeframe::S1);
        assert_eq!(candles.len(), CANDLE_CAP);
        // FIFO eviction keeps the newest
        assert_eq!(candles.last().unwrap().close, 50.0 + (CANDLE_CAP + 19) as f64);
    }

    #[test]
    fn test_buffer_cleared_after_flush() {
        let mut agg = CandleAggregator::new();
        let now = 1_000_000;
        agg.push(&snap(now - 100, 50.0, 2.0));
        agg.on_tick(now);
        // Next tick sees no data: the buffer was consumed by the flush
        assert!(agg.on_tick(now + 1_000).is_empty());
    }
}
