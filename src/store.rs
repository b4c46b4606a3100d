//! Snapshot window store
//!
//! Owns the full snapshot history and serves time-bounded sub-windows for
//! every [`Timeframe`] horizon. The history is strictly time-ordered, so each
//! window is a suffix of the master list, recomputed on demand.

use std::collections::VecDeque;
use tracing::debug;

use crate::types::{Snapshot, Timeframe};

/// Eviction policy for the master snapshot history.
///
/// The derived windows are always time-bounded; this bounds the history
/// itself so memory does not grow without limit on long sessions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetentionPolicy {
    /// Keep everything
    Unbounded,
    /// Keep at most this many snapshots
    MaxLen(usize),
    /// Keep snapshots no older than this many milliseconds
    MaxAgeMs(u64),
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        // A full 15m window at ~4 snapshots/sec fits comfortably
        RetentionPolicy::MaxLen(10_000)
    }
}

/// Master snapshot history plus window derivation
pub struct SnapshotWindowStore {
    snapshots: VecDeque<Snapshot>,
    last_timestamp: u64,
    retention: RetentionPolicy,
}

impl SnapshotWindowStore {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            snapshots: VecDeque::new(),
            last_timestamp: 0,
            retention,
        }
    }

    /// Replace the history with a previously cached one (startup only).
    /// The cache is best-effort; entries are trusted to be time-ordered.
    pub fn seed(&mut self, history: Vec<Snapshot>) {
        self.last_timestamp = history.last().map(|s| s.timestamp).unwrap_or(0);
        self.snapshots = history.into();
        debug!("Seeded store with {} cached snapshots", self.snapshots.len());
    }

    /// Append a snapshot. Returns false (no state change) when the timestamp
    /// exactly equals the last ingested one. Only exact equality is checked;
    /// out-of-order duplicates with different content pass through.
    pub fn ingest(&mut self, snapshot: Snapshot) -> bool {
        if snapshot.timestamp == self.last_timestamp {
            return false;
        }

        self.last_timestamp = snapshot.timestamp;
        self.snapshots.push_back(snapshot);
        self.apply_retention();
        true
    }

    fn apply_retention(&mut self) {
        match self.retention {
            RetentionPolicy::Unbounded => {}
            RetentionPolicy::MaxLen(max) => {
                while self.snapshots.len() > max {
                    self.snapshots.pop_front();
                }
            }
            RetentionPolicy::MaxAgeMs(max_age) => {
                let cutoff = self.last_timestamp.saturating_sub(max_age);
                while self
                    .snapshots
                    .front()
                    .is_some_and(|s| s.timestamp < cutoff)
                {
                    self.snapshots.pop_front();
                }
            }
        }
    }

    /// Most recently ingested snapshot
    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.back()
    }

    /// Current mid price, if any snapshot has been seen
    pub fn current_price(&self) -> Option<f64> {
        self.latest().map(|s| s.price)
    }

    /// Full retained history, oldest first (cache persistence)
    pub fn history(&self) -> Vec<Snapshot> {
        self.snapshots.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Snapshots with `timestamp >= now - horizon`, oldest first.
    ///
    /// The history is time-ordered, so the window is the suffix starting at
    /// the first in-horizon snapshot. Returned as an owned copy; windows are
    /// recomputed on demand rather than cached.
    pub fn window(&self, now_ms: u64, timeframe: Timeframe) -> Vec<Snapshot> {
        let cutoff = now_ms.saturating_sub(timeframe.duration_ms());
        let (older, newer) = self.snapshots.as_slices();

        let start_in_older = older.partition_point(|s| s.timestamp < cutoff);
        if start_in_older < older.len() {
            older[start_in_older..]
                .iter()
                .chain(newer.iter())
                .cloned()
                .collect()
        } else {
            let start = newer.partition_point(|s| s.timestamp < cutoff);
            newer[start..].to_vec()
        }
    }
}

impl Default for SnapshotWindowStore {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(prices: &[(u64, f64)]) -> SnapshotWindowStore {
        let mut store = SnapshotWindowStore::new(RetentionPolicy::Unbounded);
        for &(ts, price) in prices {
            store.ingest(Snapshot::simple(ts, price));
        }
        store
    }

    #[test]
    fn test_duplicate_timestamp_is_noop() {
        let mut store = SnapshotWindowStore::default();
        assert!(store.ingest(Snapshot::simple(1_000, 100.0)));
        assert!(!store.ingest(Snapshot::simple(1_000, 101.0)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.latest().unwrap().price, 100.0);
    }

    #[test]
    fn test_window_is_suffix_subset_of_longer_horizon() {
        let now = 1_000_000;
        let store = store_with(&[
            (now - 250_000, 1.0),
            (now - 50_000, 2.0),
            (now - 20_000, 3.0),
            (now - 4_000, 4.0),
            (now - 500, 5.0),
        ]);

        let horizons = Timeframe::ALL;
        for pair in horizons.windows(2) {
            let (short, long) = (pair[0], pair[1]);
            let w_short = store.window(now, short);
            let w_long = store.window(now, long);
            assert!(w_short.len() <= w_long.len());
            // Shorter window must be the tail of the longer one
            let tail = &w_long[w_long.len() - w_short.len()..];
            for (a, b) in w_short.iter().zip(tail) {
                assert_eq!(a.timestamp, b.timestamp);
            }
        }
    }

    #[test]
    fn test_window_excludes_stale_snapshots() {
        let now = 100_000;
        let store = store_with(&[(now - 10_000, 1.0), (now - 3_000, 2.0), (now - 200, 3.0)]);
        let w = store.window(now, Timeframe::S5);
        assert_eq!(w.len(), 2);
        assert_eq!(w[0].price, 2.0);
    }

    #[test]
    fn test_max_len_retention() {
        let mut store = SnapshotWindowStore::new(RetentionPolicy::MaxLen(3));
        for i in 0..10u64 {
            store.ingest(Snapshot::simple(1_000 + i, i as f64));
        }
        assert_eq!(store.len(), 3);
        assert_eq!(store.latest().unwrap().price, 9.0);
    }

    #[test]
    fn test_max_age_retention() {
        let mut store = SnapshotWindowStore::new(RetentionPolicy::MaxAgeMs(5_000));
        store.ingest(Snapshot::simple(1_000, 1.0));
        store.ingest(Snapshot::simple(2_000, 2.0));
        store.ingest(Snapshot::simple(9_000, 3.0));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_seed_restores_dedup_watermark() {
        let mut store = SnapshotWindowStore::default();
        store.seed(vec![Snapshot::simple(5_000, 1.0)]);
        assert!(!store.ingest(Snapshot::simple(5_000, 2.0)));
        assert!(store.ingest(Snapshot::simple(6_000, 2.0)));
    }
}
