//! Trade history and aggregate statistics
//!
//! Completed bot trades are appended to a capped history; stats are
//! recomputed in full over the capped window on every append rather than
//! maintained incrementally.

use std::collections::VecDeque;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::Action;
use crate::types::Timeframe;

/// Trades kept in the log
pub const TRADE_LOG_CAP: usize = 1000;

/// What closed the trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeResult {
    Tp,
    Sl,
    Manual,
}

/// A completed bot trade
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedTrade {
    pub id: Uuid,
    pub action: Action,
    pub score: f64,
    pub reasons: Vec<String>,
    pub timeframe: Timeframe,
    /// Entry time, milliseconds
    pub timestamp: u64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub result: TradeResult,
    /// Signed percent move relative to entry, in the position's favor
    pub pnl: f64,
}

/// Aggregates over the capped trade history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeStats {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub avg_pnl: f64,
    pub total_pnl: f64,
    pub max_gain: f64,
    pub max_loss: f64,
}

/// Capped trade history plus derived stats
#[derive(Debug, Default)]
pub struct TradeLog {
    trades: VecDeque<ClosedTrade>,
    stats: TradeStats,
}

impl TradeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a trade under a fresh unique id and refresh the stats
    pub fn log_trade(&mut self, mut trade: ClosedTrade) -> Uuid {
        trade.id = Uuid::new_v4();
        let id = trade.id;

        self.trades.push_back(trade);
        while self.trades.len() > TRADE_LOG_CAP {
            self.trades.pop_front();
        }
        self.recompute_stats();
        id
    }

    fn recompute_stats(&mut self) {
        let total = self.trades.len();
        if total == 0 {
            self.stats = TradeStats::default();
            return;
        }

        let wins = self.trades.iter().filter(|t| t.pnl > 0.0).count();
        let losses = self.trades.iter().filter(|t| t.pnl <= 0.0).count();
        let total_pnl: f64 = self.trades.iter().map(|t| t.pnl).sum();
        let max_gain = self.trades.iter().map(|t| t.pnl).fold(f64::MIN, f64::max);
        let max_loss = self.trades.iter().map(|t| t.pnl).fold(f64::MAX, f64::min);

        self.stats = TradeStats {
            total_trades: total,
            wins,
            losses,
            win_rate: wins as f64 / total as f64 * 100.0,
            avg_pnl: total_pnl / total as f64,
            total_pnl,
            max_gain,
            max_loss,
        };
    }

    pub fn stats(&self) -> &TradeStats {
        &self.stats
    }

    pub fn trades(&self) -> impl Iterator<Item = &ClosedTrade> {
        self.trades.iter()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn clear(&mut self) {
        self.trades.clear();
        self.stats = TradeStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(pnl: f64) -> ClosedTrade {
        ClosedTrade {
            id: Uuid::nil(),
            action: Action::Buy,
            score: 3.0,
            reasons: vec![],
            timeframe: Timeframe::M1,
            timestamp: 0,
            entry_price: 100.0,
            exit_price: 100.0 + pnl,
            result: if pnl >= 0.0 {
                TradeResult::Tp
            } else {
                TradeResult::Sl
            },
            pnl,
        }
    }

    #[test]
    fn test_stats_recomputed_on_log() {
        let mut log = TradeLog::new();
        log.log_trade(trade(2.0));
        log.log_trade(trade(-1.0));
        log.log_trade(trade(0.0));
        log.log_trade(trade(5.0));

        let stats = log.stats();
        assert_eq!(stats.total_trades, 4);
        assert_eq!(stats.wins, 2);
        // Zero pnl counts as a loss
        assert_eq!(stats.losses, 2);
        assert_eq!(stats.win_rate, 50.0);
        assert_eq!(stats.total_pnl, 6.0);
        assert_eq!(stats.avg_pnl, 1.5);
        assert_eq!(stats.max_gain, 5.0);
        assert_eq!(stats.max_loss, -1.0);
    }

    #[test]
    fn test_unique_ids_assigned() {
        let mut log = TradeLog::new();
        let a = log.log_trade(trade(1.0));
        let b = log.log_trade(trade(1.0));
        assert_ne!(a, b);
    }

    #[test]
    fn test_cap_evicts_oldest_and_stats_follow() {
        let mut log = TradeLog::new();
        // One big winner that will be evicted
        log.log_trade(trade(100.0));
        for _ in 0..TRADE_LOG_CAP {
            log.log_trade(trade(-1.0));
        }
        assert_eq!(log.len(), TRADE_LOG_CAP);
        // Stats cover only the capped window: the +100 trade is gone
        assert_eq!(log.stats().max_gain, -1.0);
        assert_eq!(log.stats().wins, 0);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut log = TradeLog::new();
        log.log_trade(trade(1.0));
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.stats().total_trades, 0);
        assert_eq!(log.stats().max_gain, 0.0);
    }
}
