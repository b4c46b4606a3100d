//! Trading bot controller
//!
//! Finite-state controller consuming analysis signals on a fixed tick. Holds
//! at most one open position, enforces a post-close cooldown, and manages
//! stop-loss/take-profit exits. Drives the wallet ledger and trade log.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::trade_log::{ClosedTrade, TradeLog, TradeResult};
use super::wallet::WalletLedger;
use crate::analysis::{Action, AnalysisSignal, SignalLog};
use crate::types::{Side, Timeframe};

/// Externally visible bot state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BotStatus {
    Idle,
    Running,
    CoolingDown,
}

/// Which signal directions the bot may act on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    #[serde(rename = "both")]
    Both,
    #[serde(rename = "long-only")]
    LongOnly,
    #[serde(rename = "short-only")]
    ShortOnly,
}

/// Bot runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingBotConfig {
    /// Scanned in order; the first qualifying signal wins the tick
    pub enabled_timeframes: Vec<Timeframe>,
    pub min_score: f64,
    pub cooldown_ms: u64,
    pub direction: TradeDirection,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub risk_per_trade_pct: f64,
}

impl Default for TradingBotConfig {
    fn default() -> Self {
        Self {
            enabled_timeframes: vec![Timeframe::M1, Timeframe::S5],
            min_score: 3.0,
            cooldown_ms: 30_000,
            direction: TradeDirection::Both,
            stop_loss_pct: 0.3,
            take_profit_pct: 0.6,
            risk_per_trade_pct: 1.0,
        }
    }
}

/// The single currently-open bot position
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotPosition {
    pub action: Action,
    pub score: f64,
    pub reasons: Vec<String>,
    pub timeframe: Timeframe,
    pub timestamp: u64,
    pub entry_price: f64,
    /// Ledger position backing this trade, when the wallet accepted it
    pub wallet_id: Option<Uuid>,
}

/// What a tick did, for event publication
#[derive(Debug, Clone)]
pub enum BotAction {
    Entered {
        action: Action,
        price: f64,
        timeframe: Timeframe,
        score: f64,
    },
    Exited(ClosedTrade),
}

/// Signal-driven paper trading bot
pub struct TradingBot {
    config: TradingBotConfig,
    symbol: String,
    running: bool,
    status: BotStatus,
    last_trade_time: u64,
    position: Option<BotPosition>,
    wallet: WalletLedger,
    trade_log: TradeLog,
}

impl TradingBot {
    pub fn new(config: TradingBotConfig, symbol: &str, starting_balance: f64) -> Self {
        Self {
            config,
            symbol: symbol.to_string(),
            running: false,
            status: BotStatus::Idle,
            last_trade_time: 0,
            position: None,
            wallet: WalletLedger::new(starting_balance),
            trade_log: TradeLog::new(),
        }
    }

    /// Begin consuming signals. A config override replaces the whole config.
    /// The caller owns the tick driver; starting twice is a no-op.
    pub fn start(&mut self, config_override: Option<TradingBotConfig>) {
        if self.running {
            return;
        }
        if let Some(config) = config_override {
            self.config = config;
        }
        self.running = true;
        self.status = BotStatus::Running;
        info!("Bot started: {:?}", self.config);
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.status = BotStatus::Idle;
        info!("Bot stopped");
    }

    /// Clear position, history, and wallet back to their initial state
    pub fn reset(&mut self) {
        self.position = None;
        self.last_trade_time = 0;
        self.wallet.reset();
        self.trade_log.clear();
        self.status = if self.running {
            BotStatus::Running
        } else {
            BotStatus::Idle
        };
        info!("Bot reset");
    }

    pub fn config(&self) -> &TradingBotConfig {
        &self.config
    }

    pub fn status(&self) -> BotStatus {
        self.status
    }

    pub fn position(&self) -> Option<&BotPosition> {
        self.position.as_ref()
    }

    pub fn wallet(&self) -> &WalletLedger {
        &self.wallet
    }

    pub fn trade_log(&self) -> &TradeLog {
        &self.trade_log
    }

    /// One bot tick.
    ///
    /// Order matters: manage the open position first (a missing price skips
    /// the whole tick), then the cooldown gate, then signal scanning. At most
    /// one position is opened per tick and only when flat.
    pub fn tick(
        &mut self,
        now_ms: u64,
        current_price: Option<f64>,
        signals: &SignalLog,
    ) -> Option<BotAction> {
        if !self.running {
            return None;
        }

        if self.position.is_some() {
            let price = current_price?;
            self.wallet.update_equity(price);
            return self.manage_position(now_ms, price);
        }

        if now_ms.saturating_sub(self.last_trade_time) < self.config.cooldown_ms {
            self.status = BotStatus::CoolingDown;
            return None;
        }

        for &timeframe in &self.config.enabled_timeframes.clone() {
            let Some(signal) = signals.latest_for(timeframe) else {
                continue;
            };

            // Raw score, not |score|: a SELL with a strongly negative score
            // fails this gate unless min_score is chosen accordingly
            if signal.score < self.config.min_score || signal.action == Action::Neutral {
                continue;
            }
            let allowed = match (self.config.direction, signal.action) {
                (TradeDirection::LongOnly, Action::Sell) => false,
                (TradeDirection::ShortOnly, Action::Buy) => false,
                _ => true,
            };
            if !allowed {
                continue;
            }

            let signal = signal.clone();
            self.status = BotStatus::Running;
            return self.enter_position(now_ms, current_price, &signal);
        }

        self.status = BotStatus::Running;
        None
    }

    fn manage_position(&mut self, now_ms: u64, price: f64) -> Option<BotAction> {
        let position = self.position.as_ref()?;
        let entry = position.entry_price;
        let sign = if position.action == Action::Buy {
            1.0
        } else {
            -1.0
        };
        let diff_pct = (price - entry) / entry * 100.0 * sign;

        // Stop-loss wins when one move satisfies both thresholds
        if diff_pct <= -self.config.stop_loss_pct {
            return self.close_position(TradeResult::Sl, price, diff_pct, now_ms);
        }
        if diff_pct >= self.config.take_profit_pct {
            return self.close_position(TradeResult::Tp, price, diff_pct, now_ms);
        }

        self.status = BotStatus::Running;
        None
    }

    fn enter_position(
        &mut self,
        now_ms: u64,
        current_price: Option<f64>,
        signal: &AnalysisSignal,
    ) -> Option<BotAction> {
        let price = current_price?;

        let side = if signal.action == Action::Buy {
            Side::Buy
        } else {
            Side::Sell
        };
        let size = self.wallet.state().usdt * self.config.risk_per_trade_pct / 100.0 / price;
        let wallet_id = self
            .wallet
            .open_position(&self.symbol, side, price, size, now_ms);
        if wallet_id.is_none() {
            warn!("Wallet rejected entry; tracking position unbacked");
        }

        self.position = Some(BotPosition {
            action: signal.action,
            score: signal.score,
            reasons: signal.reasons.clone(),
            timeframe: signal.timeframe,
            timestamp: now_ms,
            entry_price: price,
            wallet_id,
        });

        info!(
            "Entry: {:?} {} @ {:.4} (score {:.1}, {})",
            signal.action, self.symbol, price, signal.score, signal.timeframe
        );

        Some(BotAction::Entered {
            action: signal.action,
            price,
            timeframe: signal.timeframe,
            score: signal.score,
        })
    }

    fn close_position(
        &mut self,
        result: TradeResult,
        exit_price: f64,
        pnl_pct: f64,
        now_ms: u64,
    ) -> Option<BotAction> {
        let position = self.position.take()?;

        if let Some(id) = position.wallet_id {
            self.wallet.close_position(id, exit_price);
        }

        let trade = ClosedTrade {
            id: Uuid::nil(), // assigned by the log
            action: position.action,
            score: position.score,
            reasons: position.reasons,
            timeframe: position.timeframe,
            timestamp: position.timestamp,
            entry_price: position.entry_price,
            exit_price,
            result,
            pnl: pnl_pct,
        };
        let mut logged = trade.clone();
        logged.id = self.trade_log.log_trade(trade);

        info!(
            "Exit ({:?}) @ {:.4} | PnL: {:.2}%",
            result, exit_price, pnl_pct
        );

        self.last_trade_time = now_ms;
        self.status = BotStatus::CoolingDown;
        Some(BotAction::Exited(logged))
    }

    /// Close the open position at the given price outside SL/TP, e.g. from
    /// the control surface. No-op when flat or no price is known.
    pub fn close_manual(&mut self, now_ms: u64, current_price: Option<f64>) -> Option<BotAction> {
        let position = self.position.as_ref()?;
        let price = current_price?;
        let sign = if position.action == Action::Buy {
            1.0
        } else {
            -1.0
        };
        let diff_pct = (price - position.entry_price) / position.entry_price * 100.0 * sign;
        self.close_position(TradeResult::Manual, price, diff_pct, now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisSignal;

    fn signal(timeframe: Timeframe, action: Action, score: f64) -> AnalysisSignal {
        AnalysisSignal {
            action,
            score,
            reasons: vec!["test".to_string()],
            timestamp: 0,
            timeframe,
        }
    }

    fn bot() -> TradingBot {
        let mut bot = TradingBot::new(TradingBotConfig::default(), "TEST", 1_000.0);
        bot.start(None);
        bot
    }

    fn log_with(signals: Vec<AnalysisSignal>) -> SignalLog {
        let mut log = SignalLog::new();
        for s in signals {
            log.push(s);
        }
        log
    }

    #[test]
    fn test_entry_on_qualifying_signal() {
        let mut bot = bot();
        let signals = log_with(vec![signal(Timeframe::M1, Action::Buy, 4.0)]);
        let outcome = bot.tick(100_000, Some(100.0), &signals);
        assert!(matches!(outcome, Some(BotAction::Entered { .. })));
        assert!(bot.position().is_some());
        assert_eq!(bot.status(), BotStatus::Running);
    }

    #[test]
    fn test_low_score_and_neutral_ignored() {
        let mut bot = bot();
        let signals = log_with(vec![
            signal(Timeframe::M1, Action::Buy, 2.0),
            signal(Timeframe::S5, Action::Neutral, 9.0),
        ]);
        assert!(bot.tick(100_000, Some(100.0), &signals).is_none());
        assert!(bot.position().is_none());
    }

    #[test]
    fn test_negative_sell_score_fails_raw_gate() {
        // A SELL whose score is -5 does not pass score >= min_score
        let mut bot = bot();
        let signals = log_with(vec![signal(Timeframe::M1, Action::Sell, -5.0)]);
        assert!(bot.tick(100_000, Some(100.0), &signals).is_none());
        assert!(bot.position().is_none());
    }

    #[test]
    fn test_stop_loss_triggers_before_take_profit_label() {
        let mut bot = bot();
        let signals = log_with(vec![signal(Timeframe::M1, Action::Buy, 4.0)]);
        bot.tick(100_000, Some(100.0), &signals);

        // -0.31% <= -0.3% stop
        let outcome = bot.tick(101_000, Some(99.69), &signals);
        let Some(BotAction::Exited(trade)) = outcome else {
            panic!("expected exit");
        };
        assert_eq!(trade.result, TradeResult::Sl);
        assert!((trade.pnl + 0.31).abs() < 1e-9);
        assert_eq!(bot.status(), BotStatus::CoolingDown);
    }

    #[test]
    fn test_take_profit() {
        let mut bot = bot();
        let signals = log_with(vec![signal(Timeframe::M1, Action::Buy, 4.0)]);
        bot.tick(100_000, Some(100.0), &signals);

        // +0.61% >= 0.6% target
        let outcome = bot.tick(101_000, Some(100.61), &signals);
        let Some(BotAction::Exited(trade)) = outcome else {
            panic!("expected exit");
        };
        assert_eq!(trade.result, TradeResult::Tp);
        assert!((trade.pnl - 0.61).abs() < 1e-9);
    }

    #[test]
    fn test_missing_price_skips_tick_with_position() {
        let mut bot = bot();
        let signals = log_with(vec![signal(Timeframe::M1, Action::Buy, 4.0)]);
        bot.tick(100_000, Some(100.0), &signals);
        let status_before = bot.status();
        assert!(bot.tick(101_000, None, &signals).is_none());
        assert!(bot.position().is_some());
        assert_eq!(bot.status(), status_before);
    }

    #[test]
    fn test_at_most_one_position() {
        let mut bot = bot();
        let signals = log_with(vec![
            signal(Timeframe::M1, Action::Buy, 5.0),
            signal(Timeframe::S5, Action::Buy, 5.0),
        ]);
        bot.tick(100_000, Some(100.0), &signals);
        // Second tick holds the position; no second entry
        let outcome = bot.tick(101_000, Some(100.1), &signals);
        assert!(outcome.is_none());
        assert_eq!(bot.wallet().state().positions.len(), 1);
    }

    #[test]
    fn test_cooldown_after_close() {
        let mut bot = bot();
        let signals = log_with(vec![signal(Timeframe::M1, Action::Buy, 4.0)]);
        bot.tick(100_000, Some(100.0), &signals);
        bot.tick(101_000, Some(101.0), &signals); // TP exit

        // Inside the 30s cooldown: no entry even with a live signal
        assert!(bot.tick(110_000, Some(100.0), &signals).is_none());
        assert_eq!(bot.status(), BotStatus::CoolingDown);

        // Cooldown elapsed: entry allowed again
        let outcome = bot.tick(101_000 + 30_000, Some(100.0), &signals);
        assert!(matches!(outcome, Some(BotAction::Entered { .. })));
    }

    #[test]
    fn test_direction_filter_blocks_entry() {
        let mut bot = TradingBot::new(
            TradingBotConfig {
                direction: TradeDirection::ShortOnly,
                ..Default::default()
            },
            "TEST",
            1_000.0,
        );
        bot.start(None);
        let signals = log_with(vec![signal(Timeframe::M1, Action::Buy, 5.0)]);
        assert!(bot.tick(100_000, Some(100.0), &signals).is_none());
    }

    #[test]
    fn test_timeframe_priority_order() {
        let mut bot = bot();
        // Default order is [M1, S5]; both qualify, M1 must win
        let signals = log_with(vec![
            signal(Timeframe::S5, Action::Buy, 5.0),
            signal(Timeframe::M1, Action::Buy, 4.0),
        ]);
        let Some(BotAction::Entered { timeframe, .. }) = bot.tick(100_000, Some(100.0), &signals)
        else {
            panic!("expected entry");
        };
        assert_eq!(timeframe, Timeframe::M1);
    }

    #[test]
    fn test_idle_bot_ignores_ticks() {
        let mut bot = TradingBot::new(TradingBotConfig::default(), "TEST", 1_000.0);
        let signals = log_with(vec![signal(Timeframe::M1, Action::Buy, 9.0)]);
        assert!(bot.tick(100_000, Some(100.0), &signals).is_none());
        assert_eq!(bot.status(), BotStatus::Idle);
    }

    #[test]
    fn test_short_position_sl_tp_sign_flip() {
        let mut bot = TradingBot::new(
            TradingBotConfig {
                direction: TradeDirection::Both,
                ..Default::default()
            },
            "TEST",
            1_000.0,
        );
        bot.start(None);
        let signals = log_with(vec![signal(Timeframe::M1, Action::Sell, 5.0)]);
        bot.tick(100_000, Some(100.0), &signals);
        assert!(bot.position().is_some());

        // Price falls 0.61%: profit for a short
        let Some(BotAction::Exited(trade)) = bot.tick(101_000, Some(99.39), &signals) else {
            panic!("expected exit");
        };
        assert_eq!(trade.result, TradeResult::Tp);
        assert!(trade.pnl > 0.0);
    }

    #[test]
    fn test_manual_close() {
        let mut bot = bot();
        let signals = log_with(vec![signal(Timeframe::M1, Action::Buy, 4.0)]);
        bot.tick(100_000, Some(100.0), &signals);
        let Some(BotAction::Exited(trade)) = bot.close_manual(105_000, Some(100.1)) else {
            panic!("expected manual exit");
        };
        assert_eq!(trade.result, TradeResult::Manual);
        assert!(bot.position().is_none());
    }

    #[test]
    fn test_wallet_and_log_driven_by_bot() {
        let mut bot = bot();
        let signals = log_with(vec![signal(Timeframe::M1, Action::Buy, 4.0)]);
        bot.tick(100_000, Some(100.0), &signals);
        assert_eq!(bot.wallet().state().positions.len(), 1);
        assert!(bot.wallet().state().usdt < 1_000.0);

        bot.tick(101_000, Some(101.0), &signals);
        assert!(bot.wallet().state().positions.is_empty());
        assert_eq!(bot.trade_log().len(), 1);
        assert_eq!(bot.trade_log().stats().wins, 1);
    }
}
