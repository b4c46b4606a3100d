//! Paper trading bot
//!
//! - `controller`: signal-driven state machine with SL/TP and cooldown
//! - `wallet`: simulated balance, positions, and realized P&L
//! - `trade_log`: capped trade history with aggregate stats

pub mod controller;
pub mod trade_log;
pub mod wallet;

pub use controller::{BotAction, BotPosition, BotStatus, TradeDirection, TradingBot, TradingBotConfig};
pub use trade_log::{ClosedTrade, TradeLog, TradeResult, TradeStats};
pub use wallet::{WalletLedger, WalletPosition, WalletState};
