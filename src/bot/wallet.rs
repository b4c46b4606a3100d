//! Paper wallet ledger
//!
//! Balance, open positions, and realized P&L bookkeeping. Every mutation
//! builds a fresh [`WalletState`] and swaps it in whole, so readers always
//! observe a consistent snapshot.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::types::Side;

/// One open paper position
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletPosition {
    pub id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub size: f64,
    pub timestamp: u64,
}

impl WalletPosition {
    fn unrealized_pnl(&self, current_price: f64) -> f64 {
        let sign = match self.side {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        };
        (current_price - self.entry_price) * self.size * sign
    }
}

/// Full wallet snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    pub usdt: f64,
    pub positions: Vec<WalletPosition>,
    /// usdt plus unrealized P&L over open positions
    pub equity: f64,
    pub pnl_history: Vec<f64>,
}

impl WalletState {
    fn fresh(balance: f64) -> Self {
        Self {
            usdt: balance,
            positions: Vec::new(),
            equity: balance,
            pnl_history: Vec::new(),
        }
    }
}

/// Owner of the wallet state
pub struct WalletLedger {
    default_balance: f64,
    state: WalletState,
}

impl WalletLedger {
    pub fn new(starting_balance: f64) -> Self {
        Self {
            default_balance: starting_balance,
            state: WalletState::fresh(starting_balance),
        }
    }

    pub fn state(&self) -> &WalletState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = WalletState::fresh(self.default_balance);
    }

    /// Open a position, debiting its cost. Returns None (no state change)
    /// when the balance cannot cover `size * entry_price`.
    pub fn open_position(
        &mut self,
        symbol: &str,
        side: Side,
        entry_price: f64,
        size: f64,
        now_ms: u64,
    ) -> Option<Uuid> {
        let cost = size * entry_price;
        if self.state.usdt < cost {
            debug!("Wallet rejected {symbol} position: cost {cost:.2} > balance {:.2}",
                self.state.usdt);
            return None;
        }

        let position = WalletPosition {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            entry_price,
            size,
            timestamp: now_ms,
        };
        let id = position.id;

        let mut positions = self.state.positions.clone();
        positions.push(position);
        self.state = WalletState {
            usdt: self.state.usdt - cost,
            positions,
            ..self.state.clone()
        };
        Some(id)
    }

    /// Close a position at `exit_price`, crediting notional plus P&L back to
    /// the balance. Unknown ids are a no-op. Returns the realized P&L.
    pub fn close_position(&mut self, id: Uuid, exit_price: f64) -> Option<f64> {
        let position = self.state.positions.iter().find(|p| p.id == id)?.clone();

        let pnl = position.unrealized_pnl(exit_price);
        let refund = position.size * exit_price;

        let positions: Vec<WalletPosition> = self
            .state
            .positions
            .iter()
            .filter(|p| p.id != id)
            .cloned()
            .collect();
        let usdt = self.state.usdt + refund + pnl;
        let mut pnl_history = self.state.pnl_history.clone();
        pnl_history.push(pnl);

        self.state = WalletState {
            usdt,
            positions,
            equity: usdt,
            pnl_history,
        };
        Some(pnl)
    }

    /// Recompute mark-to-market equity; the balance itself is untouched
    pub fn update_equity(&mut self, current_price: f64) {
        let unrealized: f64 = self
            .state
            .positions
            .iter()
            .map(|p| p.unrealized_pnl(current_price))
            .sum();
        self.state = WalletState {
            equity: self.state.usdt + unrealized,
            ..self.state.clone()
        };
    }
}
