//! Analysis engine
//!
//! Single owner of all mutable pipeline state. One tokio task drives a
//! `select!` loop over the snapshot ingestion channel, a 1 s candle tick,
//! and a 1 s bot tick; everything downstream observes the engine through
//! immutable events on a broadcast channel.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

use crate::analysis::{
    self, orderflow, technical, Action, AnalysisSignal, OrderFlowIndicators, SignalLog,
    StrategyConfig,
};
use crate::bot::{
    BotAction, BotStatus, ClosedTrade, TradeStats, TradingBot, TradingBotConfig, WalletState,
};
use crate::cache;
use crate::candles::{Candle, CandleAggregator};
use crate::store::{RetentionPolicy, SnapshotWindowStore};
use crate::types::{Snapshot, Timeframe};

/// Event broadcast buffer; slow subscribers lag and skip
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Engine construction parameters
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub symbol: String,
    pub retention: RetentionPolicy,
    /// Evaluated per candle tick against their timeframe's series
    pub strategies: Vec<StrategyConfig>,
    pub bot: TradingBotConfig,
    pub starting_balance: f64,
    /// Snapshot history cache; None disables persistence
    pub cache_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            retention: RetentionPolicy::default(),
            strategies: vec![StrategyConfig::default()],
            bot: TradingBotConfig::default(),
            starting_balance: 1_000.0,
            cache_path: None,
        }
    }
}

/// Commands accepted by the engine task
#[derive(Debug)]
pub enum Command {
    Ingest(Box<Snapshot>),
    StartBot(Option<TradingBotConfig>),
    StopBot,
    ResetBot,
    CloseManual,
    GetBotConfig(oneshot::Sender<TradingBotConfig>),
    Shutdown,
}

/// Derived state published on the event bus
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    Candles {
        timeframe: Timeframe,
        candles: Vec<Candle>,
    },
    OrderFlow(OrderFlowIndicators),
    Signal(AnalysisSignal),
    BotStatus {
        status: BotStatus,
    },
    Wallet(WalletState),
    TradeOpened {
        action: Action,
        price: f64,
        timeframe: Timeframe,
        score: f64,
    },
    TradeClosed(ClosedTrade),
    TradeStats(TradeStats),
}

/// Cloneable handle for feeding and controlling a running engine
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<EngineEvent>,
}

impl EngineHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Non-blocking; the engine task applies the snapshot in order
    pub fn ingest_snapshot(&self, snapshot: Snapshot) {
        let _ = self.cmd_tx.send(Command::Ingest(Box::new(snapshot)));
    }

    pub fn start_bot(&self, config_override: Option<TradingBotConfig>) {
        let _ = self.cmd_tx.send(Command::StartBot(config_override));
    }

    pub fn stop_bot(&self) {
        let _ = self.cmd_tx.send(Command::StopBot);
    }

    pub fn reset_bot(&self) {
        let _ = self.cmd_tx.send(Command::ResetBot);
    }

    pub fn close_manual(&self) {
        let _ = self.cmd_tx.send(Command::CloseManual);
    }

    /// Bot configuration as currently applied by the engine task.
    /// None when the engine has already shut down.
    pub async fn bot_config(&self) -> Option<TradingBotConfig> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx.send(Command::GetBotConfig(tx)).ok()?;
        rx.await.ok()
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
    }
}

/// Spawn the engine task. The returned handle feeds it; the join handle
/// resolves once a Shutdown command has been processed.
pub fn spawn(config: EngineConfig) -> (EngineHandle, tokio::task::JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    let handle = EngineHandle {
        cmd_tx,
        events: events.clone(),
    };

    let mut engine = Engine::new(config, events);
    let task = tokio::spawn(async move {
        engine.run(cmd_rx).await;
    });

    (handle, task)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

struct Engine {
    config: EngineConfig,
    store: SnapshotWindowStore,
    aggregator: CandleAggregator,
    signal_log: SignalLog,
    bot: TradingBot,
    last_bot_status: BotStatus,
    events: broadcast::Sender<EngineEvent>,
}

impl Engine {
    fn new(config: EngineConfig, events: broadcast::Sender<EngineEvent>) -> Self {
        let mut store = SnapshotWindowStore::new(config.retention);

        if let Some(path) = &config.cache_path {
            match cache::load_snapshot_cache(path) {
                Ok(history) if !history.is_empty() => store.seed(history),
                Ok(_) => {}
                Err(e) => warn!("Snapshot cache unavailable: {e:#}"),
            }
        }

        let bot = TradingBot::new(
            config.bot.clone(),
            &config.symbol,
            config.starting_balance,
        );

        Self {
            config,
            store,
            aggregator: CandleAggregator::new(),
            signal_log: SignalLog::new(),
            bot,
            last_bot_status: BotStatus::Idle,
            events,
        }
    }

    async fn run(&mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        info!(
            "Engine running for {} ({} strategies)",
            self.config.symbol,
            self.config.strategies.len()
        );

        let mut candle_tick = interval(Duration::from_secs(1));
        let mut bot_tick = interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Shutdown) | None => break,
                        Some(cmd) => self.handle_command(cmd, now_ms()),
                    }
                }
                _ = candle_tick.tick() => self.on_candle_tick(now_ms()),
                _ = bot_tick.tick() => self.on_bot_tick(now_ms()),
            }
        }

        self.save_cache();
        info!("Engine stopped");
    }

    fn handle_command(&mut self, cmd: Command, now: u64) {
        match cmd {
            Command::Ingest(snapshot) => {
                if self.store.ingest((*snapshot).clone()) {
                    self.aggregator.push(&snapshot);
                }
            }
            Command::StartBot(config_override) => {
                self.bot.start(config_override);
                self.publish_bot_status();
            }
            Command::StopBot => {
                self.bot.stop();
                self.publish_bot_status();
            }
            Command::ResetBot => {
                self.bot.reset();
                self.publish_bot_status();
                self.publish(EngineEvent::Wallet(self.bot.wallet().state().clone()));
            }
            Command::CloseManual => {
                let price = self.store.current_price();
                if let Some(action) = self.bot.close_manual(now, price) {
                    self.publish_bot_action(action);
                }
                self.publish_bot_status();
            }
            Command::GetBotConfig(reply) => {
                let _ = reply.send(self.bot.config().clone());
            }
            // Shutdown is intercepted by the run loop
            Command::Shutdown => {}
        }
    }

    /// Flush candle buffers, then re-run every strategy whose timeframe just
    /// completed a candle. Order-flow metrics are refreshed for all horizons
    /// while data is present.
    fn on_candle_tick(&mut self, now: u64) {
        let completed = self.aggregator.on_tick(now);
        if completed.is_empty() && self.store.is_empty() {
            return;
        }

        for (timeframe, _) in &completed {
            self.publish(EngineEvent::Candles {
                timeframe: *timeframe,
                candles: self.aggregator.candles(*timeframe),
            });
        }

        if !self.store.is_empty() {
            for timeframe in Timeframe::ALL {
                let window = self.store.window(now, timeframe);
                self.publish(EngineEvent::OrderFlow(orderflow::compute(
                    timeframe, &window,
                )));
            }
        }

        for strategy in &self.config.strategies {
            if !completed.iter().any(|(tf, _)| *tf == strategy.timeframe) {
                continue;
            }
            let candles = self.aggregator.candles(strategy.timeframe);
            if candles.len() < 3 {
                continue;
            }

            let technical = technical::compute(&candles);
            let patterns = analysis::detect_all(&candles);
            let signal = analysis::analyze(
                technical.as_ref(),
                &patterns,
                strategy,
                strategy.timeframe,
                now,
            );

            info!(
                "Signal {} {:?} score {:.1} [{}]",
                strategy.timeframe,
                signal.action,
                signal.score,
                signal.reasons.join(", ")
            );
            self.signal_log.push(signal.clone());
            self.publish(EngineEvent::Signal(signal));
        }
    }

    fn on_bot_tick(&mut self, now: u64) {
        let price = self.store.current_price();
        if let Some(action) = self.bot.tick(now, price, &self.signal_log) {
            self.publish_bot_action(action);
        }
        self.publish_bot_status();
    }

    fn publish_bot_action(&mut self, action: BotAction) {
        match action {
            BotAction::Entered {
                action,
                price,
                timeframe,
                score,
            } => {
                self.publish(EngineEvent::TradeOpened {
                    action,
                    price,
                    timeframe,
                    score,
                });
            }
            BotAction::Exited(trade) => {
                self.publish(EngineEvent::TradeClosed(trade));
                self.publish(EngineEvent::TradeStats(self.bot.trade_log().stats().clone()));
            }
        }
        self.publish(EngineEvent::Wallet(self.bot.wallet().state().clone()));
    }

    /// Status is published on transitions only
    fn publish_bot_status(&mut self) {
        let status = self.bot.status();
        if status != self.last_bot_status {
            self.last_bot_status = status;
            self.publish(EngineEvent::BotStatus { status });
        }
    }

    fn publish(&self, event: EngineEvent) {
        // Err means no subscribers; derived state is still held internally
        let _ = self.events.send(event);
    }

    fn save_cache(&self) {
        let Some(path) = &self.config.cache_path else {
            return;
        };
        if let Err(e) = cache::save_snapshot_cache(path, &self.store.history()) {
            error!("Failed to save snapshot cache: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VolumeInfo;

    fn engine() -> (Engine, broadcast::Receiver<EngineEvent>) {
        let (events, rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let config = EngineConfig {
            strategies: vec![StrategyConfig {
                timeframe: Timeframe::S1,
                ..Default::default()
            }],
            ..Default::default()
        };
        (Engine::new(config, events), rx)
    }

    fn snap(ts: u64, price: f64) -> Snapshot {
        let mut s = Snapshot::simple(ts, price);
        s.volume = VolumeInfo {
            total_size: 1.0,
            buy_size: 0.6,
            sell_size: 0.4,
            ..Default::default()
        };
        s
    }

    fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[test]
    fn test_duplicate_snapshot_not_aggregated() {
        let (mut engine, _rx) = engine();
        let now = 1_000_000;
        engine.handle_command(Command::Ingest(Box::new(snap(now, 100.0))), now);
        engine.handle_command(Command::Ingest(Box::new(snap(now, 200.0))), now);
        assert_eq!(engine.store.len(), 1);

        engine.on_candle_tick(now + 500);
        // One snapshot, one candle per cadence; duplicate contributed nothing
        let candles = engine.aggregator.candles(Timeframe::S1);
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].volume, 1.0);
    }

    #[test]
    fn test_candle_tick_publishes_candles_and_orderflow() {
        let (mut engine, mut rx) = engine();
        let now = 1_000_000;
        engine.handle_command(Command::Ingest(Box::new(snap(now - 400, 100.0))), now);
        engine.handle_command(Command::Ingest(Box::new(snap(now - 200, 101.0))), now);
        engine.on_candle_tick(now);

        let events = drain(&mut rx);
        let candle_events = events
            .iter()
            .filter(|e| matches!(e, EngineEvent::Candles { .. }))
            .count();
        assert_eq!(candle_events, Timeframe::CANDLE_CADENCES.len());
        let flow_events = events
            .iter()
            .filter(|e| matches!(e, EngineEvent::OrderFlow(_)))
            .count();
        assert_eq!(flow_events, Timeframe::ALL.len());
    }

    #[test]
    fn test_strategy_runs_only_after_three_candles() {
        let (mut engine, mut rx) = engine();
        let mut now = 1_000_000;

        for i in 0..3u64 {
            engine.handle_command(
                Command::Ingest(Box::new(snap(now - 200, 100.0 + i as f64))),
                now,
            );
            engine.on_candle_tick(now);
            let signals = drain(&mut rx)
                .into_iter()
                .filter(|e| matches!(e, EngineEvent::Signal(_)))
                .count();
            if i < 2 {
                assert_eq!(signals, 0);
            } else {
                assert_eq!(signals, 1);
            }
            now += 1_000;
        }
        assert_eq!(engine.signal_log.len(), 1);
    }

    #[test]
    fn test_empty_engine_tick_is_silent() {
        let (mut engine, mut rx) = engine();
        engine.on_candle_tick(1_000_000);
        engine.on_bot_tick(1_000_000);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_bot_status_published_on_transition_only() {
        let (mut engine, mut rx) = engine();
        let now = 1_000_000;

        engine.handle_command(Command::StartBot(None), now);
        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::BotStatus { status: BotStatus::Running })));

        // Repeated ticks in the same state stay quiet
        engine.on_bot_tick(now + 1_000);
        engine.on_bot_tick(now + 2_000);
        assert!(drain(&mut rx)
            .iter()
            .all(|e| !matches!(e, EngineEvent::BotStatus { .. })));
    }

    #[tokio::test]
    async fn test_spawn_shutdown_resolves_task() {
        let (handle, task) = spawn(EngineConfig::default());
        handle.ingest_snapshot(snap(1_000, 100.0));
        let config = handle.bot_config().await.expect("engine alive");
        assert_eq!(config.min_score, TradingBotConfig::default().min_score);
        handle.shutdown();
        task.await.expect("engine task panicked");
    }
}
