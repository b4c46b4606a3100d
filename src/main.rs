use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Parser;
use rand::Rng;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use tape_pilot::bot::TradingBotConfig;
use tape_pilot::engine::{self, EngineConfig, EngineEvent, EngineHandle};
use tape_pilot::types::{BookLevel, OrderBook, Side, Snapshot, TradeTick, VolumeInfo};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Symbol label for positions and logs
    #[arg(short, long, env = "TAPE_PILOT_SYMBOL", default_value = "BTCUSDT")]
    symbol: String,

    /// Paper wallet starting balance in USDT
    #[arg(short = 'b', long, env = "TAPE_PILOT_BALANCE", default_value = "1000")]
    starting_balance: f64,

    /// Snapshot cache file (zstd-compressed JSON); omit to disable persistence
    #[arg(short, long, env = "TAPE_PILOT_CACHE")]
    cache: Option<PathBuf>,

    /// Start the trading bot immediately
    #[arg(long, default_value = "false")]
    autostart_bot: bool,

    /// Synthetic feed interval in milliseconds
    #[arg(long, default_value = "250")]
    feed_interval_ms: u64,

    /// Synthetic feed starting price
    #[arg(long, default_value = "50000")]
    feed_price: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tape_pilot=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    info!("Starting tape-pilot");
    info!("Symbol: {}", args.symbol);
    info!("Starting balance: {} USDT", args.starting_balance);
    if let Some(cache) = &args.cache {
        info!("Snapshot cache: {}", cache.display());
    }

    let config = EngineConfig {
        symbol: args.symbol.clone(),
        starting_balance: args.starting_balance,
        cache_path: args.cache.clone(),
        bot: TradingBotConfig::default(),
        ..Default::default()
    };

    let (handle, engine_task) = engine::spawn(config);

    if args.autostart_bot {
        handle.start_bot(None);
    }

    // Synthetic random-walk feed standing in for a live market connection
    let feed_handle = handle.clone();
    tokio::spawn(async move {
        run_synthetic_feed(feed_handle, args.feed_price, args.feed_interval_ms).await;
    });

    let event_handle = handle.clone();
    tokio::spawn(async move {
        log_events(event_handle).await;
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    handle.stop_bot();
    handle.shutdown();
    engine_task.await?;

    Ok(())
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Random-walk price with plausible tape and book numbers around it
async fn run_synthetic_feed(handle: EngineHandle, start_price: f64, interval_ms: u64) {
    let mut ticker = tokio::time::interval(tokio::time::Duration::from_millis(interval_ms));
    let mut price = start_price;

    loop {
        ticker.tick().await;
        let snapshot = {
            let mut rng = rand::thread_rng();
            price *= 1.0 + rng.gen_range(-0.0005..0.0005);

            let buy_size: f64 = rng.gen_range(0.0..5.0);
            let sell_size: f64 = rng.gen_range(0.0..5.0);
            let spread = price * 0.0001;
            let trades: Vec<TradeTick> = (0..rng.gen_range(0..4))
                .map(|_| TradeTick {
                    price,
                    size: rng.gen_range(0.01..2.0),
                    side: if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell },
                })
                .collect();

            Snapshot {
                timestamp: now_ms(),
                price,
                volume: VolumeInfo {
                    total_size: buy_size + sell_size,
                    buy_size,
                    sell_size,
                    recent_trades: trades,
                },
                order_book: OrderBook {
                    top_bid: BookLevel {
                        price: price - spread / 2.0,
                        size: rng.gen_range(0.1..10.0),
                    },
                    top_ask: BookLevel {
                        price: price + spread / 2.0,
                        size: rng.gen_range(0.1..10.0),
                    },
                    buy_depth: rng.gen_range(10.0..100.0),
                    sell_depth: rng.gen_range(10.0..100.0),
                    spread,
                    changes: vec![],
                },
                market_stats: serde_json::Value::Null,
            }
        };
        handle.ingest_snapshot(snapshot);
    }
}

async fn log_events(handle: EngineHandle) {
    let mut rx = handle.subscribe();
    loop {
        match rx.recv().await {
            Ok(EngineEvent::Signal(signal)) => {
                if !signal.reasons.is_empty() {
                    info!(
                        "[{}] {:?} score {:.1}: {}",
                        signal.timeframe,
                        signal.action,
                        signal.score,
                        signal.reasons.join(", ")
                    );
                }
            }
            Ok(EngineEvent::TradeOpened {
                action,
                price,
                timeframe,
                score,
            }) => {
                info!(
                    "OPEN {:?} @ {:.2} ({}, score {:.1})",
                    action, price, timeframe, score
                );
            }
            Ok(EngineEvent::TradeClosed(trade)) => {
                let opened = DateTime::<Utc>::from_timestamp_millis(trade.timestamp as i64)
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_default();
                info!(
                    "CLOSE {:?} {:.2} -> {:.2} ({:?}, {:.2}%, opened {})",
                    trade.action, trade.entry_price, trade.exit_price, trade.result, trade.pnl,
                    opened
                );
            }
            Ok(EngineEvent::BotStatus { status }) => {
                info!("Bot status: {:?}", status);
            }
            Ok(EngineEvent::Wallet(wallet)) => {
                info!(
                    "Wallet: {:.2} USDT, equity {:.2}, {} open",
                    wallet.usdt,
                    wallet.equity,
                    wallet.positions.len()
                );
            }
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => warn!("Event subscriber lagged by {n} events"),
            Err(RecvError::Closed) => break,
        }
    }
}
