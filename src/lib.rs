// Library crate - snapshot ingestion, analysis pipeline, and paper trading bot

pub mod analysis;
pub mod bot;
pub mod cache;
pub mod candles;
pub mod engine;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use engine::{Command, EngineConfig, EngineEvent, EngineHandle};
pub use store::{RetentionPolicy, SnapshotWindowStore};
pub use types::{Snapshot, Timeframe};
