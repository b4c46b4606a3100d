//! Signal scoring engine
//!
//! Combines the technical snapshot and detected patterns under a strategy
//! configuration into a scored directional signal, and keeps a bounded
//! rolling log of generated signals queryable per timeframe.

use std::collections::VecDeque;
use serde::{Deserialize, Serialize};

use super::patterns::{DetectedPattern, PatternDirection};
use super::technical::TechnicalSnapshot;
use crate::types::Timeframe;

/// Signals kept in the rolling log
pub const SIGNAL_LOG_CAP: usize = 100;

/// Trade direction of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Neutral,
}

/// Restricts which signal actions a strategy may emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectionFilter {
    #[serde(rename = "long-only")]
    LongOnly,
    #[serde(rename = "short-only")]
    ShortOnly,
}

/// Indicator families a strategy can enable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndicatorKind {
    Rsi,
    Macd,
    VolumeSpike,
    Pattern,
    Momentum,
}

/// Score contribution per indicator family
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorWeights {
    pub rsi: f64,
    pub macd: f64,
    pub volume_spike: f64,
    pub pattern: f64,
    /// Reserved: carried in the config but not consumed by any scoring rule
    pub momentum: f64,
}

impl Default for IndicatorWeights {
    fn default() -> Self {
        Self {
            rsi: 1.0,
            macd: 1.0,
            volume_spike: 1.0,
            pattern: 1.0,
            momentum: 1.0,
        }
    }
}

/// One weighting/threshold profile mapping indicators to a signal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyConfig {
    pub timeframe: Timeframe,
    pub min_score: f64,
    pub weights: IndicatorWeights,
    pub enabled_indicators: Vec<IndicatorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction_filter: Option<DirectionFilter>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::M1,
            min_score: 2.0,
            weights: IndicatorWeights::default(),
            enabled_indicators: vec![
                IndicatorKind::Rsi,
                IndicatorKind::Macd,
                IndicatorKind::Pattern,
                IndicatorKind::VolumeSpike,
            ],
            direction_filter: Some(DirectionFilter::LongOnly),
        }
    }
}

/// A scored directional signal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSignal {
    pub action: Action,
    /// Signed score; kept raw even when the direction filter forces NEUTRAL
    pub score: f64,
    pub reasons: Vec<String>,
    pub timestamp: u64,
    pub timeframe: Timeframe,
}

/// Score indicators and patterns into a signal.
///
/// Pure: the same inputs always produce the same action, score, and reasons.
/// `technical` is None when the candle series was too short; those rules are
/// simply skipped.
pub fn analyze(
    technical: Option<&TechnicalSnapshot>,
    patterns: &[DetectedPattern],
    config: &StrategyConfig,
    timeframe: Timeframe,
    now_ms: u64,
) -> AnalysisSignal {
    let mut score = 0.0;
    let mut reasons = Vec::new();
    let enabled = |kind| config.enabled_indicators.contains(&kind);

    if let Some(t) = technical {
        if enabled(IndicatorKind::Rsi) {
            if t.rsi < 30.0 {
                score += config.weights.rsi;
                reasons.push("RSI Oversold".to_string());
            }
            if t.rsi > 70.0 {
                score -= config.weights.rsi;
                reasons.push("RSI Overbought".to_string());
            }
        }

        if enabled(IndicatorKind::Macd) {
            if t.macd_hist > 0.0 {
                score += config.weights.macd;
                reasons.push("MACD Bullish Crossover".to_string());
            } else {
                score -= config.weights.macd;
                reasons.push("MACD Bearish Crossover".to_string());
            }
        }

        if enabled(IndicatorKind::VolumeSpike) && t.volume_spike {
            score += config.weights.volume_spike;
            reasons.push("Volume Spike Detected".to_string());
        }
    }

    if enabled(IndicatorKind::Pattern) {
        for pattern in patterns {
            match pattern.direction {
                PatternDirection::Bullish => {
                    score += config.weights.pattern;
                    reasons.push(format!("Pattern: {}", pattern.name));
                }
                PatternDirection::Bearish => {
                    score -= config.weights.pattern;
                    reasons.push(format!("Pattern: {}", pattern.name));
                }
                PatternDirection::Neutral => {}
            }
        }
    }

    let action = if score >= config.min_score {
        Action::Buy
    } else if score <= -config.min_score {
        Action::Sell
    } else {
        Action::Neutral
    };

    // The filter masks the action but the raw score is preserved
    let action = match (config.direction_filter, action) {
        (Some(DirectionFilter::LongOnly), Action::Sell) => Action::Neutral,
        (Some(DirectionFilter::ShortOnly), Action::Buy) => Action::Neutral,
        (_, a) => a,
    };

    AnalysisSignal {
        action,
        score,
        reasons,
        timestamp: now_ms,
        timeframe,
    }
}

/// Bounded rolling log of generated signals
#[derive(Debug, Default)]
pub struct SignalLog {
    signals: VecDeque<AnalysisSignal>,
}

impl SignalLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, signal: AnalysisSignal) {
        self.signals.push_back(signal);
        while self.signals.len() > SIGNAL_LOG_CAP {
            self.signals.pop_front();
        }
    }

    /// Most recent signal generated for a timeframe
    pub fn latest_for(&self, timeframe: Timeframe) -> Option<&AnalysisSignal> {
        self.signals
            .iter()
            .rev()
            .find(|s| s.timeframe == timeframe)
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}
