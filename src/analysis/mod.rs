//! Analysis pipeline
//!
//! Pure computation over snapshot windows and candle series:
//! - Order-flow indicators per timeframe window
//! - Classic technical indicators over a candle series
//! - Candlestick pattern detection
//! - Weighted scoring into directional signals

pub mod orderflow;
pub mod patterns;
pub mod signal;
pub mod technical;

pub use orderflow::OrderFlowIndicators;
pub use patterns::{detect_all, DetectedPattern, PatternDirection};
pub use signal::{
    analyze, Action, AnalysisSignal, DirectionFilter, IndicatorKind, IndicatorWeights, SignalLog,
    StrategyConfig,
};
pub use technical::TechnicalSnapshot;

/// Arithmetic mean; 0 for an empty slice
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0 for an empty slice
pub(crate) fn stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_stddev_empty() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(stddev(&[]), 0.0);
    }

    #[test]
    fn test_stddev_constant_series() {
        assert_eq!(stddev(&[5.0, 5.0, 5.0]), 0.0);
    }

    #[test]
    fn test_stddev_known_value() {
        // Population stddev of [2,4,4,4,5,5,7,9] is 2
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((stddev(&v) - 2.0).abs() < 1e-12);
    }
}
