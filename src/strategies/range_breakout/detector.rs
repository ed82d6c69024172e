//! Range Breakout Detector
//!
//! A tick breaks out when the window has spanned the full lookback period, its
//! high-low spread is inside the range threshold, and the tick reaches half a
//! threshold away from the range center. A confirmed breakout discards the window
//! so the next range is rebuilt from scratch, seeded by the breakout tick itself.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::config::RangeBreakoutConfig;
use super::window::{CandleWindow, WindowState};
use crate::error::{ConfigError, StateError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakoutState {
    NoSignal,
    BreakHigh,
    BreakLow,
}

impl BreakoutState {
    pub fn is_signal(self) -> bool {
        self != BreakoutState::NoSignal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationResult {
    pub state: BreakoutState,
    pub price: Decimal,
    pub time: DateTime<Utc>,
}

pub struct RangeBreakoutDetector {
    lookback: Duration,
    threshold: Decimal,
    band: Decimal,
    window: CandleWindow,
}

impl RangeBreakoutDetector {
    pub fn new(config: RangeBreakoutConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let lookback = config.lookback()?;
        Ok(Self {
            lookback,
            threshold: config.threshold()?,
            band: config.band()?,
            window: CandleWindow::new(lookback),
        })
    }

    /// Read-only view of the window
    pub fn window(&self) -> &CandleWindow {
        &self.window
    }

    /// Classify a tick against the established range, then fold it into the window
    pub fn classify(&mut self, price: Decimal, time: DateTime<Utc>) -> ClassificationResult {
        let state = self.evaluate(price, time);

        if state.is_signal() {
            info!(?state, price = %price, time = %time, "Range breakout confirmed, resetting window");
            self.window.reset();
        }
        self.window.update(price, time);

        ClassificationResult { state, price, time }
    }

    fn evaluate(&self, price: Decimal, time: DateTime<Utc>) -> BreakoutState {
        let (highest, lowest) = match (self.window.highest(), self.window.lowest()) {
            (Some(h), Some(l)) => (h, l),
            _ => return BreakoutState::NoSignal,
        };

        let sufficient_history = self
            .window
            .oldest_bucket_start()
            .is_some_and(|oldest| time - oldest >= self.lookback);
        if !sufficient_history {
            return BreakoutState::NoSignal;
        }

        let diff = highest - lowest;
        if diff >= self.threshold {
            debug!(diff = %diff, "Market not ranging");
            return BreakoutState::NoSignal;
        }

        // Triggers past the representable range can never be reached
        let center = highest - diff / dec!(2);
        if center.checked_add(self.band).is_some_and(|upper| price >= upper) {
            BreakoutState::BreakHigh
        } else if center.checked_sub(self.band).is_some_and(|lower| price <= lower) {
            BreakoutState::BreakLow
        } else {
            BreakoutState::NoSignal
        }
    }

    pub fn snapshot(&self) -> WindowState {
        self.window.snapshot()
    }

    pub fn restore(&mut self, state: WindowState) -> Result<(), StateError> {
        self.window.restore(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64, seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 14, 0, 0).unwrap()
            + Duration::minutes(minutes)
            + Duration::seconds(seconds)
    }

    fn detector() -> RangeBreakoutDetector {
        RangeBreakoutDetector::new(RangeBreakoutConfig {
            lookback_minutes: 10,
            range_threshold_pips: dec!(20),
            pip_size: dec!(0.01),
        })
        .unwrap()
    }

    /// Ticks every minute from 0 to 10 inclusive, cycling between 100.00 and 100.15
    fn build_range(detector: &mut RangeBreakoutDetector) -> Vec<ClassificationResult> {
        let prices = [dec!(100.00), dec!(100.05), dec!(100.10), dec!(100.15)];
        (0..=10)
            .map(|m| detector.classify(prices[m as usize % prices.len()], at(m, 0)))
            .collect()
    }

    #[test]
    fn test_single_tick_on_empty_window_is_no_signal() {
        let mut detector = detector();
        let result = detector.classify(dec!(100), at(0, 0));
        assert_eq!(result.state, BreakoutState::NoSignal);
        assert_eq!(result.price, dec!(100));
        assert_eq!(result.time, at(0, 0));
        assert_eq!(detector.window().len(), 1);
    }

    #[test]
    fn test_insufficient_history_never_signals() {
        let mut detector = detector();
        detector.classify(dec!(100.00), at(0, 0));
        // Far outside the band, but history spans only 9 minutes
        let result = detector.classify(dec!(105.00), at(9, 0));
        assert_eq!(result.state, BreakoutState::NoSignal);
    }

    #[test]
    fn test_tight_range_stays_quiet() {
        let mut detector = detector();
        let results = build_range(&mut detector);
        assert!(results.iter().all(|r| r.state == BreakoutState::NoSignal));
    }

    #[test]
    fn test_break_high_resets_and_reseeds_window() {
        let mut detector = detector();
        build_range(&mut detector);

        let result = detector.classify(dec!(100.30), at(11, 0));
        assert_eq!(result.state, BreakoutState::BreakHigh);
        assert_eq!(detector.window().len(), 1);
        assert_eq!(detector.window().oldest_bucket_start(), Some(at(10, 0)));
        assert_eq!(detector.window().highest(), Some(dec!(100.30)));

        let next = detector.classify(dec!(100.31), at(11, 1));
        assert_eq!(next.state, BreakoutState::NoSignal);
        assert_eq!(detector.window().len(), 1);
    }

    #[test]
    fn test_break_low() {
        let mut detector = detector();
        build_range(&mut detector);

        // Center 100.075, band 0.10 -> lower trigger 99.975
        let result = detector.classify(dec!(99.975), at(11, 0));
        assert_eq!(result.state, BreakoutState::BreakLow);
        assert_eq!(detector.window().oldest_bucket_start(), Some(at(10, 0)));
    }

    #[test]
    fn test_band_edges_are_inclusive() {
        // Upper trigger is 100.075 + 0.10
        let mut inside = detector();
        build_range(&mut inside);
        let result = inside.classify(dec!(100.174), at(11, 0));
        assert_eq!(result.state, BreakoutState::NoSignal);

        let mut edge = detector();
        build_range(&mut edge);
        let result = edge.classify(dec!(100.175), at(11, 0));
        assert_eq!(result.state, BreakoutState::BreakHigh);
    }

    #[test]
    fn test_wide_market_is_not_ranging() {
        let mut detector = detector();
        detector.classify(dec!(100.00), at(0, 0));
        detector.classify(dec!(100.20), at(5, 0));
        // diff == threshold counts as not ranging
        let result = detector.classify(dec!(101.00), at(10, 0));
        assert_eq!(result.state, BreakoutState::NoSignal);
    }

    #[test]
    fn test_invalid_config_fails_closed() {
        let result = RangeBreakoutDetector::new(RangeBreakoutConfig {
            lookback_minutes: -5,
            ..RangeBreakoutConfig::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_history_spanning_exactly_the_lookback_is_sufficient() {
        let mut short = detector();
        short.classify(dec!(100.00), at(0, 0));
        let result = short.classify(dec!(100.50), at(9, 59));
        assert_eq!(result.state, BreakoutState::NoSignal);

        let mut exact = detector();
        exact.classify(dec!(100.00), at(0, 0));
        let result = exact.classify(dec!(100.50), at(10, 0));
        assert_eq!(result.state, BreakoutState::BreakHigh);
    }

    #[test]
    fn test_overflowing_threshold_fails_construction() {
        let result = RangeBreakoutDetector::new(RangeBreakoutConfig {
            lookback_minutes: 10,
            range_threshold_pips: dec!(100000000000000000000),
            pip_size: dec!(10000000000),
        });
        assert!(matches!(result, Err(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn test_lookback_past_time_range_does_not_panic() {
        let mut detector = RangeBreakoutDetector::new(RangeBreakoutConfig {
            lookback_minutes: i64::MAX / 120_000,
            ..RangeBreakoutConfig::default()
        })
        .unwrap();

        detector.classify(dec!(1.1000), at(0, 0));
        let result = detector.classify(dec!(1.1000), at(10, 0));
        assert_eq!(result.state, BreakoutState::NoSignal);
        assert_eq!(detector.window().len(), 2);
    }

    #[test]
    fn test_large_prices_near_decimal_limit_do_not_panic() {
        let mut detector = RangeBreakoutDetector::new(RangeBreakoutConfig {
            lookback_minutes: 10,
            range_threshold_pips: dec!(20),
            pip_size: dec!(1000000000000000000000000000),
        })
        .unwrap();

        detector.classify(Decimal::MAX, at(0, 0));
        let result = detector.classify(Decimal::MAX, at(10, 0));
        assert_eq!(result.state, BreakoutState::NoSignal);
    }
}
