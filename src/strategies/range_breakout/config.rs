//! Range Breakout Configuration

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeBreakoutConfig {
    /// Lookback period in minutes the range must span before it can break (default: 60)
    pub lookback_minutes: i64,

    /// Maximum high-low spread, in pips, for the market to count as ranging (default: 20)
    #[serde(with = "rust_decimal::serde::str")]
    pub range_threshold_pips: Decimal,

    /// Price value of one pip (default: 0.0001)
    #[serde(with = "rust_decimal::serde::str")]
    pub pip_size: Decimal,
}

impl Default for RangeBreakoutConfig {
    fn default() -> Self {
        Self {
            lookback_minutes: 60,
            range_threshold_pips: dec!(20),
            pip_size: dec!(0.0001),
        }
    }
}

impl RangeBreakoutConfig {
    pub fn lookback(&self) -> Result<Duration, ConfigError> {
        Duration::try_minutes(self.lookback_minutes).ok_or(ConfigError::OutOfRange {
            field: "lookback_minutes",
        })
    }

    /// Range threshold converted to price units
    pub fn threshold(&self) -> Result<Decimal, ConfigError> {
        self.range_threshold_pips
            .checked_mul(self.pip_size)
            .ok_or(ConfigError::OutOfRange {
                field: "range_threshold_pips",
            })
    }

    /// Distance from the range center a tick must reach to break out
    pub fn band(&self) -> Result<Decimal, ConfigError> {
        (self.range_threshold_pips / dec!(2))
            .checked_mul(self.pip_size)
            .ok_or(ConfigError::OutOfRange {
                field: "range_threshold_pips",
            })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookback_minutes <= 0 {
            return Err(ConfigError::NonPositive {
                field: "lookback_minutes",
                value: Decimal::from(self.lookback_minutes),
            });
        }
        if self.range_threshold_pips <= Decimal::ZERO {
            return Err(ConfigError::NonPositive {
                field: "range_threshold_pips",
                value: self.range_threshold_pips,
            });
        }
        if self.pip_size <= Decimal::ZERO {
            return Err(ConfigError::NonPositive {
                field: "pip_size",
                value: self.pip_size,
            });
        }
        self.lookback()?;
        self.threshold()?;
        self.band()?;
        Ok(())
    }
}
