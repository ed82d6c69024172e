//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files, with an optional
//! `.env` file and environment overrides.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::strategies::range_breakout::RangeBreakoutConfig;
use crate::Instrument;

pub const INSTRUMENT_ENV: &str = "RANGE_BREAKOUT_INSTRUMENT";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub agent: AgentConfig,
    #[serde(default)]
    pub state: StateConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        if let Ok(instrument) = std::env::var(INSTRUMENT_ENV) {
            config.agent.instrument = instrument;
        }

        config.agent.validate()?;
        Ok(config)
    }
}

/// Agent configuration, loaded once at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Name shown in action result messages
    #[serde(default = "default_agent_name")]
    pub name: String,
    pub instrument: String,
    pub lookback_minutes: i64,
    #[serde(with = "rust_decimal::serde::str")]
    pub range_threshold_pips: Decimal,
    /// Derived from the instrument when absent
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub pip_size: Option<Decimal>,
    pub trailing_stop_pips: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub trade_size: Decimal,
}

fn default_agent_name() -> String {
    "RangeBreakoutAgent".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            name: default_agent_name(),
            instrument: "EUR_USD".to_string(),
            lookback_minutes: 60,
            range_threshold_pips: dec!(20),
            pip_size: None,
            trailing_stop_pips: 15,
            trade_size: dec!(1000),
        }
    }
}

impl AgentConfig {
    pub fn instrument(&self) -> Instrument {
        Instrument::new(self.instrument.trim())
    }

    /// Configured pip size, or the conventional one for the instrument's quote
    /// currency (JPY pairs quote to two decimals, everything else to four)
    pub fn pip_size(&self) -> Decimal {
        match self.pip_size {
            Some(size) => size,
            None if self.instrument().quote_currency().eq_ignore_ascii_case("JPY") => dec!(0.01),
            None => dec!(0.0001),
        }
    }

    pub fn detector_config(&self) -> RangeBreakoutConfig {
        RangeBreakoutConfig {
            lookback_minutes: self.lookback_minutes,
            range_threshold_pips: self.range_threshold_pips,
            pip_size: self.pip_size(),
        }
    }

    /// Fail closed on anything the agent cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instrument.trim().is_empty() {
            return Err(ConfigError::MissingInstrument);
        }
        if let Some(size) = self.pip_size {
            if size <= Decimal::ZERO {
                return Err(ConfigError::InvalidPipSize(self.instrument.clone()));
            }
        }
        if self.trailing_stop_pips == 0 {
            return Err(ConfigError::NonPositive {
                field: "trailing_stop_pips",
                value: Decimal::ZERO,
            });
        }
        if self.trade_size <= Decimal::ZERO {
            return Err(ConfigError::NonPositive {
                field: "trade_size",
                value: self.trade_size,
            });
        }
        self.detector_config().validate()
    }
}

/// Checkpoint persistence configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    pub state_dir: String,
    /// Rewrite the JSON backup after every checkpoint
    #[serde(default = "default_auto_backup")]
    pub auto_backup: bool,
}

fn default_auto_backup() -> bool {
    true
}

impl Default for StateConfig {
    fn default() -> Self {
        StateConfig {
            state_dir: "state".to_string(),
            auto_backup: true,
        }
    }
}
