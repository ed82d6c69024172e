//! Error types for configuration, checkpoint restore and order execution

use rust_decimal::Decimal;
use thiserror::Error;

/// Invalid agent configuration. Always fatal at startup.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("instrument must be set")]
    MissingInstrument,

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: Decimal },

    #[error("pip size could not be determined for instrument {0}")]
    InvalidPipSize(String),

    #[error("{field} is too large to represent")]
    OutOfRange { field: &'static str },
}

/// Checkpoint that cannot be restored without corrupting range continuity
#[derive(Debug, Error, PartialEq)]
pub enum StateError {
    #[error("malformed checkpoint: {0}")]
    Malformed(String),

    #[error("candles must be strictly ascending by bucket start (at index {index})")]
    Unordered { index: usize },

    #[error("candle at index {index} does not start on a bucket boundary")]
    Misaligned { index: usize },

    #[error("candle at index {index} has high ({high}) below low ({low})")]
    InvertedCandle {
        index: usize,
        high: Decimal,
        low: Decimal,
    },

    #[error("next boundary does not follow the latest candle")]
    BoundaryMismatch,

    #[error("candle at index {index} lies outside the lookback period")]
    OutsideLookback { index: usize },
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Broker-side order failure
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OrderError {
    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}
