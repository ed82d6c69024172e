//! Range Breakout
//!
//! Aggregates ticks into 5-minute candles over a rolling lookback period and
//! flags ticks that break out of a tight range.

pub mod config;
pub mod detector;
pub mod window;

pub use config::RangeBreakoutConfig;
pub use detector::{BreakoutState, ClassificationResult, RangeBreakoutDetector};
pub use window::{normalize, Candle, CandleWindow, WindowState, BUCKET_SECONDS};
