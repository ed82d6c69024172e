//! Rolling window of 5-minute high/low candles
//!
//! The window owns its candles exclusively. Callers fold ticks in with
//! [`CandleWindow::update`], clear it with [`CandleWindow::reset`], and read it only
//! through the range queries. [`WindowState`] is the checkpoint form used to resume a
//! replay or a restarted process mid-range.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::error::StateError;

/// Fixed candle bucket width in seconds
pub const BUCKET_SECONDS: i64 = 300;

pub fn bucket_width() -> Duration {
    Duration::seconds(BUCKET_SECONDS)
}

/// Floor a timestamp to the start of its 5-minute bucket
pub fn normalize(time: DateTime<Utc>) -> DateTime<Utc> {
    let into_bucket = time.timestamp().rem_euclid(BUCKET_SECONDS);
    time - Duration::seconds(into_bucket)
        - Duration::nanoseconds(i64::from(time.timestamp_subsec_nanos()))
}

/// High/low aggregate of one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(with = "rust_decimal::serde::str")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub low: Decimal,
    pub bucket_start: DateTime<Utc>,
}

impl Candle {
    fn open(price: Decimal, bucket_start: DateTime<Utc>) -> Self {
        Self {
            high: price,
            low: price,
            bucket_start,
        }
    }

    fn widen(&mut self, price: Decimal) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
    }
}

/// Serializable snapshot of a [`CandleWindow`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowState {
    pub candles: Vec<Candle>,
    pub next_boundary: Option<DateTime<Utc>>,
}

impl WindowState {
    pub fn to_json(&self) -> Result<String, StateError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, StateError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check that this snapshot could have been produced by a window with the
    /// given lookback
    pub fn validate(&self, lookback: Duration) -> Result<(), StateError> {
        for (index, candle) in self.candles.iter().enumerate() {
            if normalize(candle.bucket_start) != candle.bucket_start {
                return Err(StateError::Misaligned { index });
            }
            if candle.high < candle.low {
                return Err(StateError::InvertedCandle {
                    index,
                    high: candle.high,
                    low: candle.low,
                });
            }
            if index > 0 && candle.bucket_start <= self.candles[index - 1].bucket_start {
                return Err(StateError::Unordered { index });
            }
        }

        match (self.candles.last(), self.next_boundary) {
            (None, None) => {}
            (Some(latest), Some(boundary)) if boundary == latest.bucket_start + bucket_width() => {
                if let Some(cutoff) = latest.bucket_start.checked_sub_signed(lookback) {
                    if let Some(index) = self.candles.iter().position(|c| c.bucket_start < cutoff) {
                        return Err(StateError::OutsideLookback { index });
                    }
                }
            }
            _ => return Err(StateError::BoundaryMismatch),
        }

        Ok(())
    }
}

/// Ordered candles covering a rolling lookback period
#[derive(Debug, Clone)]
pub struct CandleWindow {
    candles: VecDeque<Candle>,
    lookback: Duration,
    next_boundary: Option<DateTime<Utc>>,
}

impl CandleWindow {
    pub fn new(lookback: Duration) -> Self {
        Self {
            candles: VecDeque::new(),
            lookback,
            next_boundary: None,
        }
    }

    /// Fold a tick into the window.
    ///
    /// Opens a new candle when there is no current candle or the tick's bucket lies
    /// beyond the next boundary; otherwise widens the current candle.
    pub fn update(&mut self, price: Decimal, time: DateTime<Utc>) {
        let bucket_start = normalize(time);

        let opens_bucket = match (self.candles.back(), self.next_boundary) {
            (Some(_), Some(boundary)) => bucket_start > boundary,
            _ => true,
        };

        if !opens_bucket {
            if let Some(current) = self.candles.back_mut() {
                current.widen(price);
            }
            return;
        }

        self.candles.push_back(Candle::open(price, bucket_start));
        // A lookback reaching past the earliest representable time evicts nothing
        if let Some(cutoff) = bucket_start.checked_sub_signed(self.lookback) {
            self.evict(cutoff);
        }
        self.next_boundary = Some(bucket_start + bucket_width());

        debug!(
            bucket_start = %bucket_start,
            price = %price,
            candles = self.candles.len(),
            "Opened candle"
        );
    }

    fn evict(&mut self, cutoff: DateTime<Utc>) {
        let mut evicted = 0;
        while self
            .candles
            .front()
            .is_some_and(|c| c.bucket_start < cutoff)
        {
            self.candles.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, cutoff = %cutoff, "Evicted candles outside lookback");
        }
    }

    /// Highest high across retained candles
    pub fn highest(&self) -> Option<Decimal> {
        self.candles.iter().map(|c| c.high).max()
    }

    /// Lowest low across retained candles
    pub fn lowest(&self) -> Option<Decimal> {
        self.candles.iter().map(|c| c.low).min()
    }

    pub fn oldest_bucket_start(&self) -> Option<DateTime<Utc>> {
        self.candles.front().map(|c| c.bucket_start)
    }

    pub fn next_boundary(&self) -> Option<DateTime<Utc>> {
        self.next_boundary
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Drop all history so the range must rebuild from scratch
    pub fn reset(&mut self) {
        self.candles.clear();
        self.next_boundary = None;
    }

    pub fn snapshot(&self) -> WindowState {
        WindowState {
            candles: self.candles.iter().copied().collect(),
            next_boundary: self.next_boundary,
        }
    }

    /// Replace contents with a checkpoint. The window is untouched if the
    /// checkpoint is invalid.
    pub fn restore(&mut self, state: WindowState) -> Result<(), StateError> {
        state.validate(self.lookback)?;
        self.candles = state.candles.into();
        self.next_boundary = state.next_boundary;
        Ok(())
    }
}
