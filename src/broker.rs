//! Broker capability
//!
//! The agent only ever places market orders with a trailing stop. Anything that can
//! accept such a request implements [`Broker`]; [`PaperBroker`] fills everything in
//! memory for replays and tests.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

use crate::error::OrderError;
use crate::types::{Instrument, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub instrument: Instrument,
    pub side: Side,
    #[serde(with = "rust_decimal::serde::str")]
    pub units: Decimal,
    pub order_type: OrderType,
    pub trailing_stop_pips: u32,
}

impl OrderRequest {
    pub fn market(
        instrument: Instrument,
        side: Side,
        units: Decimal,
        trailing_stop_pips: u32,
    ) -> Self {
        Self {
            instrument,
            side,
            units,
            order_type: OrderType::Market,
            trailing_stop_pips,
        }
    }

    /// Units with the broker sign convention: positive buys, negative sells
    pub fn signed_units(&self) -> Decimal {
        match self.side {
            Side::Buy => self.units,
            Side::Sell => -self.units,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    /// Human-readable confirmation supplied by the broker, if any
    pub message: Option<String>,
}

#[async_trait]
pub trait Broker: Send + Sync {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, OrderError>;
}

/// In-memory broker that accepts every order unless armed to reject the next one
#[derive(Debug, Default)]
pub struct PaperBroker {
    orders: Mutex<Vec<OrderRequest>>,
    counter: AtomicU64,
    reject_next: Mutex<Option<String>>,
    silent: AtomicBool,
}

impl PaperBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next order with the given reason
    pub fn reject_next(&self, reason: impl Into<String>) {
        if let Ok(mut slot) = self.reject_next.lock() {
            *slot = Some(reason.into());
        }
    }

    /// Acknowledge orders without a confirmation message
    pub fn without_messages(self) -> Self {
        self.silent.store(true, Ordering::Relaxed);
        self
    }

    /// Orders accepted so far
    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders
            .lock()
            .map(|orders| orders.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, OrderError> {
        let rejection = self
            .reject_next
            .lock()
            .map_err(|_| OrderError::Transport("paper broker state poisoned".to_string()))?
            .take();
        if let Some(reason) = rejection {
            return Err(OrderError::Rejected(reason));
        }

        self.orders
            .lock()
            .map_err(|_| OrderError::Transport("paper broker state poisoned".to_string()))?
            .push(request.clone());

        let id = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let order_id = format!("paper-{}", id);
        debug!(
            order_id = %order_id,
            instrument = %request.instrument,
            units = %request.signed_units(),
            trailing_stop_pips = request.trailing_stop_pips,
            "Paper order filled"
        );

        let message = if self.silent.load(Ordering::Relaxed) {
            None
        } else {
            Some(format!(
                "Paper {} order {} filled: {} units of {}",
                request.side, order_id, request.units, request.instrument
            ))
        };

        Ok(OrderAck { order_id, message })
    }
}
