//! Breakout agent
//!
//! Drives a [`RangeBreakoutDetector`] from the host's tick feed, raises a
//! notification for every confirmed breakout, and turns the user's answer into a
//! market order against the broker.
//!
//! Ticks are processed strictly in order through `&mut self`. Actions run on a
//! detached future that owns clones of everything it needs, so the host can keep
//! feeding ticks while an order is in flight.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};

use crate::broker::{Broker, OrderRequest};
use crate::config::AgentConfig;
use crate::error::{ConfigError, StateError};
use crate::notify::{push, Message, Notification, NotificationAction};
use crate::strategies::range_breakout::{
    BreakoutState, ClassificationResult, RangeBreakoutDetector, WindowState,
};
use crate::types::{Action, Instrument, Tick};

pub type ActionFuture = Pin<Box<dyn Future<Output = ActionOutcome> + Send + 'static>>;

/// Lifecycle hooks the host invokes. The host holds the agent only through this
/// interface.
pub trait Agent {
    /// Classify one tick. Returns `None` when the tick carries no price for the
    /// agent's instrument.
    fn on_tick(&mut self, tick: &Tick) -> Option<ClassificationResult>;

    fn on_action(&self, action: Action) -> ActionFuture;

    fn serialize_state(&self) -> WindowState;

    /// Startup only. Never call while ticks or actions are being processed.
    fn restore_state(&mut self, state: WindowState) -> Result<(), StateError>;
}

/// Result of executing a user action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Placed { order_id: String, message: Message },
    Failed { message: Message },
}

impl ActionOutcome {
    pub fn message(&self) -> &Message {
        match self {
            ActionOutcome::Placed { message, .. } | ActionOutcome::Failed { message } => message,
        }
    }

    pub fn is_placed(&self) -> bool {
        matches!(self, ActionOutcome::Placed { .. })
    }
}

/// Everything needed to execute an action, detached from the tick path
#[derive(Clone)]
struct ActionDispatcher {
    agent_name: String,
    instrument: Instrument,
    units: Decimal,
    trailing_stop_pips: u32,
    broker: Arc<dyn Broker>,
    messages: UnboundedSender<Message>,
}

impl ActionDispatcher {
    async fn execute(self, action: Action) -> ActionOutcome {
        let side = action.side();
        let request =
            OrderRequest::market(self.instrument.clone(), side, self.units, self.trailing_stop_pips);

        info!(
            instrument = %self.instrument,
            side = %side,
            units = %self.units,
            trailing_stop_pips = self.trailing_stop_pips,
            "Placing market order"
        );

        // Never retried: a second attempt would duplicate the trade
        let outcome = match self.broker.place_order(&request).await {
            Ok(ack) => {
                let detail = ack
                    .message
                    .unwrap_or_else(|| format!("{} order placed for {}", side, self.instrument));
                info!(order_id = %ack.order_id, "Order placed");
                ActionOutcome::Placed {
                    order_id: ack.order_id,
                    message: Message::info(format!("{}: {}", self.agent_name, detail)),
                }
            }
            Err(err) => {
                error!(
                    instrument = %self.instrument,
                    side = %side,
                    error = %err,
                    "Order placement failed"
                );
                ActionOutcome::Failed {
                    message: Message::quiet_error(format!(
                        "{} ({}): failed to place {} order",
                        self.agent_name, self.instrument, side
                    )),
                }
            }
        };

        push(&self.messages, outcome.message().clone(), "messages");
        outcome
    }
}

pub struct BreakoutAgent {
    config: AgentConfig,
    instrument: Instrument,
    detector: RangeBreakoutDetector,
    notifications: UnboundedSender<Notification>,
    dispatcher: ActionDispatcher,
}

impl BreakoutAgent {
    pub fn new(
        config: AgentConfig,
        broker: Arc<dyn Broker>,
        notifications: UnboundedSender<Notification>,
        messages: UnboundedSender<Message>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let detector = RangeBreakoutDetector::new(config.detector_config())?;
        let instrument = config.instrument();

        let dispatcher = ActionDispatcher {
            agent_name: config.name.clone(),
            instrument: instrument.clone(),
            units: config.trade_size,
            trailing_stop_pips: config.trailing_stop_pips,
            broker,
            messages,
        };

        info!(
            agent = %config.name,
            instrument = %instrument,
            lookback_minutes = config.lookback_minutes,
            range_threshold_pips = %config.range_threshold_pips,
            pip_size = %config.pip_size(),
            "Breakout agent created"
        );

        Ok(Self {
            config,
            instrument,
            detector,
            notifications,
            dispatcher,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn detector(&self) -> &RangeBreakoutDetector {
        &self.detector
    }

    fn alert(&self, result: &ClassificationResult) -> Option<Notification> {
        let (direction, action) = match result.state {
            BreakoutState::NoSignal => return None,
            BreakoutState::BreakHigh => ("above", Action::Buy),
            BreakoutState::BreakLow => ("below", Action::Sell),
        };

        Some(Notification {
            message: format!(
                "{} broke {} its range at {} ({}). {}?",
                self.instrument,
                direction,
                result.price,
                result.time.format("%Y-%m-%d %H:%M:%S UTC"),
                action.label()
            ),
            actions: vec![NotificationAction::from(action)],
        })
    }
}

impl Agent for BreakoutAgent {
    fn on_tick(&mut self, tick: &Tick) -> Option<ClassificationResult> {
        let Some(price) = tick.bid(&self.instrument) else {
            debug!(instrument = %self.instrument, time = %tick.time, "Tick has no price for instrument");
            return None;
        };

        let result = self.detector.classify(price, tick.time);
        if let Some(notification) = self.alert(&result) {
            push(&self.notifications, notification, "notifications");
        }
        Some(result)
    }

    fn on_action(&self, action: Action) -> ActionFuture {
        Box::pin(self.dispatcher.clone().execute(action))
    }

    fn serialize_state(&self) -> WindowState {
        self.detector.snapshot()
    }

    fn restore_state(&mut self, state: WindowState) -> Result<(), StateError> {
        let candles = state.candles.len();
        self.detector.restore(state)?;
        info!(instrument = %self.instrument, candles, "Window restored from checkpoint");
        Ok(())
    }
}
