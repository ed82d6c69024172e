//! Range Breakout Agent
//!
//! Detects breakouts from tight price ranges on a single instrument's tick stream,
//! raises actionable notifications, and places trailing-stop market orders when
//! the user accepts one. All time flows in through the ticks, so live runs and
//! replays behave identically, and the detector window can be checkpointed to
//! resume mid-range.

pub mod agent;
pub mod broker;
pub mod config;
pub mod data;
pub mod error;
pub mod notify;
pub mod state_manager;
pub mod strategies;
pub mod types;

pub use agent::{ActionOutcome, Agent, BreakoutAgent};
pub use config::Config;
pub use types::*;
