//! Trading Strategies Module
//!
//! Signal detectors driven by the agent.

pub mod range_breakout;
