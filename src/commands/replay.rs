//! Replay command implementation
//!
//! Feeds recorded ticks through a breakout agent backed by the paper broker,
//! optionally resuming from and writing back to the checkpoint store.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use range_breakout_agent::broker::PaperBroker;
use range_breakout_agent::state_manager::{create_state_manager, Checkpoint};
use range_breakout_agent::strategies::range_breakout::BreakoutState;
use range_breakout_agent::{data, Action, ActionOutcome, Agent, BreakoutAgent, Config};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{info, warn};

#[derive(Debug, Default)]
struct ReplaySummary {
    processed: usize,
    skipped: usize,
    break_high: usize,
    break_low: usize,
    orders_placed: usize,
    orders_failed: usize,
}

impl ReplaySummary {
    fn record(&mut self, state: BreakoutState) {
        self.processed += 1;
        match state {
            BreakoutState::BreakHigh => self.break_high += 1,
            BreakoutState::BreakLow => self.break_low += 1,
            BreakoutState::NoSignal => {}
        }
    }

    fn record_outcome(&mut self, outcome: &ActionOutcome) {
        if outcome.is_placed() {
            self.orders_placed += 1;
        } else {
            self.orders_failed += 1;
        }
    }
}

pub fn run(
    config_path: String,
    ticks_path: String,
    resume: bool,
    checkpoint_every: Option<usize>,
    auto_act: bool,
) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(run_async(
        config_path,
        ticks_path,
        resume,
        checkpoint_every,
        auto_act,
    ))
}

async fn run_async(
    config_path: String,
    ticks_path: String,
    resume: bool,
    checkpoint_every: Option<usize>,
    auto_act: bool,
) -> Result<()> {
    info!("Starting replay");

    let config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    let ticks = data::load_ticks(&ticks_path)?;

    let state = create_state_manager(&config.state.state_dir, config.state.auto_backup)?;
    let broker = Arc::new(PaperBroker::new());
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
    let (message_tx, mut message_rx) = mpsc::unbounded_channel();

    let mut agent = BreakoutAgent::new(config.agent, broker, notify_tx, message_tx)?;
    let instrument = agent.instrument().as_str().to_owned();

    let mut last_tick: Option<DateTime<Utc>> = None;
    if resume {
        match state.load_checkpoint(&instrument)? {
            Some(ckpt) => {
                agent
                    .restore_state(ckpt.state)
                    .context("Checkpoint does not fit the configured lookback")?;
                last_tick = ckpt.last_tick;
                info!("Resuming {} after {:?}", instrument, last_tick);
            }
            None => warn!("No checkpoint for {}, starting from an empty window", instrument),
        }
    }
    let resume_after = last_tick;

    let save = |agent: &BreakoutAgent, last_tick: Option<DateTime<Utc>>| {
        state.save_checkpoint(&Checkpoint {
            instrument: instrument.clone(),
            saved_at: Utc::now(),
            last_tick,
            state: agent.serialize_state(),
        })
    };

    let mut summary = ReplaySummary::default();
    let mut in_flight = JoinSet::new();

    for tick in &ticks {
        if resume_after.is_some_and(|t| tick.time <= t) {
            summary.skipped += 1;
            continue;
        }

        let Some(result) = agent.on_tick(tick) else {
            continue;
        };
        summary.record(result.state);
        last_tick = Some(tick.time);

        while let Ok(notification) = notify_rx.try_recv() {
            info!("ALERT: {}", notification.message);
            if !auto_act {
                continue;
            }
            let action = notification
                .actions
                .first()
                .and_then(|a| a.action_id.parse::<Action>().ok());
            if let Some(action) = action {
                in_flight.spawn(agent.on_action(action));
            }
        }

        if let Some(every) = checkpoint_every.filter(|n| *n > 0) {
            if summary.processed % every == 0 {
                save(&agent, last_tick)?;
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        let outcome = joined.context("Action task failed")?;
        summary.record_outcome(&outcome);
    }

    while let Ok(message) = message_rx.try_recv() {
        if message.is_error() {
            warn!("{}", message.text);
        } else {
            info!("{}", message.text);
        }
    }

    save(&agent, last_tick)?;

    println!("\n{}", "=".repeat(60));
    println!("REPLAY RESULTS ({} on {})", agent.config().name, instrument);
    println!("{}", "=".repeat(60));
    println!("Ticks Processed:    {}", summary.processed);
    println!("Ticks Skipped:      {}", summary.skipped);
    println!("Breaks High:        {}", summary.break_high);
    println!("Breaks Low:         {}", summary.break_low);
    println!("Orders Placed:      {}", summary.orders_placed);
    println!("Orders Failed:      {}", summary.orders_failed);
    println!("Candles Retained:   {}", agent.detector().window().len());
    println!("{}", "=".repeat(60));

    info!("Replay completed successfully");

    Ok(())
}
