//! Range breakout agent - main entry point
//!
//! This binary provides two subcommands:
//! - replay: Feed recorded ticks through the agent against the paper broker
//! - inspect: Print stored window checkpoints

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "range-breakout-agent")]
#[command(about = "Range breakout detection with replayable checkpoints", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay recorded ticks through the agent
    Replay {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/eur_usd.json")]
        config: String,

        /// Tick CSV file (timestamp,instrument,bid,ask)
        #[arg(short, long)]
        ticks: String,

        /// Resume from the latest stored checkpoint for the instrument
        #[arg(long)]
        resume: bool,

        /// Save a checkpoint every N processed ticks
        #[arg(long)]
        checkpoint_every: Option<usize>,

        /// Answer every breakout notification with its action (paper orders)
        #[arg(long)]
        auto_act: bool,
    },

    /// Print stored checkpoints
    Inspect {
        /// Directory holding the checkpoint database
        #[arg(short, long, default_value = "state")]
        state_dir: String,

        /// Instrument to show (default: all)
        #[arg(short, long)]
        instrument: Option<String>,
    },
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // Log file naming pattern: {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    // Same format as the console, without ANSI colors
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Replay { .. } => "replay",
        Commands::Inspect { .. } => "inspect",
    };

    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::Replay {
            config,
            ticks,
            resume,
            checkpoint_every,
            auto_act,
        } => commands::replay::run(config, ticks, resume, checkpoint_every, auto_act),

        Commands::Inspect {
            state_dir,
            instrument,
        } => commands::inspect::run(state_dir, instrument),
    }
}
