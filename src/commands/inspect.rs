//! Inspect command implementation

use anyhow::Result;
use range_breakout_agent::state_manager::create_state_manager;
use tracing::info;

pub fn run(state_dir: String, instrument: Option<String>) -> Result<()> {
    let state = create_state_manager(&state_dir, false)?;

    let instruments = match instrument {
        Some(instrument) => vec![instrument],
        None => state.instruments()?,
    };
    if instruments.is_empty() {
        anyhow::bail!("No checkpoints stored in {}", state_dir);
    }

    for instrument in instruments {
        match state.load_checkpoint(&instrument)? {
            Some(ckpt) => println!("{}", serde_json::to_string_pretty(&ckpt)?),
            None => info!("No checkpoint for {}", instrument),
        }
    }

    Ok(())
}
