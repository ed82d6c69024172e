// State Manager for checkpoint continuity
// SQLite-based persistence with JSON backup
//
// Stores the detector window per instrument so a restarted process or a resumed
// backtest continues mid-range instead of rebuilding history.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::strategies::range_breakout::WindowState;

// =============================================================================
// Data Models
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub instrument: String,
    pub saved_at: DateTime<Utc>,
    /// Timestamp of the last tick folded into the window
    pub last_tick: Option<DateTime<Utc>>,
    pub state: WindowState,
}

// =============================================================================
// State Manager Implementation
// =============================================================================

pub struct SqliteStateManager {
    conn: Arc<Mutex<Connection>>,
    json_backup_path: PathBuf,
    auto_backup: bool,
}

impl SqliteStateManager {
    pub fn new<P: AsRef<Path>>(db_path: P, json_backup_path: P, auto_backup: bool) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if let Some(parent) = json_backup_path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

        conn.pragma_update(None, "journal_mode", "WAL")?;

        let manager = Self {
            conn: Arc::new(Mutex::new(conn)),
            json_backup_path: json_backup_path.as_ref().to_path_buf(),
            auto_backup,
        };

        manager.create_tables()?;
        info!("SQLite state manager initialized");

        Ok(manager)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("State database lock poisoned"))
    }

    fn create_tables(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                instrument TEXT NOT NULL,
                saved_at TEXT NOT NULL,
                last_tick TEXT,
                state_json TEXT NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_checkpoints_instrument ON checkpoints(instrument)",
            [],
        )?;

        debug!("Database schema created/verified");
        Ok(())
    }

    pub fn save_checkpoint(&self, ckpt: &Checkpoint) -> Result<()> {
        let conn = self.lock()?;
        let state_json = ckpt.state.to_json()?;

        conn.execute(
            "INSERT INTO checkpoints (instrument, saved_at, last_tick, state_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                ckpt.instrument,
                ckpt.saved_at.to_rfc3339(),
                ckpt.last_tick.map(|t| t.to_rfc3339()),
                state_json,
            ],
        )?;

        debug!(
            "Checkpoint saved: {} candles={} last_tick={:?}",
            ckpt.instrument,
            ckpt.state.candles.len(),
            ckpt.last_tick
        );

        if self.auto_backup {
            drop(conn);
            self.export_json()?;
        }

        Ok(())
    }

    /// Latest checkpoint for an instrument. A stored checkpoint that cannot be
    /// decoded is an error, never an empty window.
    pub fn load_checkpoint(&self, instrument: &str) -> Result<Option<Checkpoint>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT instrument, saved_at, last_tick, state_json FROM checkpoints
                 WHERE instrument = ?1 ORDER BY id DESC LIMIT 1",
                params![instrument],
                read_row,
            )
            .optional()?;

        let Some(row) = row else {
            debug!("No checkpoint found for {}", instrument);
            return Ok(None);
        };

        let ckpt = decode_row(row)?;
        debug!(
            "Loaded checkpoint: {} candles={} saved_at={}",
            ckpt.instrument,
            ckpt.state.candles.len(),
            ckpt.saved_at
        );
        Ok(Some(ckpt))
    }

    pub fn instruments(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT instrument FROM checkpoints ORDER BY instrument")?;
        let instruments = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(instruments)
    }

    /// Write the latest checkpoint of every instrument to the JSON backup.
    /// Rows that no longer decode are left out of the backup.
    pub fn export_json(&self) -> Result<()> {
        let rows = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(
                "SELECT instrument, saved_at, last_tick, state_json FROM checkpoints
                 WHERE id IN (SELECT MAX(id) FROM checkpoints GROUP BY instrument)
                 ORDER BY instrument",
            )?;
            let rows = stmt
                .query_map([], read_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let checkpoints = rows
            .into_iter()
            .filter_map(|row| {
                let instrument = row.0.clone();
                decode_row(row)
                    .map_err(|e| warn!("Skipping checkpoint for {} in backup: {:#}", instrument, e))
                    .ok()
            })
            .collect::<Vec<_>>();

        let state = serde_json::json!({
            "exported_at": Utc::now().to_rfc3339(),
            "checkpoints": checkpoints,
        });

        std::fs::write(&self.json_backup_path, serde_json::to_string_pretty(&state)?)?;
        debug!("State exported to: {}", self.json_backup_path.display());
        Ok(())
    }
}

/// instrument, saved_at, last_tick, state_json
type CheckpointRow = (String, String, Option<String>, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CheckpointRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_row((instrument, saved_at, last_tick, state_json): CheckpointRow) -> Result<Checkpoint> {
    Ok(Checkpoint {
        saved_at: parse_time(&saved_at)?,
        last_tick: last_tick.as_deref().map(parse_time).transpose()?,
        state: WindowState::from_json(&state_json)
            .with_context(|| format!("Corrupt checkpoint for {}", instrument))?,
        instrument,
    })
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("Invalid stored timestamp: {}", value))
}

// =============================================================================
// Factory Function
// =============================================================================

pub fn create_state_manager<P: AsRef<Path>>(
    state_dir: P,
    auto_backup: bool,
) -> Result<SqliteStateManager> {
    let state_dir = state_dir.as_ref();
    std::fs::create_dir_all(state_dir)?;

    let db_path = state_dir.join("breakout_state.db");
    let json_path = state_dir.join("breakout_state.json");

    SqliteStateManager::new(db_path, json_path, auto_backup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::range_breakout::Candle;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn temp_state_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "range_breakout_{}_{}_{}",
            name,
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn checkpoint(instrument: &str, high: rust_decimal::Decimal) -> Checkpoint {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        Checkpoint {
            instrument: instrument.to_string(),
            saved_at: start + Duration::minutes(7),
            last_tick: Some(start + Duration::minutes(6)),
            state: WindowState {
                candles: vec![Candle {
                    high,
                    low: dec!(1.1000),
                    bucket_start: start,
                }],
                next_boundary: Some(start + Duration::minutes(5)),
            },
        }
    }

    #[test]
    fn test_checkpoint_round_trip_returns_latest() {
        let dir = temp_state_dir("round_trip");
        let manager = create_state_manager(&dir, true).unwrap();

        assert_eq!(manager.load_checkpoint("EUR_USD").unwrap(), None);

        manager.save_checkpoint(&checkpoint("EUR_USD", dec!(1.1010))).unwrap();
        manager.save_checkpoint(&checkpoint("EUR_USD", dec!(1.1025))).unwrap();
        manager.save_checkpoint(&checkpoint("USD_JPY", dec!(1.2000))).unwrap();

        let loaded = manager.load_checkpoint("EUR_USD").unwrap().unwrap();
        assert_eq!(loaded, checkpoint("EUR_USD", dec!(1.1025)));
        assert_eq!(manager.instruments().unwrap(), vec!["EUR_USD", "USD_JPY"]);

        let backup = std::fs::read_to_string(dir.join("breakout_state.json")).unwrap();
        assert!(backup.contains("USD_JPY"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_checkpoint_is_an_error() {
        let dir = temp_state_dir("corrupt");
        let manager = create_state_manager(&dir, false).unwrap();
        {
            let conn = manager.lock().unwrap();
            conn.execute(
                "INSERT INTO checkpoints (instrument, saved_at, state_json)
                 VALUES ('EUR_USD', '2024-01-02T09:00:00+00:00', '{not json')",
                [],
            )
            .unwrap();
        }

        assert!(manager.load_checkpoint("EUR_USD").is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_row_does_not_fail_other_saves() {
        let dir = temp_state_dir("backup_skip");
        let manager = create_state_manager(&dir, true).unwrap();
        {
            let conn = manager.lock().unwrap();
            conn.execute(
                "INSERT INTO checkpoints (instrument, saved_at, state_json)
                 VALUES ('USD_JPY', '2024-01-02T09:00:00+00:00', '{not json')",
                [],
            )
            .unwrap();
        }

        manager.save_checkpoint(&checkpoint("EUR_USD", dec!(1.1010))).unwrap();

        let backup: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("breakout_state.json")).unwrap())
                .unwrap();
        let exported = backup["checkpoints"].as_array().unwrap();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0]["instrument"], "EUR_USD");

        std::fs::remove_dir_all(&dir).ok();
    }
}
