//! Tick data loading
//!
//! Loads recorded quotes from CSV for replaying through the agent. Expected
//! header: `timestamp,instrument,bid,ask`. Consecutive rows sharing a timestamp are
//! merged into one [`Tick`].

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::path::Path;
use tracing::{info, warn};

use crate::{Instrument, Quote, Tick};

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Try parsing without timezone and assume UTC
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
        })
        .context(format!("Failed to parse timestamp: {}", value))
}

fn parse_decimal(value: Option<&str>, column: &str) -> Result<Decimal> {
    let raw = value.context(format!("Missing {} column", column))?;
    raw.trim()
        .parse::<Decimal>()
        .context(format!("Failed to parse {}: {}", column, raw))
}

/// Load ticks from a CSV file
pub fn load_ticks(path: impl AsRef<Path>) -> Result<Vec<Tick>> {
    let reader = csv::Reader::from_path(path.as_ref()).context("Failed to open tick CSV file")?;
    let ticks = read_ticks(reader)?;
    info!(
        "Loaded {} ticks from {}",
        ticks.len(),
        path.as_ref().display()
    );
    Ok(ticks)
}

/// Read ticks from any CSV source
pub fn read_ticks<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<Tick>> {
    let mut ticks: Vec<Tick> = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.context(format!("Failed to read row {}", row_idx + 1))?;

        let time = parse_timestamp(record.get(0).context("Missing timestamp column")?.trim())?;
        let instrument = record
            .get(1)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .context(format!("Missing instrument on row {}", row_idx + 1))?;
        let bid = parse_decimal(record.get(2), "bid")?;
        let ask = parse_decimal(record.get(3), "ask")?;

        if let Some(previous) = ticks.last() {
            if time < previous.time {
                warn!(
                    row = row_idx + 1,
                    "Tick timestamp goes backwards ({} < {})", time, previous.time
                );
            }
        }

        let instrument = Instrument::new(instrument);
        if let Some(last) = ticks.last_mut().filter(|t| t.time == time) {
            last.prices.insert(instrument, Quote { bid, ask });
        } else {
            ticks.push(Tick::new(time).with_quote(instrument, bid, ask));
        }
    }

    Ok(ticks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn reader(data: &str) -> csv::Reader<&[u8]> {
        csv::Reader::from_reader(data.as_bytes())
    }

    #[test]
    fn test_read_ticks_merges_same_timestamp() {
        let data = "timestamp,instrument,bid,ask\n\
                    2024-01-02T09:00:00Z,EUR_USD,1.1000,1.1002\n\
                    2024-01-02T09:00:00Z,USD_JPY,145.10,145.12\n\
                    2024-01-02 09:00:05,EUR_USD,1.1001,1.1003\n";
        let ticks = read_ticks(reader(data)).unwrap();

        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].prices.len(), 2);
        assert_eq!(ticks[0].bid(&Instrument::new("USD_JPY")), Some(dec!(145.10)));
        assert_eq!(ticks[1].bid(&Instrument::new("EUR_USD")), Some(dec!(1.1001)));
    }

    #[test]
    fn test_read_ticks_rejects_bad_price() {
        let data = "timestamp,instrument,bid,ask\n2024-01-02T09:00:00Z,EUR_USD,abc,1.1\n";
        assert!(read_ticks(reader(data)).is_err());
    }

    #[test]
    fn test_read_ticks_rejects_bad_timestamp() {
        let data = "timestamp,instrument,bid,ask\nyesterday,EUR_USD,1.1,1.1\n";
        assert!(read_ticks(reader(data)).is_err());
    }
}
