//! Core data types shared by the detector, the agent and the replay tooling

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Instrument symbol using Arc<str> for cheap cloning
///
/// Instruments are cloned into every order request and notification, so the
/// backing string is shared rather than reallocated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instrument(#[serde(with = "arc_str_serde")] std::sync::Arc<str>);

mod arc_str_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.as_str()))
    }
}

impl Instrument {
    pub fn new(s: impl AsRef<str>) -> Self {
        Instrument(std::sync::Arc::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Quote currency for `BASE_QUOTE` / `BASEQUOTE` style symbols
    pub fn quote_currency(&self) -> &str {
        match self.0.rsplit_once(['_', '/']) {
            Some((_, quote)) => quote,
            None => self
                .0
                .get(self.0.len().saturating_sub(3)..)
                .unwrap_or(&self.0),
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Top of book for one instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    #[serde(with = "rust_decimal::serde::str")]
    pub bid: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub ask: Decimal,
}

/// One timestamped price update from the host feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub prices: HashMap<Instrument, Quote>,
    pub time: DateTime<Utc>,
}

impl Tick {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            prices: HashMap::new(),
            time,
        }
    }

    pub fn with_quote(mut self, instrument: Instrument, bid: Decimal, ask: Decimal) -> Self {
        self.prices.insert(instrument, Quote { bid, ask });
        self
    }

    pub fn bid(&self, instrument: &Instrument) -> Option<Decimal> {
        self.prices.get(instrument).map(|q| q.bid)
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// User response to a breakout notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
}

impl Action {
    /// Identifier carried by the notification button
    pub fn id(self) -> &'static str {
        match self {
            Action::Buy => "buy",
            Action::Sell => "sell",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Action::Buy => "Buy",
            Action::Sell => "Sell",
        }
    }

    pub fn side(self) -> Side {
        match self {
            Action::Buy => Side::Buy,
            Action::Sell => Side::Sell,
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Action::Buy),
            "sell" => Ok(Action::Sell),
            other => Err(format!("unknown action id: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_instrument_quote_currency() {
        assert_eq!(Instrument::new("USD_JPY").quote_currency(), "JPY");
        assert_eq!(Instrument::new("EUR/USD").quote_currency(), "USD");
        assert_eq!(Instrument::new("GBPJPY").quote_currency(), "JPY");
    }

    #[test]
    fn test_tick_reads_only_requested_bid() {
        let eur = Instrument::new("EUR_USD");
        let gbp = Instrument::new("GBP_USD");
        let tick = Tick::new(Utc::now()).with_quote(eur.clone(), dec!(1.1000), dec!(1.1002));

        assert_eq!(tick.bid(&eur), Some(dec!(1.1000)));
        assert_eq!(tick.bid(&gbp), None);
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("buy".parse::<Action>(), Ok(Action::Buy));
        assert_eq!(" SELL ".parse::<Action>(), Ok(Action::Sell));
        assert!("hold".parse::<Action>().is_err());
        assert_eq!(Action::Sell.side(), Side::Sell);
    }

    #[test]
    fn test_instrument_serde_is_plain_string() {
        let json = serde_json::to_string(&Instrument::new("EUR_USD")).unwrap();
        assert_eq!(json, "\"EUR_USD\"");
    }
}
