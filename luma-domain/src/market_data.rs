//! Market Data Types
//!
//! Canonical market data types used across Luma.
//! These are exchange-agnostic; adapters normalize into them.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::value_objects::DomainError;

// =============================================================================
// Candle
// =============================================================================

/// OHLCV candlestick data.
///
/// Sequences of candles are always ordered oldest → newest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open price
    pub open: Decimal,
    /// High price
    pub high: Decimal,
    /// Low price
    pub low: Decimal,
    /// Close price
    pub close: Decimal,
    /// Total volume traded
    pub volume: Decimal,
    /// Candle open time
    pub open_time: DateTime<Utc>,
}

impl Candle {
    /// Create a new candle.
    pub fn new(
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
        open_time: DateTime<Utc>,
    ) -> Self {
        Self { open, high, low, close, volume, open_time }
    }

    /// Absolute body size |close - open|.
    pub fn body(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    /// Green candle (close above open).
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Red candle (close below open).
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

// =============================================================================
// Candle Interval
// =============================================================================

/// Candle interval supported by the indicator provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandleInterval {
    /// 1 minute
    #[serde(rename = "1m")]
    OneMinute,
    /// 5 minutes
    #[serde(rename = "5m")]
    FiveMinutes,
    /// 15 minutes
    #[serde(rename = "15m")]
    FifteenMinutes,
    /// 1 hour
    #[serde(rename = "1h")]
    OneHour,
    /// 4 hours
    #[serde(rename = "4h")]
    FourHours,
    /// 1 day
    #[serde(rename = "1d")]
    OneDay,
}

impl CandleInterval {
    /// Wire representation (e.g., "15m")
    pub fn as_str(&self) -> &'static str {
        match self {
            CandleInterval::OneMinute => "1m",
            CandleInterval::FiveMinutes => "5m",
            CandleInterval::FifteenMinutes => "15m",
            CandleInterval::OneHour => "1h",
            CandleInterval::FourHours => "4h",
            CandleInterval::OneDay => "1d",
        }
    }

    /// Duration of one candle
    pub fn duration(&self) -> Duration {
        match self {
            CandleInterval::OneMinute => Duration::minutes(1),
            CandleInterval::FiveMinutes => Duration::minutes(5),
            CandleInterval::FifteenMinutes => Duration::minutes(15),
            CandleInterval::OneHour => Duration::hours(1),
            CandleInterval::FourHours => Duration::hours(4),
            CandleInterval::OneDay => Duration::days(1),
        }
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandleInterval {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" => Ok(CandleInterval::OneMinute),
            "5m" => Ok(CandleInterval::FiveMinutes),
            "15m" => Ok(CandleInterval::FifteenMinutes),
            "1h" => Ok(CandleInterval::OneHour),
            "4h" => Ok(CandleInterval::FourHours),
            "1d" => Ok(CandleInterval::OneDay),
            other => Err(DomainError::InvalidInterval(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_candle_body_and_color() {
        let green = Candle::new(dec!(10), dec!(12), dec!(9), dec!(11.5), dec!(100), Utc::now());
        assert_eq!(green.body(), dec!(1.5));
        assert!(green.is_bullish());

        let red = Candle::new(dec!(10), dec!(10.5), dec!(8), dec!(8.5), dec!(100), Utc::now());
        assert_eq!(red.body(), dec!(1.5));
        assert!(red.is_bearish());
    }

    #[test]
    fn test_interval_roundtrip() {
        for s in ["1m", "5m", "15m", "1h", "4h", "1d"] {
            let interval: CandleInterval = s.parse().unwrap();
            assert_eq!(interval.as_str(), s);
        }
        assert!("2h".parse::<CandleInterval>().is_err());
        assert_eq!(CandleInterval::FifteenMinutes.duration(), Duration::minutes(15));
    }
}
