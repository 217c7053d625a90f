//! Time-of-week risk multiplier and trading session label.
//!
//! Both are deterministic functions of a UTC timestamp.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use luma_domain::InstrumentClass;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seasonality multiplier with a human-readable note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seasonality {
    pub multiplier: Decimal,
    pub note: String,
}

/// Friday 20:00 UTC through Sunday 21:59 UTC.
fn is_weekend(now: DateTime<Utc>) -> bool {
    let hour = now.hour();
    match now.weekday() {
        Weekday::Fri => hour >= 20,
        Weekday::Sat => true,
        Weekday::Sun => hour < 22,
        _ => false,
    }
}

/// Risk multiplier for `class` at `now`.
///
/// | window                         | multiplier                  |
/// |--------------------------------|-----------------------------|
/// | weekend (Fri 20:00–Sun 22:00)  | trend ×0.8, volatile ×1.1   |
/// | 13:00–16:00 overlap            | ×1.2                        |
/// | 17:00–18:00 lunch lull         | ×0.7                        |
/// | minute 0–10 or 30–40           | ×1.1 on top of the above    |
pub fn seasonality(class: InstrumentClass, now: DateTime<Utc>) -> Seasonality {
    let hour = now.hour();
    let minute = now.minute();

    let (mut multiplier, mut note) = if is_weekend(now) {
        match class {
            InstrumentClass::TrendFollowing => (dec!(0.8), "Weekend Hold".to_string()),
            InstrumentClass::HighVolatility => (dec!(1.1), "Weekend Degen".to_string()),
        }
    } else if (13..16).contains(&hour) {
        (dec!(1.2), "NY/London Overlap".to_string())
    } else if (17..18).contains(&hour) {
        (dec!(0.7), "NY Lunch Lull".to_string())
    } else {
        (Decimal::ONE, "Standard".to_string())
    };

    if minute <= 10 || (30..=40).contains(&minute) {
        multiplier *= dec!(1.1);
        note = if note == "Standard" {
            "Micro-Burst".to_string()
        } else {
            format!("{note} + Micro-Burst")
        };
    }

    Seasonality { multiplier, note }
}

// =============================================================================
// Trading Session
// =============================================================================

/// Liquidity session by UTC hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradingSession {
    /// 21:00–07:00
    Asia,
    /// 07:00–13:00
    London,
    /// 13:00–21:00
    NewYork,
}

impl TradingSession {
    /// Session active at `now`
    pub fn at(now: DateTime<Utc>) -> Self {
        match now.hour() {
            7..=12 => TradingSession::London,
            13..=20 => TradingSession::NewYork,
            _ => TradingSession::Asia,
        }
    }
}

impl fmt::Display for TradingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingSession::Asia => write!(f, "ASIA"),
            TradingSession::London => write!(f, "LONDON"),
            TradingSession::NewYork => write!(f, "NEW_YORK"),
        }
    }
}
