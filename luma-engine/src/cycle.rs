//! Market cycle filter.
//!
//! Compares the benchmark's last daily close with its 200-close SMA and
//! returns a sizing multiplier. Disabled unless configured.

use luma_domain::{Candle, Instrument};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EngineError, EngineResult};
use crate::indicators::{closes, sma};

/// Cycle filter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleConfig {
    pub enabled: bool,
    /// Benchmark instrument (daily candles), required when enabled
    pub benchmark: Option<Instrument>,
    pub sma_period: usize,
    pub bull_multiplier: Decimal,
    pub bear_multiplier: Decimal,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            benchmark: None,
            sma_period: 200,
            bull_multiplier: dec!(1.5),
            bear_multiplier: dec!(0.5),
        }
    }
}

impl CycleConfig {
    /// Enabled filter on `benchmark` with the default multipliers.
    pub fn on(benchmark: Instrument) -> Self {
        Self {
            enabled: true,
            benchmark: Some(benchmark),
            ..Self::default()
        }
    }

    /// Benchmark to read this tick, `None` when the filter is off
    pub fn active_benchmark(&self) -> Option<&Instrument> {
        self.benchmark.as_ref().filter(|_| self.enabled)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.enabled && self.benchmark.is_none() {
            return Err(EngineError::invalid("cycle filter enabled without a benchmark"));
        }
        if self.sma_period == 0 {
            return Err(EngineError::invalid("cycle sma_period must be positive"));
        }
        if self.bull_multiplier <= Decimal::ZERO || self.bear_multiplier <= Decimal::ZERO {
            return Err(EngineError::invalid("cycle multipliers must be positive"));
        }
        Ok(())
    }
}

/// Market phase of the benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CyclePhase {
    Bull,
    Bear,
    Neutral,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CyclePhase::Bull => write!(f, "BULL"),
            CyclePhase::Bear => write!(f, "BEAR"),
            CyclePhase::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Phase with its multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CycleReading {
    pub phase: CyclePhase,
    pub multiplier: Decimal,
}

impl CycleReading {
    /// No opinion
    pub const NEUTRAL: CycleReading = CycleReading {
        phase: CyclePhase::Neutral,
        multiplier: Decimal::ONE,
    };
}

/// Classify daily benchmark candles. Short history is neutral.
pub fn classify_cycle(config: &CycleConfig, daily: &[Candle]) -> CycleReading {
    let closes = closes(daily);
    let (Some(last), Some(average)) = (closes.last(), sma(&closes, config.sma_period)) else {
        return CycleReading::NEUTRAL;
    };

    if *last > average {
        CycleReading {
            phase: CyclePhase::Bull,
            multiplier: config.bull_multiplier,
        }
    } else {
        CycleReading {
            phase: CyclePhase::Bear,
            multiplier: config.bear_multiplier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn daily(closes: impl IntoIterator<Item = Decimal>) -> Vec<Candle> {
        closes
            .into_iter()
            .map(|c| Candle::new(c, c, c, c, dec!(1), Utc::now()))
            .collect()
    }

    fn config() -> CycleConfig {
        CycleConfig::on(Instrument::new("BTC").unwrap())
    }

    #[test]
    fn test_short_history_is_neutral() {
        let reading = classify_cycle(&config(), &daily(vec![dec!(100); 199]));
        assert_eq!(reading, CycleReading::NEUTRAL);
    }

    #[test]
    fn test_bull_and_bear() {
        let mut up = vec![dec!(100); 199];
        up.push(dec!(150));
        let reading = classify_cycle(&config(), &daily(up));
        assert_eq!(reading.phase, CyclePhase::Bull);
        assert_eq!(reading.multiplier, dec!(1.5));

        let mut down = vec![dec!(100); 199];
        down.push(dec!(50));
        let reading = classify_cycle(&config(), &daily(down));
        assert_eq!(reading.phase, CyclePhase::Bear);
        assert_eq!(reading.multiplier, dec!(0.5));
    }

    #[test]
    fn test_enabled_needs_benchmark() {
        let off = CycleConfig::default();
        assert!(off.validate().is_ok());
        assert!(off.active_benchmark().is_none());

        let broken = CycleConfig { enabled: true, ..CycleConfig::default() };
        assert!(broken.validate().is_err());

        let on = config();
        assert!(on.validate().is_ok());
        assert_eq!(on.active_benchmark().map(|i| i.as_str()), Some("BTC"));
    }
}
