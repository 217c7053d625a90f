//! Ratchet Stop Logic (Pure Functions)
//!
//! Stepped trailing stop measured in ROE percent. ROE is side-normalized,
//! so "favorable" is always "higher" for both longs and shorts.
//!
//! # Staircase
//!
//! ```text
//! high_water <= breakeven_activation   → hard stop  (-stop_loss_fraction × leverage × 100)
//! high_water >  breakeven_activation   → breakeven floor (SECURED)
//! high_water >  trail_activation       → high_water - gap(high_water)
//! ```
//!
//! Key invariants:
//! - `high_water` never decreases
//! - `stop` never decreases (`max(previous, candidate)`)
//! - once secured, a record stays secured

use crate::value_objects::{Instrument, InstrumentClass, Leverage, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

// =============================================================================
// Staircase
// =============================================================================

/// Trailing gap used from `from_roe` upwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GapTier {
    pub from_roe: Decimal,
    pub gap: Decimal,
}

impl GapTier {
    pub const fn new(from_roe: Decimal, gap: Decimal) -> Self {
        Self { from_roe, gap }
    }
}

/// Which step of the staircase produced a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopStage {
    HardStop,
    Breakeven,
    Trailing,
}

impl StopStage {
    /// Breakeven or better
    pub fn is_secured(&self) -> bool {
        !matches!(self, StopStage::HardStop)
    }
}

/// Stop candidate for a given high-water mark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopLevel {
    pub threshold: Decimal,
    pub stage: StopStage,
}

/// Per-class staircase parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staircase {
    /// Adverse price move (fraction of entry) that triggers the hard stop
    pub stop_loss_fraction: Decimal,
    /// High-water ROE above which the breakeven floor applies
    pub breakeven_activation_roe: Decimal,
    /// Floor ROE once secured (breakeven plus fee buffer)
    pub breakeven_floor_roe: Decimal,
    /// High-water ROE above which the stop trails
    pub trail_activation_roe: Decimal,
    /// Gap tiers, ascending by `from_roe`
    pub gap_tiers: Vec<GapTier>,
}

impl Staircase {
    /// Defaults for trend-following instruments.
    pub fn trend_following() -> Self {
        Self {
            stop_loss_fraction: dec!(0.04),
            breakeven_activation_roe: dec!(1.5),
            breakeven_floor_roe: dec!(0.5),
            trail_activation_roe: dec!(5),
            gap_tiers: vec![
                GapTier::new(dec!(5), dec!(2.0)),
                GapTier::new(dec!(10), dec!(1.5)),
                GapTier::new(dec!(20), dec!(1.0)),
            ],
        }
    }

    /// Defaults for high-volatility instruments.
    pub fn high_volatility() -> Self {
        Self {
            stop_loss_fraction: dec!(0.08),
            breakeven_activation_roe: dec!(2.5),
            breakeven_floor_roe: dec!(0.5),
            trail_activation_roe: dec!(12),
            gap_tiers: vec![
                GapTier::new(dec!(12), dec!(4.0)),
                GapTier::new(dec!(25), dec!(3.0)),
                GapTier::new(dec!(50), dec!(2.0)),
            ],
        }
    }

    /// Defaults for a class.
    pub fn for_class(class: InstrumentClass) -> Self {
        match class {
            InstrumentClass::TrendFollowing => Self::trend_following(),
            InstrumentClass::HighVolatility => Self::high_volatility(),
        }
    }

    /// Hard stop expressed in ROE: `-stop_loss_fraction × leverage × 100`.
    ///
    /// # Examples
    /// ```
    /// # use luma_domain::ratchet::Staircase;
    /// # use luma_domain::value_objects::Leverage;
    /// # use rust_decimal_macros::dec;
    /// let stairs = Staircase::trend_following();
    /// assert_eq!(stairs.hard_stop_roe(Leverage::new(5).unwrap()), dec!(-20));
    /// ```
    pub fn hard_stop_roe(&self, leverage: Leverage) -> Decimal {
        -(self.stop_loss_fraction * leverage.as_decimal() * Decimal::ONE_HUNDRED)
    }

    /// Gap of the highest tier reached. Below the first tier the first gap applies.
    pub fn trailing_gap(&self, high_water: Decimal) -> Decimal {
        let mut gap = self.gap_tiers.first().map(|t| t.gap).unwrap_or(Decimal::ZERO);
        for tier in &self.gap_tiers {
            if high_water >= tier.from_roe {
                gap = tier.gap;
            }
        }
        gap
    }

    /// Stop candidate for a high-water mark, before ratcheting.
    pub fn candidate(&self, high_water: Decimal, leverage: Leverage) -> StopLevel {
        if high_water > self.trail_activation_roe {
            let trailing = high_water - self.trailing_gap(high_water);
            StopLevel {
                threshold: trailing.max(self.breakeven_floor_roe),
                stage: StopStage::Trailing,
            }
        } else if high_water > self.breakeven_activation_roe {
            StopLevel {
                threshold: self.breakeven_floor_roe,
                stage: StopStage::Breakeven,
            }
        } else {
            StopLevel {
                threshold: self.hard_stop_roe(leverage),
                stage: StopStage::HardStop,
            }
        }
    }
}

// =============================================================================
// Ratchet Record
// =============================================================================

/// Stateful stop tracking for one open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatchetRecord {
    pub instrument: Instrument,
    pub side: Side,
    /// Best ROE seen since the record was opened
    pub high_water: Decimal,
    /// Current stop threshold in ROE
    pub stop: Decimal,
    pub secured: bool,
    pub opened_at: DateTime<Utc>,
}

/// What changed in one `advance` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RatchetUpdate {
    pub high_water_raised: bool,
    pub stop_tightened: bool,
    pub newly_secured: bool,
}

impl RatchetRecord {
    /// Open a record, seeding the high-water mark with the current ROE.
    pub fn open(
        instrument: Instrument,
        side: Side,
        roe: Decimal,
        staircase: &Staircase,
        leverage: Leverage,
        now: DateTime<Utc>,
    ) -> Self {
        let level = staircase.candidate(roe, leverage);
        Self {
            instrument,
            side,
            high_water: roe,
            stop: level.threshold,
            secured: level.stage.is_secured(),
            opened_at: now,
        }
    }

    /// Fold the current ROE into the record.
    ///
    /// The high-water mark and the stop only ever move up.
    pub fn advance(&mut self, roe: Decimal, staircase: &Staircase, leverage: Leverage) -> RatchetUpdate {
        let mut update = RatchetUpdate::default();

        if roe > self.high_water {
            self.high_water = roe;
            update.high_water_raised = true;
        }

        let level = staircase.candidate(self.high_water, leverage);
        if level.threshold > self.stop {
            self.stop = level.threshold;
            update.stop_tightened = true;
        }

        if level.stage.is_secured() && !self.secured {
            self.secured = true;
            update.newly_secured = true;
        }

        update
    }

    /// Current ROE is at or through the stop.
    pub fn is_triggered(&self, roe: Decimal) -> bool {
        roe <= self.stop
    }
}
