//! Allocation Sizer
//!
//! Turns regime, instrument class, seasonality and instrument risk into a
//! margin and notional budget.
//!
//! ```text
//! base  = equity × base_fraction
//! cap   = equity × cap_fraction
//! RECOVERY: base, cap ×= recovery_multiplier
//! margin   = max(min(base × seasonality × risk, cap), min_margin)
//! notional = margin × leverage(mode, class)
//! margin > withdrawable → no budget
//! ```

use luma_domain::{InstrumentClass, InstrumentSpec, Leverage, RegimeMode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Leverage Table
// =============================================================================

/// Target leverage per class. Elevated only in GOD_MODE.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeverageTable {
    pub trend_standard: Leverage,
    pub trend_god_mode: Leverage,
    pub volatile_standard: Leverage,
    pub volatile_god_mode: Leverage,
}

impl Default for LeverageTable {
    fn default() -> Self {
        Self {
            trend_standard: Leverage::clamped(5),
            trend_god_mode: Leverage::clamped(10),
            volatile_standard: Leverage::clamped(3),
            volatile_god_mode: Leverage::clamped(5),
        }
    }
}

impl LeverageTable {
    /// Leverage for a class under a mode
    pub fn leverage_for(&self, mode: RegimeMode, class: InstrumentClass) -> Leverage {
        match (class, mode) {
            (InstrumentClass::TrendFollowing, RegimeMode::GodMode) => self.trend_god_mode,
            (InstrumentClass::TrendFollowing, _) => self.trend_standard,
            (InstrumentClass::HighVolatility, RegimeMode::GodMode) => self.volatile_god_mode,
            (InstrumentClass::HighVolatility, _) => self.volatile_standard,
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Sizer parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingConfig {
    pub base_fraction: Decimal,
    pub cap_fraction: Decimal,
    /// Applied to base and cap in RECOVERY
    pub recovery_multiplier: Decimal,
    /// Exchange minimum margin per order
    pub min_margin: Decimal,
    pub leverage: LeverageTable,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            base_fraction: dec!(0.11),
            cap_fraction: dec!(0.165),
            recovery_multiplier: dec!(0.5),
            min_margin: dec!(2),
            leverage: LeverageTable::default(),
        }
    }
}

impl SizingConfig {
    /// Check fractions are in range.
    pub fn validate(&self) -> EngineResult<()> {
        let unit = Decimal::ZERO..=Decimal::ONE;
        if !unit.contains(&self.base_fraction) || self.base_fraction.is_zero() {
            return Err(EngineError::invalid("base_fraction must be in (0, 1]"));
        }
        if !unit.contains(&self.cap_fraction) || self.cap_fraction < self.base_fraction {
            return Err(EngineError::invalid("cap_fraction must be in [base_fraction, 1]"));
        }
        if !unit.contains(&self.recovery_multiplier) || self.recovery_multiplier.is_zero() {
            return Err(EngineError::invalid("recovery_multiplier must be in (0, 1]"));
        }
        if self.min_margin < Decimal::ZERO {
            return Err(EngineError::invalid("min_margin must be non-negative"));
        }
        Ok(())
    }
}

// =============================================================================
// Sizer
// =============================================================================

/// Margin and notional budget for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub margin: Decimal,
    pub notional: Decimal,
    pub leverage: Leverage,
}

/// Stateless budget calculator.
#[derive(Debug, Clone)]
pub struct AllocationSizer {
    config: SizingConfig,
}

impl AllocationSizer {
    /// Create a sizer with validated config.
    pub fn new(config: SizingConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Parameters in use
    pub fn config(&self) -> &SizingConfig {
        &self.config
    }

    /// Target leverage for an instrument under a mode.
    pub fn leverage_for(&self, mode: RegimeMode, class: InstrumentClass) -> Leverage {
        self.config.leverage.leverage_for(mode, class)
    }

    /// Compute the budget for one instrument.
    ///
    /// # Arguments
    ///
    /// * `mode` - Current regime mode
    /// * `spec` - Instrument class and risk multiplier
    /// * `equity` - Account equity
    /// * `withdrawable` - Cash available for new margin
    /// * `seasonality` - Time-of-week multiplier
    /// * `cycle` - Market-cycle multiplier (1 when the filter is off)
    ///
    /// # Returns
    ///
    /// `None` when the margin would exceed the withdrawable cash or equity
    /// is not positive.
    pub fn budget(
        &self,
        mode: RegimeMode,
        spec: &InstrumentSpec,
        equity: Decimal,
        withdrawable: Decimal,
        seasonality: Decimal,
        cycle: Decimal,
    ) -> Option<Budget> {
        if equity <= Decimal::ZERO {
            return None;
        }

        let mut base = equity * self.config.base_fraction;
        let mut cap = equity * self.config.cap_fraction;
        if mode.is_recovery() {
            base *= self.config.recovery_multiplier;
            cap *= self.config.recovery_multiplier;
        }

        let risk = spec.risk_multiplier * cycle;
        let margin = (base * seasonality * risk).min(cap).max(self.config.min_margin);

        if margin > withdrawable {
            debug!(
                instrument = %spec.instrument,
                %margin,
                %withdrawable,
                "Margin exceeds withdrawable cash, no budget"
            );
            return None;
        }

        let leverage = self.leverage_for(mode, spec.class);
        Some(Budget {
            margin,
            notional: margin * leverage.as_decimal(),
            leverage,
        })
    }
}
