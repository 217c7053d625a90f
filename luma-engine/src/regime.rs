//! Regime Controller
//!
//! Derives the account risk posture from live equity against a durable
//! anchor. The controller keeps the previous state so that missing equity
//! never resets the posture and small oscillations never flap the mode.

use luma_domain::{RegimeMode, RegimeState};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Configuration
// =============================================================================

/// Regime thresholds, all in account ROE percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeConfig {
    /// At or above: GOD_MODE
    pub god_mode_roe: Decimal,
    /// At or above: titan guard raised
    pub titan_roe: Decimal,
    /// At or below: shield guard raised and RECOVERY forced
    pub shield_roe: Decimal,
    /// Minimum ROE required to leave RECOVERY
    pub recovery_exit_roe: Decimal,
    /// GOD_MODE is kept until ROE drops below `god_mode_roe - god_mode_exit_band`
    pub god_mode_exit_band: Decimal,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            god_mode_roe: dec!(5),
            titan_roe: dec!(12),
            shield_roe: dec!(-10),
            recovery_exit_roe: dec!(0.25),
            god_mode_exit_band: dec!(1.0),
        }
    }
}

impl RegimeConfig {
    /// Check threshold ordering.
    pub fn validate(&self) -> EngineResult<()> {
        if self.shield_roe >= Decimal::ZERO {
            return Err(EngineError::invalid("shield_roe must be negative"));
        }
        if self.god_mode_roe <= Decimal::ZERO {
            return Err(EngineError::invalid("god_mode_roe must be positive"));
        }
        if self.titan_roe < self.god_mode_roe {
            return Err(EngineError::invalid("titan_roe must be >= god_mode_roe"));
        }
        if self.recovery_exit_roe < Decimal::ZERO || self.god_mode_exit_band < Decimal::ZERO {
            return Err(EngineError::invalid("hysteresis bands must be non-negative"));
        }
        Ok(())
    }
}

/// A genuine mode change between two evaluations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeTransition {
    pub from: RegimeMode,
    pub to: RegimeMode,
}

// =============================================================================
// Controller
// =============================================================================

/// Stateful regime evaluator.
///
/// Owns the anchor (immutable once set) and the last evaluated state.
#[derive(Debug, Clone)]
pub struct RegimeController {
    config: RegimeConfig,
    anchor: Option<Decimal>,
    state: Option<RegimeState>,
}

impl RegimeController {
    /// Create a controller with validated thresholds and no anchor yet.
    pub fn new(config: RegimeConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            anchor: None,
            state: None,
        })
    }

    /// Resolve the anchor: persisted value first, then configured value.
    ///
    /// A configured value that disagrees with the persisted anchor is logged
    /// and ignored. Non-positive values are ignored. Has no effect once an
    /// anchor is set.
    pub fn resolve_anchor(&mut self, persisted: Option<Decimal>, configured: Option<Decimal>) {
        if self.anchor.is_some() {
            return;
        }

        let persisted = persisted.filter(|a| *a > Decimal::ZERO);
        let configured = configured.filter(|a| *a > Decimal::ZERO);

        match (persisted, configured) {
            (Some(stored), Some(cfg)) if stored != cfg => {
                warn!(
                    persisted = %stored,
                    configured = %cfg,
                    "Configured anchor conflicts with persisted anchor, keeping persisted"
                );
                self.anchor = Some(stored);
            },
            (Some(stored), _) => self.anchor = Some(stored),
            (None, Some(cfg)) => {
                info!(anchor = %cfg, "Anchor equity set from configuration");
                self.anchor = Some(cfg);
            },
            (None, None) => {},
        }
    }

    /// Anchor equity, if resolved
    pub fn anchor(&self) -> Option<Decimal> {
        self.anchor
    }

    /// Last evaluated state
    pub fn current(&self) -> Option<&RegimeState> {
        self.state.as_ref()
    }

    /// Thresholds in use
    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    /// Recompute the posture from live equity.
    ///
    /// With `None` equity the previous state is kept untouched. The first
    /// positive equity observed becomes the anchor when none is resolved.
    /// Returns the mode transition, if any.
    pub fn update(&mut self, equity: Option<Decimal>) -> Option<ModeTransition> {
        let Some(equity) = equity else {
            warn!(
                kept = ?self.state.as_ref().map(|s| s.mode),
                "Equity unavailable, keeping previous regime"
            );
            return None;
        };

        let anchor = match self.anchor {
            Some(anchor) => anchor,
            None if equity > Decimal::ZERO => {
                info!(anchor = %equity, "Anchor equity fixed at first observed equity");
                self.anchor = Some(equity);
                equity
            },
            None => {
                warn!(%equity, "No anchor and non-positive equity, regime unavailable");
                return None;
            },
        };

        let roe = match (equity - anchor).checked_div(anchor) {
            Some(ratio) => ratio * Decimal::ONE_HUNDRED,
            None => return None,
        };

        let previous = self.state.as_ref().map(|s| s.mode);
        let mode = self.next_mode(previous, equity, anchor, roe);

        let state = RegimeState {
            mode,
            shield_active: roe <= self.config.shield_roe,
            titan_active: roe >= self.config.titan_roe,
            roe_percent: roe,
            equity,
            anchor_equity: anchor,
        };
        self.state = Some(state);

        match previous {
            Some(from) if from != mode => {
                info!(%from, to = %mode, %roe, %equity, %anchor, "Regime transition");
                Some(ModeTransition { from, to: mode })
            },
            None => {
                info!(%mode, %roe, %equity, %anchor, "Regime initialized");
                None
            },
            _ => None,
        }
    }

    /// Mode precedence plus hysteresis against the previous mode.
    fn next_mode(
        &self,
        previous: Option<RegimeMode>,
        equity: Decimal,
        anchor: Decimal,
        roe: Decimal,
    ) -> RegimeMode {
        let raw = if equity < anchor || roe <= self.config.shield_roe {
            RegimeMode::Recovery
        } else if roe >= self.config.god_mode_roe {
            RegimeMode::GodMode
        } else {
            RegimeMode::Standard
        };

        match (previous, raw) {
            (Some(RegimeMode::Recovery), RegimeMode::Standard | RegimeMode::GodMode)
                if roe < self.config.recovery_exit_roe =>
            {
                RegimeMode::Recovery
            },
            (Some(RegimeMode::GodMode), RegimeMode::Standard)
                if roe >= self.config.god_mode_roe - self.config.god_mode_exit_band =>
            {
                RegimeMode::GodMode
            },
            _ => raw,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn controller_with_anchor(anchor: Decimal) -> RegimeController {
        let mut controller = RegimeController::new(RegimeConfig::default()).unwrap();
        controller.resolve_anchor(None, Some(anchor));
        controller
    }

    #[test]
    fn test_precedence() {
        let mut c = controller_with_anchor(dec!(1000));

        c.update(Some(dec!(1020)));
        assert_eq!(c.current().unwrap().mode, RegimeMode::Standard);

        c.update(Some(dec!(1060)));
        assert_eq!(c.current().unwrap().mode, RegimeMode::GodMode);
        assert!(!c.current().unwrap().titan_active);

        c.update(Some(dec!(1130)));
        let state = c.current().unwrap();
        assert_eq!(state.mode, RegimeMode::GodMode);
        assert!(state.titan_active);

        c.update(Some(dec!(880)));
        let state = c.current().unwrap();
        assert_eq!(state.mode, RegimeMode::Recovery);
        assert!(state.shield_active);
    }

    #[test]
    fn test_no_flap_around_anchor() {
        let mut c = controller_with_anchor(dec!(1000));
        let mut transitions = 0;
        for i in 0..10 {
            let equity = if i % 2 == 0 { dec!(1000.1) } else { dec!(999.9) };
            if c.update(Some(equity)).is_some() {
                transitions += 1;
            }
        }
        assert!(transitions <= 1, "regime flapped {transitions} times");
    }

    #[test]
    fn test_recovery_exit_requires_margin() {
        let mut c = controller_with_anchor(dec!(1000));
        c.update(Some(dec!(990)));
        assert_eq!(c.current().unwrap().mode, RegimeMode::Recovery);

        c.update(Some(dec!(1002)));
        assert_eq!(c.current().unwrap().mode, RegimeMode::Recovery);

        let transition = c.update(Some(dec!(1003)));
        assert_eq!(
            transition,
            Some(ModeTransition { from: RegimeMode::Recovery, to: RegimeMode::Standard })
        );
    }

    #[test]
    fn test_god_mode_exit_band() {
        let mut c = controller_with_anchor(dec!(1000));
        c.update(Some(dec!(1050)));
        assert_eq!(c.current().unwrap().mode, RegimeMode::GodMode);

        c.update(Some(dec!(1041)));
        assert_eq!(c.current().unwrap().mode, RegimeMode::GodMode);

        c.update(Some(dec!(1039)));
        assert_eq!(c.current().unwrap().mode, RegimeMode::Standard);
    }

    #[test]
    fn test_missing_equity_keeps_previous_state() {
        let mut c = controller_with_anchor(dec!(1000));
        c.update(Some(dec!(1060)));
        let before = c.current().cloned();

        assert_eq!(c.update(None), None);
        assert_eq!(c.current().cloned(), before);
    }

    #[test]
    fn test_no_state_without_equity() {
        let mut c = RegimeController::new(RegimeConfig::default()).unwrap();
        c.update(None);
        assert!(c.current().is_none());
        assert!(c.anchor().is_none());
    }

    #[test]
    fn test_anchor_precedence_and_immutability() {
        let mut c = RegimeController::new(RegimeConfig::default()).unwrap();
        c.resolve_anchor(Some(dec!(500)), Some(dec!(700)));
        assert_eq!(c.anchor(), Some(dec!(500)));

        c.resolve_anchor(None, Some(dec!(900)));
        c.update(Some(dec!(2000)));
        assert_eq!(c.anchor(), Some(dec!(500)));
    }

    #[test]
    fn test_anchor_from_first_equity() {
        let mut c = RegimeController::new(RegimeConfig::default()).unwrap();
        c.update(Some(dec!(1234)));
        assert_eq!(c.anchor(), Some(dec!(1234)));
        assert_eq!(c.current().unwrap().mode, RegimeMode::Standard);
        assert_eq!(c.current().unwrap().roe_percent, Decimal::ZERO);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RegimeConfig { shield_roe: dec!(1), ..RegimeConfig::default() };
        assert!(RegimeController::new(config).is_err());
    }
}
