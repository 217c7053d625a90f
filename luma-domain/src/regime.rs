//! Regime Types
//!
//! Discrete risk posture derived from live equity against the anchor.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk posture of the whole account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegimeMode {
    /// Equity below anchor: budgets halved, standard leverage
    Recovery,
    /// Normal operation
    Standard,
    /// Comfortably above anchor: elevated leverage
    GodMode,
}

impl RegimeMode {
    /// Is this the defensive posture
    pub fn is_recovery(&self) -> bool {
        matches!(self, RegimeMode::Recovery)
    }
}

impl fmt::Display for RegimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegimeMode::Recovery => write!(f, "RECOVERY"),
            RegimeMode::Standard => write!(f, "STANDARD"),
            RegimeMode::GodMode => write!(f, "GOD_MODE"),
        }
    }
}

/// Result of one regime evaluation.
///
/// Recomputed every tick from live equity. Only `anchor_equity` outlives
/// the process (it is persisted by the store).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeState {
    pub mode: RegimeMode,
    /// Drawdown guard: momentum entries need trap confirmation
    pub shield_active: bool,
    /// Large-gain guard: momentum entries need trap confirmation
    pub titan_active: bool,
    /// Account ROE against the anchor, in percent
    pub roe_percent: Decimal,
    pub equity: Decimal,
    pub anchor_equity: Decimal,
}

impl RegimeState {
    /// Either guard flag is raised
    pub fn requires_confirmation(&self) -> bool {
        self.shield_active || self.titan_active
    }
}
