//! Engine actions.
//!
//! The engine never talks to the exchange. Every decision is returned as an
//! `EngineAction` and carried out by the executor in `luma-exec`.

use luma_domain::{Instrument, Leverage, OrderSide, Side, SignalSource, StopStage};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    /// ROE crossed the ratchet threshold
    StopHit(StopStage),
    /// ROE crossed the independent emergency floor
    EmergencyStop,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::StopHit(StopStage::HardStop) => write!(f, "HARD_STOP"),
            CloseReason::StopHit(StopStage::Breakeven) => write!(f, "BREAKEVEN_STOP"),
            CloseReason::StopHit(StopStage::Trailing) => write!(f, "TRAILING_STOP"),
            CloseReason::EmergencyStop => write!(f, "EMERGENCY_STOP"),
        }
    }
}

/// Actions produced by the engine for the executor to carry out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineAction {
    /// Align the exchange leverage with the regime target
    SetLeverage {
        instrument: Instrument,
        leverage: Leverage,
    },

    /// Cancel every resting order on an instrument (drifted away from price)
    CancelStale {
        instrument: Instrument,
        order_price: Decimal,
        reference_price: Decimal,
        /// Drift in percent of the order price
        drift_pct: Decimal,
    },

    /// Place a limit entry sized by the allocation sizer
    PlaceEntry {
        instrument: Instrument,
        side: Side,
        limit_price: Decimal,
        notional: Decimal,
        margin: Decimal,
        leverage: Leverage,
        source: SignalSource,
        reason: String,
    },

    /// Market-close the whole position on the opposite side
    ClosePosition {
        instrument: Instrument,
        position_side: Side,
        /// Absolute position size in coins
        size: Decimal,
        roe: Decimal,
        /// Unrealized pnl at decision time (realized once filled)
        pnl: Decimal,
        reason: CloseReason,
    },
}

impl EngineAction {
    /// Instrument this action targets
    pub fn instrument(&self) -> &Instrument {
        match self {
            EngineAction::SetLeverage { instrument, .. }
            | EngineAction::CancelStale { instrument, .. }
            | EngineAction::PlaceEntry { instrument, .. }
            | EngineAction::ClosePosition { instrument, .. } => instrument,
        }
    }

    /// Order side sent to the exchange, if this action places an order
    pub fn order_side(&self) -> Option<OrderSide> {
        match self {
            EngineAction::PlaceEntry { side, .. } => Some(side.entry_action()),
            EngineAction::ClosePosition { position_side, .. } => Some(position_side.exit_action()),
            _ => None,
        }
    }

    /// Short label for logs and the event log
    pub fn kind(&self) -> &'static str {
        match self {
            EngineAction::SetLeverage { .. } => "SET_LEVERAGE",
            EngineAction::CancelStale { .. } => "CANCEL_STALE",
            EngineAction::PlaceEntry { .. } => "PLACE_ENTRY",
            EngineAction::ClosePosition { .. } => "CLOSE_POSITION",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_close_uses_opposite_side() {
        let action = EngineAction::ClosePosition {
            instrument: Instrument::new("SOL").unwrap(),
            position_side: Side::Long,
            size: dec!(1.5),
            roe: dec!(-25),
            pnl: dec!(-5),
            reason: CloseReason::StopHit(StopStage::HardStop),
        };
        assert_eq!(action.order_side(), Some(OrderSide::Sell));
        assert_eq!(action.kind(), "CLOSE_POSITION");
        assert_eq!(action.instrument().as_str(), "SOL");
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(CloseReason::EmergencyStop.to_string(), "EMERGENCY_STOP");
        assert_eq!(CloseReason::StopHit(StopStage::Trailing).to_string(), "TRAILING_STOP");
    }
}
