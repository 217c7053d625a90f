//! Domain Entities for Luma
//!
//! Exchange-owned snapshots (positions, resting orders, account state) that
//! are mirrored read-only every tick, plus the ephemeral trade proposal.

use crate::value_objects::{DomainError, Instrument, InstrumentClass, Leverage, OrderSide, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Instrument Spec
// =============================================================================

/// Static per-instrument configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    pub instrument: Instrument,
    pub class: InstrumentClass,
    /// Size decimals allowed by the exchange (Hyperliquid `szDecimals`)
    pub size_decimals: u32,
    /// Per-instrument risk scaling applied by the sizer (1 = neutral)
    pub risk_multiplier: Decimal,
}

impl InstrumentSpec {
    /// Create a spec with neutral risk multiplier.
    pub fn new(instrument: Instrument, class: InstrumentClass, size_decimals: u32) -> Self {
        Self {
            instrument,
            class,
            size_decimals,
            risk_multiplier: Decimal::ONE,
        }
    }

    /// Override the risk multiplier.
    pub fn with_risk_multiplier(mut self, multiplier: Decimal) -> Self {
        self.risk_multiplier = multiplier;
        self
    }
}

// =============================================================================
// Position
// =============================================================================

/// Open position as reported by the exchange.
///
/// Owned by the exchange; Luma never mutates it, only mirrors it each tick.
/// `size` is always the absolute coin amount, direction lives in `side`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub instrument: Instrument,
    pub side: Side,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub margin_used: Decimal,
    pub leverage: Leverage,
}

impl Position {
    /// Build a position from an exchange signed size (`szi`).
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPosition` for a zero size or non-positive entry.
    pub fn from_signed_size(
        instrument: Instrument,
        signed_size: Decimal,
        entry_price: Decimal,
        unrealized_pnl: Decimal,
        margin_used: Decimal,
        leverage: Leverage,
    ) -> Result<Self, DomainError> {
        let side = Side::from_signed_size(signed_size).ok_or_else(|| {
            DomainError::InvalidPosition(format!("{instrument}: zero size position"))
        })?;
        if entry_price <= Decimal::ZERO {
            return Err(DomainError::InvalidPosition(format!(
                "{instrument}: entry price must be positive"
            )));
        }
        Ok(Self {
            instrument,
            side,
            size: signed_size.abs(),
            entry_price,
            unrealized_pnl,
            margin_used,
            leverage,
        })
    }

    /// Size with the exchange sign convention (negative for shorts).
    pub fn signed_size(&self) -> Decimal {
        self.size * self.side.sign()
    }

    /// Return on equity in percent: `pnl / margin * 100`.
    ///
    /// `None` when the margin is zero (the ratchet skips such positions).
    pub fn roe_percent(&self) -> Option<Decimal> {
        if self.margin_used.is_zero() {
            return None;
        }
        self.unrealized_pnl
            .checked_div(self.margin_used)
            .map(|r| r * Decimal::ONE_HUNDRED)
    }

    /// Mark price implied by the pnl: `entry + pnl / signed_size`.
    pub fn mark_price(&self) -> Option<Decimal> {
        self.unrealized_pnl
            .checked_div(self.signed_size())
            .map(|delta| self.entry_price + delta)
    }
}

// =============================================================================
// Pending Order
// =============================================================================

/// Exchange-resting limit order. Reconciled, never authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub instrument: Instrument,
    pub limit_price: Decimal,
    pub side: OrderSide,
    /// Remaining size in coins (if reported)
    #[serde(default)]
    pub size: Option<Decimal>,
    /// Exchange order id (if reported)
    #[serde(default)]
    pub order_id: Option<u64>,
}

impl PendingOrder {
    /// Create a resting order mirror without size or id.
    pub fn new(instrument: Instrument, limit_price: Decimal, side: OrderSide) -> Self {
        Self {
            instrument,
            limit_price,
            side,
            size: None,
            order_id: None,
        }
    }
}

// =============================================================================
// Account State
// =============================================================================

/// Account snapshot from the indicator provider.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AccountState {
    /// Total account value (margin equity)
    pub equity: Decimal,
    /// Cash available for new margin
    pub withdrawable: Decimal,
    pub positions: Vec<Position>,
    pub open_orders: Vec<PendingOrder>,
}

impl AccountState {
    /// Find the open position on an instrument.
    pub fn position(&self, instrument: &Instrument) -> Option<&Position> {
        self.positions.iter().find(|p| &p.instrument == instrument)
    }

    /// All resting orders on an instrument.
    pub fn orders_for(&self, instrument: &Instrument) -> Vec<&PendingOrder> {
        self.open_orders
            .iter()
            .filter(|o| &o.instrument == instrument)
            .collect()
    }

    /// Sum of unrealized pnl across positions.
    pub fn total_unrealized_pnl(&self) -> Decimal {
        self.positions.iter().map(|p| p.unrealized_pnl).sum()
    }
}

// =============================================================================
// Proposal
// =============================================================================

/// Which heuristic produced a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalSource {
    /// Volume spike in the direction of the trend baseline
    Momentum,
    /// Pullback / rejection / breakout structure
    Structural,
    /// Absorption / exhaustion divergence
    Reversal,
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalSource::Momentum => write!(f, "MOMENTUM"),
            SignalSource::Structural => write!(f, "STRUCTURAL"),
            SignalSource::Reversal => write!(f, "REVERSAL"),
        }
    }
}

/// Entry proposal. Produced and consumed within one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub instrument: Instrument,
    pub side: Side,
    pub reference_price: Decimal,
    pub source: SignalSource,
    /// Short setup label (e.g., "TREND_PULLBACK")
    pub reason: String,
}

// =============================================================================
// Trade Outcome
// =============================================================================

/// Classification of a ratchet close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeOutcome {
    Win,
    Loss,
}

impl TradeOutcome {
    /// Classify by the sign of realized pnl (zero counts as a loss: fees were paid).
    pub fn from_pnl(pnl: Decimal) -> Self {
        if pnl > Decimal::ZERO {
            TradeOutcome::Win
        } else {
            TradeOutcome::Loss
        }
    }
}

impl fmt::Display for TradeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeOutcome::Win => write!(f, "WIN"),
            TradeOutcome::Loss => write!(f, "LOSS"),
        }
    }
}

// =============================================================================
// Cooldowns & Stats
// =============================================================================

/// Why an instrument is temporarily blocked from new entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CooldownReason {
    /// A losing close; re-entry is suppressed for a while
    Trauma,
    /// A place/cancel was just sent; prevents action storms
    OrderAction,
}

impl fmt::Display for CooldownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CooldownReason::Trauma => write!(f, "TRAUMA"),
            CooldownReason::OrderAction => write!(f, "ORDER_ACTION"),
        }
    }
}

/// Per-instrument cooldown that expires at `until`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cooldown {
    pub instrument: Instrument,
    pub reason: CooldownReason,
    pub until: DateTime<Utc>,
}

impl Cooldown {
    /// Still blocking at `now`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.until
    }
}

/// Win/loss counters of ratchet closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TradeStats {
    pub wins: u64,
    pub losses: u64,
}

impl TradeStats {
    /// Count one outcome.
    pub fn record(&mut self, outcome: TradeOutcome) {
        match outcome {
            TradeOutcome::Win => self.wins += 1,
            TradeOutcome::Loss => self.losses += 1,
        }
    }

    /// Total closes counted
    pub fn total(&self) -> u64 {
        self.wins + self.losses
    }

    /// Win rate in percent, `None` before the first close.
    pub fn win_rate(&self) -> Option<Decimal> {
        if self.total() == 0 {
            return None;
        }
        Decimal::from(self.wins)
            .checked_div(Decimal::from(self.total()))
            .map(|r| r * Decimal::ONE_HUNDRED)
    }
}

// =============================================================================
// Tests
// =============================================================================
