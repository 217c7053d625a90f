//! Luma Domain Layer
//!
//! Pure domain types with zero I/O dependencies.
//! Contains value objects, exchange snapshots, regime and ratchet records.

#![warn(clippy::all)]

// Public modules
pub mod entities;
pub mod market_data;
pub mod ratchet;
pub mod regime;
pub mod value_objects;

// Re-export commonly used types
pub use entities::{
    AccountState, Cooldown, CooldownReason, InstrumentSpec, PendingOrder, Position, Proposal,
    SignalSource, TradeOutcome, TradeStats,
};
pub use market_data::{Candle, CandleInterval};
pub use ratchet::{GapTier, RatchetRecord, RatchetUpdate, Staircase, StopLevel, StopStage};
pub use regime::{RegimeMode, RegimeState};
pub use value_objects::{DomainError, Instrument, InstrumentClass, Leverage, OrderSide, Side};
