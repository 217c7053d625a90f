//! Luma Engine Layer
//!
//! Pure decision logic, deterministic, no I/O.
//! Takes input → Returns actions to execute.
//!
//! # Components
//!
//! - **Regime Controller**: account posture from equity against the anchor
//! - **Allocation Sizer**: margin / notional budget per instrument
//! - **Signal Arbitrator**: at most one entry proposal per instrument
//! - **Order Lifecycle Manager**: holds or cancels resting orders
//! - **Ratchet Book**: stepped trailing stops and closes
//! - **Cooldown Book**: trauma and action cooldowns

#![warn(clippy::all)]

pub mod actions;
pub mod cooldown;
pub mod cycle;
pub mod error;
pub mod indicators;
pub mod lifecycle;
pub mod ratchet;
pub mod regime;
pub mod seasonality;
pub mod signals;
pub mod sizing;

pub use actions::{CloseReason, EngineAction};
pub use cooldown::{CooldownBook, CooldownConfig};
pub use cycle::{classify_cycle, CycleConfig, CyclePhase, CycleReading};
pub use error::{EngineError, EngineResult};
pub use lifecycle::{LifecycleConfig, LifecycleDecision, OrderLifecycleManager};
pub use ratchet::{RatchetBook, RatchetConfig, RatchetEvent, RatchetPass};
pub use regime::{ModeTransition, RegimeConfig, RegimeController};
pub use seasonality::{seasonality, Seasonality, TradingSession};
pub use signals::{Evaluation, SignalArbitrator, SignalConfig, TrapClassification, Veto};
pub use sizing::{AllocationSizer, Budget, LeverageTable, SizingConfig};
