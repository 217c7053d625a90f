//! Luma Execution Layer
//!
//! Ports to the outside world and the executor that drives them.
//!
//! # Architecture
//!
//! ```text
//! Engine Decision → Executor → precision → ExecutionGateway → Result
//! ```
//!
//! # Components
//!
//! - **Ports**: `IndicatorProvider` (candles, account) and `ExecutionGateway` (orders)
//! - **Precision**: size truncation and price rounding rules
//! - **Executor**: turns engine actions into gateway calls
//! - **Stub**: in-memory implementations for tests and paper trading
//!
//! # Example
//!
//! ```rust,ignore
//! use luma_exec::{Executor, StubGateway, DEFAULT_CALL_TIMEOUT};
//! use std::sync::Arc;
//!
//! let gateway = Arc::new(StubGateway::new());
//! let mut executor = Executor::new(gateway, &specs, DEFAULT_CALL_TIMEOUT);
//!
//! for action in actions {
//!     executor.execute(action).await?;
//! }
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod executor;
pub mod ports;
pub mod precision;
pub mod stub;

// Re-exports for convenience
pub use error::{ExecError, ExecResult};
pub use executor::{ActionResult, Executor, DEFAULT_CALL_TIMEOUT};
pub use ports::{ExecutionGateway, IndicatorProvider, LimitOrder, OrderAck};
pub use stub::{GatewayCall, StubGateway, StubProvider};
