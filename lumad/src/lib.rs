//! Luma Daemon Library
//!
//! Runtime for the adaptive risk and execution controller.
//!
//! # Architecture
//!
//! ```text
//! Daemon loop → Controller::tick
//!                  ├─ IndicatorProvider (account, candles)
//!                  ├─ Regime → Lifecycle → Signals → Sizer → Executor
//!                  ├─ Ratchet → Executor (closes)
//!                  ├─ SnapshotSink (dashboard_state.json)
//!                  └─ StateRepository (luma_state.json)
//! ```
//!
//! # Components
//!
//! - **Daemon**: tick loop with graceful shutdown
//! - **Controller**: owns all mutable state, runs one tick
//! - **Event Log**: bounded rolling log shipped with every snapshot
//! - **Snapshot**: per-tick state for the presentation layer
//! - **Config**: environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use lumad::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     Daemon::paper(config)?.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod controller;
pub mod daemon;
pub mod error;
pub mod event_log;
pub mod snapshot;

// Re-exports for convenience
pub use config::{parse_instruments, Config, Environment};
pub use controller::{Controller, TickReport};
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
pub use event_log::{EventKind, EventLog, EventRecord};
pub use snapshot::{JsonFileSink, MemorySink, PositionView, SnapshotSink, TickSnapshot, SNAPSHOT_FILE_NAME};
