//! Executor: carries engine actions out through the execution gateway.
//!
//! The Executor is the bridge between the pure Engine (decisions) and the
//! impure gateway (I/O). It applies exchange precision, skips redundant
//! leverage updates and bounds every gateway call with a timeout.
//!
//! # Flow
//!
//! ```text
//! EngineAction → Executor → precision → ExecutionGateway → ActionResult
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use luma_domain::{Instrument, InstrumentSpec, Leverage};
use luma_engine::EngineAction;

use crate::error::{ExecError, ExecResult};
use crate::ports::{ExecutionGateway, LimitOrder, OrderAck};
use crate::precision::{round_price, size_for_notional};

/// Default per-call budget for gateway calls.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Execution Result
// =============================================================================

/// Result of executing an engine action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    /// Leverage pushed to the exchange
    LeverageSet(Leverage),
    /// Leverage already applied, no call made
    LeverageUnchanged(Leverage),
    /// Resting orders cancelled
    Cancelled { count: usize },
    /// Limit entry accepted
    EntryPlaced { order: LimitOrder, ack: OrderAck },
    /// Market close accepted
    Closed { ack: OrderAck },
}

// =============================================================================
// Executor
// =============================================================================

/// Executes engine actions against an `ExecutionGateway`.
///
/// The Executor:
/// 1. Remembers the last leverage applied per instrument
/// 2. Rounds entry price and size to the instrument's precision
/// 3. Tags each entry with a time-ordered client order id
/// 4. Turns slow gateway calls into `ExecError::Timeout`
pub struct Executor<G: ExecutionGateway> {
    gateway: Arc<G>,
    size_decimals: HashMap<Instrument, u32>,
    applied_leverage: HashMap<Instrument, Leverage>,
    call_timeout: Duration,
}

impl<G: ExecutionGateway> Executor<G> {
    /// Create a new executor for the configured instruments.
    pub fn new(gateway: Arc<G>, specs: &[InstrumentSpec], call_timeout: Duration) -> Self {
        let size_decimals = specs
            .iter()
            .map(|spec| (spec.instrument.clone(), spec.size_decimals))
            .collect();
        Self {
            gateway,
            size_decimals,
            applied_leverage: HashMap::new(),
            call_timeout,
        }
    }

    /// The gateway in use
    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    /// Last leverage applied to an instrument in this process
    pub fn applied_leverage(&self, instrument: &Instrument) -> Option<Leverage> {
        self.applied_leverage.get(instrument).copied()
    }

    /// Execute a single engine action.
    ///
    /// # Errors
    ///
    /// - `ExecError::Precision` when an entry rounds to nothing
    /// - `ExecError::Timeout` when the gateway exceeds the call budget
    /// - Whatever the gateway reports (rejections, transport errors)
    pub async fn execute(&mut self, action: EngineAction) -> ExecResult<ActionResult> {
        match action {
            EngineAction::SetLeverage { instrument, leverage } => {
                self.apply_leverage(&instrument, leverage).await
            },

            EngineAction::CancelStale {
                instrument,
                order_price,
                reference_price,
                drift_pct,
            } => {
                let count = self
                    .bounded("cancel_all", self.gateway.cancel_all(&instrument))
                    .await?;
                info!(
                    %instrument,
                    %order_price,
                    %reference_price,
                    %drift_pct,
                    count,
                    "Stale orders cancelled"
                );
                Ok(ActionResult::Cancelled { count })
            },

            EngineAction::PlaceEntry {
                instrument,
                side,
                limit_price,
                notional,
                source,
                reason,
                ..
            } => {
                let size_decimals = self.size_decimals(&instrument)?;
                let price = round_price(limit_price, size_decimals)?;
                let size = size_for_notional(notional, price, size_decimals)?;
                let order = LimitOrder {
                    instrument,
                    side: side.entry_action(),
                    price,
                    size,
                    notional,
                    client_order_id: Uuid::now_v7(),
                };

                let ack = self.bounded("place_limit", self.gateway.place_limit(&order)).await?;
                info!(
                    instrument = %order.instrument,
                    side = %order.side,
                    price = %order.price,
                    size = %order.size,
                    %notional,
                    %source,
                    reason = %reason,
                    client_order_id = %order.client_order_id,
                    "Entry placed"
                );
                Ok(ActionResult::EntryPlaced { order, ack })
            },

            EngineAction::ClosePosition {
                instrument,
                position_side,
                size,
                roe,
                reason,
                ..
            } => {
                let size = size.abs();
                if size <= Decimal::ZERO {
                    return Err(ExecError::Precision(format!("close size for {} is zero", instrument)));
                }
                let side = position_side.exit_action();
                let ack = self
                    .bounded("place_market_close", self.gateway.place_market_close(&instrument, side, size))
                    .await?;
                info!(%instrument, %side, %size, %roe, %reason, "Close accepted");
                Ok(ActionResult::Closed { ack })
            },
        }
    }

    async fn apply_leverage(
        &mut self,
        instrument: &Instrument,
        leverage: Leverage,
    ) -> ExecResult<ActionResult> {
        if self.applied_leverage.get(instrument) == Some(&leverage) {
            debug!(%instrument, %leverage, "Leverage already applied");
            return Ok(ActionResult::LeverageUnchanged(leverage));
        }

        let outcome = self
            .bounded("set_leverage", self.gateway.set_leverage(instrument, leverage))
            .await;
        match outcome {
            Ok(()) => {
                let previous = self.applied_leverage.insert(instrument.clone(), leverage);
                info!(%instrument, %leverage, ?previous, "Leverage set");
                Ok(ActionResult::LeverageSet(leverage))
            },
            Err(e) => {
                warn!(%instrument, %leverage, error = %e, "Leverage update failed");
                Err(e)
            },
        }
    }

    fn size_decimals(&self, instrument: &Instrument) -> ExecResult<u32> {
        self.size_decimals
            .get(instrument)
            .copied()
            .ok_or_else(|| ExecError::Config(format!("no instrument spec for {}", instrument)))
    }

    async fn bounded<T>(
        &self,
        call: &'static str,
        fut: impl Future<Output = ExecResult<T>>,
    ) -> ExecResult<T> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ExecError::Timeout(format!(
                "{} exceeded {}s",
                call,
                self.call_timeout.as_secs()
            ))),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
