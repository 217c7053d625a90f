//! Stub implementations for testing.
//!
//! These implementations simulate the indicator provider and the execution
//! gateway without making real API calls.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use luma_domain::{AccountState, Candle, CandleInterval, Instrument, Leverage, OrderSide};

use crate::error::ExecError;
use crate::ports::{ExecutionGateway, IndicatorProvider, LimitOrder, OrderAck};

// =============================================================================
// Stub Provider
// =============================================================================

/// Stub indicator provider for testing.
///
/// Serves injected candles and account snapshots. A missing account
/// snapshot reports `DataUnavailable`, as does an instrument marked failing.
#[derive(Default)]
pub struct StubProvider {
    candles: RwLock<HashMap<(Instrument, CandleInterval), Vec<Candle>>>,
    account: RwLock<Option<AccountState>>,
    failing: RwLock<HashSet<Instrument>>,
    delays: RwLock<HashMap<Instrument, Duration>>,
}

impl StubProvider {
    /// Create an empty provider (no account, no candles).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set candle history for an instrument and interval.
    pub fn set_candles(&self, instrument: &Instrument, interval: CandleInterval, candles: Vec<Candle>) {
        self.candles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((instrument.clone(), interval), candles);
    }

    /// Set the account snapshot.
    pub fn set_account(&self, account: AccountState) {
        *self.account.write().unwrap_or_else(PoisonError::into_inner) = Some(account);
    }

    /// Simulate an account data outage.
    pub fn clear_account(&self) {
        *self.account.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Make candle requests for an instrument fail (or succeed again).
    pub fn set_failing(&self, instrument: &Instrument, failing: bool) {
        let mut set = self.failing.write().unwrap_or_else(PoisonError::into_inner);
        if failing {
            set.insert(instrument.clone());
        } else {
            set.remove(instrument);
        }
    }

    /// Delay candle requests for an instrument.
    pub fn set_delay(&self, instrument: &Instrument, delay: Duration) {
        self.delays
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(instrument.clone(), delay);
    }
}

#[async_trait]
impl IndicatorProvider for StubProvider {
    async fn get_candles(
        &self,
        instrument: &Instrument,
        interval: CandleInterval,
    ) -> Result<Vec<Candle>, ExecError> {
        let delay = self
            .delays
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(instrument)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self
            .failing
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(instrument)
        {
            return Err(ExecError::DataUnavailable(format!("Simulated candle outage for {}", instrument)));
        }

        self.candles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(instrument.clone(), interval))
            .cloned()
            .ok_or_else(|| ExecError::DataUnavailable(format!("No {} candles for {}", interval.as_str(), instrument)))
    }

    async fn get_account_state(&self, _address: &str) -> Result<AccountState, ExecError> {
        self.account
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ExecError::DataUnavailable("Simulated account outage".to_string()))
    }
}

// =============================================================================
// Stub Gateway
// =============================================================================

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    PlaceLimit(LimitOrder),
    MarketClose {
        instrument: Instrument,
        side: OrderSide,
        size: Decimal,
    },
    CancelAll(Instrument),
    SetLeverage {
        instrument: Instrument,
        leverage: Leverage,
    },
}

/// Paper-trading gateway for testing.
///
/// Accepts every call unless told otherwise and records it. Failed and
/// rejected calls are not recorded.
#[derive(Default)]
pub struct StubGateway {
    calls: RwLock<Vec<GatewayCall>>,
    /// Limit orders placed and not yet cancelled, per instrument
    resting: RwLock<HashMap<Instrument, usize>>,
    order_counter: RwLock<u64>,
    fail_next: RwLock<bool>,
    reject_next: RwLock<Option<String>>,
    delay: RwLock<Option<Duration>>,
}

impl StubGateway {
    /// Create a gateway that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every accepted call so far, in order.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Accepted market closes so far.
    pub fn closes(&self) -> Vec<GatewayCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, GatewayCall::MarketClose { .. }))
            .collect()
    }

    /// Accepted limit orders so far.
    pub fn limit_orders(&self) -> Vec<LimitOrder> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::PlaceLimit(order) => Some(order),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.calls.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Configure the next call to fail with a transport error.
    pub fn set_fail_next(&self, fail: bool) {
        *self.fail_next.write().unwrap_or_else(PoisonError::into_inner) = fail;
    }

    /// Configure the next call to be rejected with `reason`.
    pub fn reject_next(&self, reason: &str) {
        *self.reject_next.write().unwrap_or_else(PoisonError::into_inner) = Some(reason.to_string());
    }

    /// Delay every call (for timeout tests).
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    fn next_order_id(&self) -> u64 {
        let mut counter = self.order_counter.write().unwrap_or_else(PoisonError::into_inner);
        *counter += 1;
        *counter
    }

    /// Apply delay, then consume a configured failure or rejection.
    async fn gate(&self, what: &str) -> Result<(), ExecError> {
        let delay = *self.delay.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let fail = std::mem::take(&mut *self.fail_next.write().unwrap_or_else(PoisonError::into_inner));
        if fail {
            return Err(ExecError::Exchange(format!("Simulated {} failure", what)));
        }
        let rejection = self.reject_next.write().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(reason) = rejection {
            return Err(ExecError::OrderRejected(reason));
        }
        Ok(())
    }

    fn record(&self, call: GatewayCall) {
        self.calls.write().unwrap_or_else(PoisonError::into_inner).push(call);
    }

    fn ack(&self, client_order_id: Option<uuid::Uuid>, filled: Option<Decimal>) -> OrderAck {
        OrderAck {
            exchange_order_id: Some(self.next_order_id()),
            client_order_id,
            filled_size: filled,
            avg_price: None,
            acknowledged_at: Utc::now(),
        }
    }
}

#[async_trait]
impl ExecutionGateway for StubGateway {
    async fn place_limit(&self, order: &LimitOrder) -> Result<OrderAck, ExecError> {
        self.gate("place_limit").await?;
        *self
            .resting
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(order.instrument.clone())
            .or_default() += 1;
        self.record(GatewayCall::PlaceLimit(order.clone()));
        Ok(self.ack(Some(order.client_order_id), None))
    }

    async fn place_market_close(
        &self,
        instrument: &Instrument,
        side: OrderSide,
        size: Decimal,
    ) -> Result<OrderAck, ExecError> {
        self.gate("place_market_close").await?;
        self.record(GatewayCall::MarketClose {
            instrument: instrument.clone(),
            side,
            size,
        });
        Ok(self.ack(None, Some(size)))
    }

    async fn cancel_all(&self, instrument: &Instrument) -> Result<usize, ExecError> {
        self.gate("cancel_all").await?;
        let count = self
            .resting
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(instrument)
            .unwrap_or(0);
        self.record(GatewayCall::CancelAll(instrument.clone()));
        tracing::debug!(%instrument, count, "Stub: orders cancelled");
        Ok(count)
    }

    async fn set_leverage(&self, instrument: &Instrument, leverage: Leverage) -> Result<(), ExecError> {
        self.gate("set_leverage").await?;
        self.record(GatewayCall::SetLeverage {
            instrument: instrument.clone(),
            leverage,
        });
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
