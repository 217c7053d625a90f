//! Order Lifecycle Manager
//!
//! Reconciles resting limit orders against the current reference price on
//! instruments without an open position. An order inside the tolerance band
//! is held (and blocks a second entry). A drifted order gets every order on
//! the instrument cancelled, exactly once.

use luma_domain::{Instrument, OrderSide, PendingOrder};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::actions::EngineAction;
use crate::error::{EngineError, EngineResult};

/// Tolerance band around a resting order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Maximum drift from the order price, in percent
    pub tolerance_pct: Decimal,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self { tolerance_pct: dec!(0.5) }
    }
}

/// Outcome of reconciling one instrument.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleDecision {
    /// Nothing resting; the arbitrator may run
    Clear,
    /// A good order rests; the arbitrator must not run
    Hold { order_price: Decimal, drift_pct: Decimal },
    /// Stale orders; cancel and skip proposals this tick
    Cancel(EngineAction),
    /// Orders already cancelled by us are still reported
    AwaitingCancel,
}

impl LifecycleDecision {
    /// May the arbitrator propose an entry
    pub fn allows_entry(&self) -> bool {
        matches!(self, LifecycleDecision::Clear)
    }
}

/// Identity of a resting order across snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum OrderKey {
    Id(u64),
    Price(Decimal, OrderSide),
}

impl From<&PendingOrder> for OrderKey {
    fn from(order: &PendingOrder) -> Self {
        match order.order_id {
            Some(id) => OrderKey::Id(id),
            None => OrderKey::Price(order.limit_price.normalize(), order.side),
        }
    }
}

/// Stateful reconciler. Remembers which orders it already cancelled.
#[derive(Debug, Clone)]
pub struct OrderLifecycleManager {
    config: LifecycleConfig,
    cancelled: HashMap<Instrument, HashSet<OrderKey>>,
}

impl OrderLifecycleManager {
    pub fn new(config: LifecycleConfig) -> EngineResult<Self> {
        if config.tolerance_pct <= Decimal::ZERO {
            return Err(EngineError::invalid("tolerance_pct must be positive"));
        }
        Ok(Self {
            config,
            cancelled: HashMap::new(),
        })
    }

    /// Parameters in use
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Drift of `reference` from `order_price`, in percent.
    pub fn drift_pct(order_price: Decimal, reference: Decimal) -> Option<Decimal> {
        (reference - order_price)
            .abs()
            .checked_div(order_price)
            .map(|r| r * Decimal::ONE_HUNDRED)
    }

    /// Decide what to do with the resting orders of one instrument.
    ///
    /// # Arguments
    ///
    /// * `instrument` - Instrument being scanned (no open position)
    /// * `orders` - Orders resting on it in this tick's snapshot
    /// * `reference_price` - Last candle close
    pub fn reconcile(
        &mut self,
        instrument: &Instrument,
        orders: &[&PendingOrder],
        reference_price: Decimal,
    ) -> LifecycleDecision {
        if orders.is_empty() {
            self.cancelled.remove(instrument);
            return LifecycleDecision::Clear;
        }

        let already = self.cancelled.get(instrument);
        let fresh: Vec<&PendingOrder> = orders
            .iter()
            .copied()
            .filter(|o| already.map_or(true, |set| !set.contains(&OrderKey::from(*o))))
            .collect();
        if fresh.is_empty() {
            debug!(%instrument, "Cancelled orders still reported, waiting");
            return LifecycleDecision::AwaitingCancel;
        }

        // Worst drift decides; an unpriceable order counts as stale.
        let mut worst: Option<(Decimal, Decimal)> = None;
        let mut stale = false;
        for order in &fresh {
            match Self::drift_pct(order.limit_price, reference_price) {
                Some(drift) => {
                    if worst.map_or(true, |(_, d)| drift > d) {
                        worst = Some((order.limit_price, drift));
                    }
                    if drift > self.config.tolerance_pct {
                        stale = true;
                    }
                },
                None => stale = true,
            }
        }

        let (order_price, drift_pct) = worst.unwrap_or((Decimal::ZERO, Decimal::ZERO));
        if !stale {
            debug!(%instrument, %order_price, %drift_pct, "Resting order within tolerance, holding");
            return LifecycleDecision::Hold { order_price, drift_pct };
        }

        info!(
            %instrument,
            %order_price,
            %reference_price,
            %drift_pct,
            tolerance = %self.config.tolerance_pct,
            "Resting order drifted, cancelling"
        );
        LifecycleDecision::Cancel(EngineAction::CancelStale {
            instrument: instrument.clone(),
            order_price,
            reference_price,
            drift_pct,
        })
    }

    /// The gateway accepted the cancel for these orders.
    pub fn cancel_confirmed(&mut self, instrument: &Instrument, orders: &[&PendingOrder]) {
        let set = self.cancelled.entry(instrument.clone()).or_default();
        set.extend(orders.iter().map(|o| OrderKey::from(*o)));
    }

    /// The cancel failed; the orders stay eligible for another attempt.
    pub fn cancel_failed(&mut self, instrument: &Instrument) {
        self.cancelled.remove(instrument);
    }
}
