//! Execution layer port definitions.
//!
//! Ports define the interfaces for external services (indicator data,
//! order transport). Adapters implement these ports for specific services
//! (Hyperliquid info API, stub, etc.).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use luma_domain::{AccountState, Candle, CandleInterval, Instrument, Leverage, OrderSide};

use crate::error::ExecError;

// =============================================================================
// Indicator Provider
// =============================================================================

/// Port for market and account data.
///
/// Implementations:
/// - `StubProvider` - For testing (in-memory candles and account)
/// - `HyperliquidInfoClient` - Public Hyperliquid `info` endpoint
#[async_trait]
pub trait IndicatorProvider: Send + Sync {
    /// Candle history for an instrument, oldest first.
    ///
    /// Fetched fresh on every call; never cached by the caller.
    async fn get_candles(
        &self,
        instrument: &Instrument,
        interval: CandleInterval,
    ) -> Result<Vec<Candle>, ExecError>;

    /// Account snapshot: equity, withdrawable cash, positions, open orders.
    async fn get_account_state(&self, address: &str) -> Result<AccountState, ExecError>;
}

// =============================================================================
// Execution Gateway
// =============================================================================

/// Limit entry ready for transport.
///
/// Size and price already satisfy the exchange precision rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitOrder {
    pub instrument: Instrument,
    pub side: OrderSide,
    pub price: Decimal,
    /// Size in coins
    pub size: Decimal,
    /// Notional in USD the size was derived from
    pub notional: Decimal,
    /// Client order id for idempotent retries
    pub client_order_id: Uuid,
}

/// Acknowledgement of an accepted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    /// Exchange-assigned order id, when reported
    pub exchange_order_id: Option<u64>,
    /// Client-provided order id, when sent
    pub client_order_id: Option<Uuid>,
    /// Filled size for immediate fills
    pub filled_size: Option<Decimal>,
    /// Average fill price for immediate fills
    pub avg_price: Option<Decimal>,
    pub acknowledged_at: DateTime<Utc>,
}

/// Port for order placement.
///
/// Every method reports acceptance or failure; a rejection is
/// `ExecError::OrderRejected` with the exchange reason.
///
/// Implementations:
/// - `StubGateway` - Paper trading, records every call
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Place a resting limit order.
    async fn place_limit(&self, order: &LimitOrder) -> Result<OrderAck, ExecError>;

    /// Market-close a position.
    ///
    /// # Arguments
    ///
    /// * `instrument` - Instrument to close
    /// * `side` - Order side (opposite of the position side)
    /// * `size` - Absolute position size in coins
    async fn place_market_close(
        &self,
        instrument: &Instrument,
        side: OrderSide,
        size: Decimal,
    ) -> Result<OrderAck, ExecError>;

    /// Cancel every resting order on an instrument. Returns how many were cancelled.
    async fn cancel_all(&self, instrument: &Instrument) -> Result<usize, ExecError>;

    /// Set the instrument leverage.
    async fn set_leverage(&self, instrument: &Instrument, leverage: Leverage) -> Result<(), ExecError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_limit_order_serialization() {
        let order = LimitOrder {
            instrument: Instrument::new("SOL").unwrap(),
            side: OrderSide::Buy,
            price: dec!(142.35),
            size: dec!(3.86),
            notional: dec!(550),
            client_order_id: Uuid::now_v7(),
        };

        let json = serde_json::to_string(&order).unwrap();
        assert!(json.contains("\"instrument\":\"SOL\""));
        assert!(json.contains("\"side\":\"BUY\""));

        let parsed: LimitOrder = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, order);
    }
}
