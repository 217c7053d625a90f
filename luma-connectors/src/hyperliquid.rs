//! Hyperliquid `info` REST client
//!
//! Read-only access to the public info endpoint:
//! - `candleSnapshot` for OHLCV history
//! - `clearinghouseState` for equity, withdrawable cash and positions
//! - `openOrders` for resting limit orders
//!
//! Every request is a JSON `POST` to a single URL. Numeric fields come back
//! as decimal strings and are parsed straight into `Decimal`.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use luma_domain::{
    AccountState, Candle, CandleInterval, Instrument, Leverage, OrderSide, PendingOrder, Position,
};
use luma_exec::{ExecError, IndicatorProvider};

// =============================================================================
// Constants
// =============================================================================

/// Hyperliquid mainnet info endpoint
pub const HYPERLIQUID_INFO_URL: &str = "https://api.hyperliquid.xyz/info";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur in the Hyperliquid info client.
#[derive(Debug, Clone, Error)]
pub enum HyperliquidError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// API returned a non-success status
    #[error("Hyperliquid API error: HTTP {status} - {body}")]
    ApiError { status: u16, body: String },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Request timed out
    #[error("Request timed out")]
    Timeout,
}

impl From<HyperliquidError> for ExecError {
    fn from(err: HyperliquidError) -> Self {
        match err {
            HyperliquidError::Timeout => ExecError::Timeout(err.to_string()),
            other => ExecError::DataUnavailable(other.to_string()),
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Connection settings for the info client.
#[derive(Debug, Clone)]
pub struct HyperliquidConfig {
    /// Info endpoint URL
    pub info_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Candles requested for intraday intervals
    pub candle_count: i64,
    /// Candles requested for the daily interval (cycle filter needs 200+)
    pub daily_candle_count: i64,
}

impl Default for HyperliquidConfig {
    fn default() -> Self {
        Self {
            info_url: HYPERLIQUID_INFO_URL.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            candle_count: 100,
            daily_candle_count: 250,
        }
    }
}

// =============================================================================
// Hyperliquid Info Client
// =============================================================================

/// Hyperliquid public info client.
pub struct HyperliquidInfoClient {
    /// HTTP client
    client: Client,
    config: HyperliquidConfig,
}

impl HyperliquidInfoClient {
    /// Create a new client.
    pub fn new(config: HyperliquidConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Settings in use
    pub fn config(&self) -> &HyperliquidConfig {
        &self.config
    }

    /// POST a request body to the info endpoint and return the raw response.
    async fn post_info(&self, payload: Value) -> Result<String, HyperliquidError> {
        let response = timeout(
            self.config.request_timeout,
            self.client.post(&self.config.info_url).json(&payload).send(),
        )
        .await
        .map_err(|_| HyperliquidError::Timeout)?
        .map_err(|e| HyperliquidError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| HyperliquidError::ParseError(e.to_string()))?;

        if !status.is_success() {
            return Err(HyperliquidError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }

    /// Fetch candle history ending now, oldest first.
    ///
    /// # Endpoint
    ///
    /// `POST /info {"type": "candleSnapshot", "req": {...}}`
    pub async fn fetch_candles(
        &self,
        coin: &str,
        interval: CandleInterval,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, HyperliquidError> {
        let count = match interval {
            CandleInterval::OneDay => self.config.daily_candle_count,
            _ => self.config.candle_count,
        };
        let start = end - interval.duration() * i32::try_from(count).unwrap_or(i32::MAX);
        let payload = json!({
            "type": "candleSnapshot",
            "req": {
                "coin": coin,
                "interval": interval.as_str(),
                "startTime": start.timestamp_millis(),
                "endTime": end.timestamp_millis(),
            }
        });

        let body = self.post_info(payload).await?;
        let candles = parse_candles(&body)?;
        debug!(coin, interval = interval.as_str(), count = candles.len(), "Candles fetched");
        Ok(candles)
    }

    /// Fetch equity, withdrawable cash and positions.
    ///
    /// # Endpoint
    ///
    /// `POST /info {"type": "clearinghouseState", "user": address}`
    pub async fn fetch_clearinghouse(&self, address: &str) -> Result<AccountState, HyperliquidError> {
        let body = self
            .post_info(json!({ "type": "clearinghouseState", "user": address }))
            .await?;
        parse_clearinghouse(&body)
    }

    /// Fetch resting orders.
    ///
    /// # Endpoint
    ///
    /// `POST /info {"type": "openOrders", "user": address}`
    pub async fn fetch_open_orders(&self, address: &str) -> Result<Vec<PendingOrder>, HyperliquidError> {
        let body = self
            .post_info(json!({ "type": "openOrders", "user": address }))
            .await?;
        parse_open_orders(&body)
    }
}

#[async_trait]
impl IndicatorProvider for HyperliquidInfoClient {
    async fn get_candles(
        &self,
        instrument: &Instrument,
        interval: CandleInterval,
    ) -> Result<Vec<Candle>, ExecError> {
        let candles = self.fetch_candles(instrument.as_str(), interval, Utc::now()).await?;
        if candles.is_empty() {
            return Err(ExecError::DataUnavailable(format!(
                "no {} candles for {}",
                interval.as_str(),
                instrument
            )));
        }
        Ok(candles)
    }

    async fn get_account_state(&self, address: &str) -> Result<AccountState, ExecError> {
        if address.is_empty() {
            return Err(ExecError::Config("wallet address is not set".to_string()));
        }
        let (mut account, open_orders) =
            tokio::try_join!(self.fetch_clearinghouse(address), self.fetch_open_orders(address))?;
        account.open_orders = open_orders;
        Ok(account)
    }
}

// =============================================================================
// Hyperliquid Types (from API responses)
// =============================================================================

/// One candle from `candleSnapshot`.
#[derive(Debug, Deserialize)]
struct RawCandle {
    /// Open time (ms)
    t: i64,
    o: Decimal,
    h: Decimal,
    l: Decimal,
    c: Decimal,
    v: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClearinghouse {
    margin_summary: RawMarginSummary,
    withdrawable: Decimal,
    #[serde(default)]
    asset_positions: Vec<RawAssetPosition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMarginSummary {
    account_value: Decimal,
}

#[derive(Debug, Deserialize)]
struct RawAssetPosition {
    position: RawPosition,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPosition {
    coin: String,
    szi: Decimal,
    entry_px: Option<Decimal>,
    unrealized_pnl: Decimal,
    margin_used: Decimal,
    leverage: RawLeverage,
}

#[derive(Debug, Deserialize)]
struct RawLeverage {
    value: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOpenOrder {
    coin: String,
    limit_px: Decimal,
    /// "B" (bid) or "A" (ask)
    side: String,
    sz: Decimal,
    oid: u64,
}

// =============================================================================
// Parsing
// =============================================================================

fn parse_json<'a, T: Deserialize<'a>>(body: &'a str) -> Result<T, HyperliquidError> {
    serde_json::from_str(body).map_err(|e| HyperliquidError::ParseError(e.to_string()))
}

/// Parse a `candleSnapshot` response into candles sorted by open time.
pub fn parse_candles(body: &str) -> Result<Vec<Candle>, HyperliquidError> {
    let raw: Vec<RawCandle> = parse_json(body)?;
    let mut candles = raw
        .into_iter()
        .map(|c| {
            let open_time = Utc
                .timestamp_millis_opt(c.t)
                .single()
                .ok_or_else(|| HyperliquidError::ParseError(format!("bad candle time {}", c.t)))?;
            Ok(Candle::new(c.o, c.h, c.l, c.c, c.v, open_time))
        })
        .collect::<Result<Vec<_>, HyperliquidError>>()?;
    candles.sort_by_key(|c| c.open_time);
    Ok(candles)
}

/// Parse a `clearinghouseState` response. Open orders are left empty.
///
/// Positions that cannot be mirrored (zero size, missing entry) are skipped
/// with a warning instead of failing the whole snapshot.
pub fn parse_clearinghouse(body: &str) -> Result<AccountState, HyperliquidError> {
    let raw: RawClearinghouse = parse_json(body)?;

    let mut positions = Vec::with_capacity(raw.asset_positions.len());
    for asset in raw.asset_positions {
        let p = asset.position;
        match to_position(&p) {
            Ok(position) => positions.push(position),
            Err(reason) => warn!(coin = %p.coin, %reason, "Skipping unmirrorable position"),
        }
    }

    Ok(AccountState {
        equity: raw.margin_summary.account_value,
        withdrawable: raw.withdrawable,
        positions,
        open_orders: Vec::new(),
    })
}

fn to_position(p: &RawPosition) -> Result<Position, String> {
    let instrument = Instrument::new(p.coin.as_str()).map_err(|e| e.to_string())?;
    let entry = p.entry_px.ok_or_else(|| "missing entry price".to_string())?;
    let leverage = u8::try_from(p.leverage.value)
        .map_err(|e| e.to_string())
        .and_then(|v| Leverage::new(v).map_err(|e| e.to_string()))?;
    Position::from_signed_size(instrument, p.szi, entry, p.unrealized_pnl, p.margin_used, leverage)
        .map_err(|e| e.to_string())
}

/// Parse an `openOrders` response.
pub fn parse_open_orders(body: &str) -> Result<Vec<PendingOrder>, HyperliquidError> {
    let raw: Vec<RawOpenOrder> = parse_json(body)?;
    raw.into_iter()
        .map(|o| {
            let instrument = Instrument::new(o.coin.as_str())
                .map_err(|e| HyperliquidError::ParseError(e.to_string()))?;
            let side = match o.side.as_str() {
                "B" => OrderSide::Buy,
                "A" => OrderSide::Sell,
                other => {
                    return Err(HyperliquidError::ParseError(format!("unknown order side {}", other)))
                },
            };
            Ok(PendingOrder {
                size: Some(o.sz),
                order_id: Some(o.oid),
                ..PendingOrder::new(instrument, o.limit_px, side)
            })
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
