//! Luma Exchange Connectors
//!
//! Adapters for exchange APIs (read-only REST).
//! Normalizes exchange-specific types to domain types.

#![warn(clippy::all)]

// Public modules
pub mod hyperliquid;

// Re-exports
pub use hyperliquid::{
    parse_candles, parse_clearinghouse, parse_open_orders, HyperliquidConfig, HyperliquidError,
    HyperliquidInfoClient, HYPERLIQUID_INFO_URL,
};
