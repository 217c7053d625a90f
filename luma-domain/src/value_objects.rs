//! Value Objects for the Luma Domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Instrument name is empty or malformed
    #[error("Invalid instrument: {0}")]
    InvalidInstrument(String),

    /// Instrument class string is not recognized
    #[error("Invalid instrument class: {0}")]
    InvalidInstrumentClass(String),

    /// Leverage outside the supported range
    #[error("Invalid leverage: {0}")]
    InvalidLeverage(String),

    /// Price must be positive
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Position snapshot is inconsistent (zero size, bad entry, ...)
    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    /// Candle interval string is not recognized
    #[error("Invalid candle interval: {0}")]
    InvalidInterval(String),
}

// =============================================================================
// Instrument
// =============================================================================

/// Instrument represents a tradable perpetual (e.g., SOL, WIF, kPEPE).
///
/// # Invariants
/// - Non-empty
/// - No whitespace, `:` or `,` (these delimit the instrument list in config)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instrument(String);

impl Instrument {
    /// Create a new Instrument with validation
    ///
    /// # Examples
    /// ```
    /// # use luma_domain::value_objects::Instrument;
    /// let sol = Instrument::new("SOL").unwrap();
    /// assert_eq!(sol.as_str(), "SOL");
    /// assert!(Instrument::new("").is_err());
    /// ```
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        if name.is_empty() {
            return Err(DomainError::InvalidInstrument("Instrument must be non-empty".to_string()));
        }
        if name.chars().any(|c| c.is_whitespace() || c == ':' || c == ',') {
            return Err(DomainError::InvalidInstrument(format!(
                "Instrument contains a reserved character: {name}"
            )));
        }
        Ok(Self(name))
    }

    /// Get the instrument name as used by the exchange
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Instrument {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

// =============================================================================
// InstrumentClass
// =============================================================================

/// Behavioural class of an instrument.
///
/// Trend-following instruments (SOL, SUI, ETH) get tighter trap ceilings and
/// stops. High-volatility instruments (DOGE, WIF, PENGU) are allowed to run
/// hotter before a pump is considered a trap, and get wider stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentClass {
    /// Reliable trend followers
    TrendFollowing,
    /// Memecoin-style instruments
    HighVolatility,
}

impl fmt::Display for InstrumentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentClass::TrendFollowing => write!(f, "trend"),
            InstrumentClass::HighVolatility => write!(f, "volatile"),
        }
    }
}

impl FromStr for InstrumentClass {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trend" | "trend_following" => Ok(InstrumentClass::TrendFollowing),
            "volatile" | "high_volatility" | "meme" => Ok(InstrumentClass::HighVolatility),
            other => Err(DomainError::InvalidInstrumentClass(other.to_string())),
        }
    }
}

// =============================================================================
// Side
// =============================================================================

/// Side represents the position direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Long position (buy low, sell high)
    Long,
    /// Short position (sell high, buy low)
    Short,
}

impl Side {
    /// Derive the side from an exchange signed size (`szi`).
    ///
    /// Returns `None` for a zero size.
    pub fn from_signed_size(size: Decimal) -> Option<Self> {
        if size > Decimal::ZERO {
            Some(Side::Long)
        } else if size < Decimal::ZERO {
            Some(Side::Short)
        } else {
            None
        }
    }

    /// Get the entry action for this side
    ///
    /// Long → Buy, Short → Sell
    pub fn entry_action(&self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Buy,
            Side::Short => OrderSide::Sell,
        }
    }

    /// Get the exit action for this side
    ///
    /// Long → Sell, Short → Buy
    pub fn exit_action(&self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Sell,
            Side::Short => OrderSide::Buy,
        }
    }

    /// +1 for Long, -1 for Short
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Long => Decimal::ONE,
            Side::Short => Decimal::NEGATIVE_ONE,
        }
    }

    /// The other side
    pub fn opposite(&self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// OrderSide represents the order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    /// Buy order
    Buy,
    /// Sell order
    Sell,
}

impl OrderSide {
    /// Whether this is a buy
    pub fn is_buy(&self) -> bool {
        matches!(self, OrderSide::Buy)
    }

    /// Position side opened by this order when entering
    pub fn opening_side(&self) -> Side {
        match self {
            OrderSide::Buy => Side::Long,
            OrderSide::Sell => Side::Short,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

// =============================================================================
// Leverage
// =============================================================================

/// Leverage multiplier applied to an instrument.
///
/// # Invariants
/// - 1 ≤ leverage ≤ 50
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Leverage(u8);

impl Leverage {
    /// Highest leverage any venue we target allows
    pub const MAX: u8 = 50;

    /// Create a new Leverage with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidLeverage` if outside 1..=50
    pub fn new(value: u8) -> Result<Self, DomainError> {
        if value == 0 || value > Self::MAX {
            return Err(DomainError::InvalidLeverage(format!(
                "Leverage must be between 1 and {}, got {}",
                Self::MAX,
                value
            )));
        }
        Ok(Self(value))
    }

    /// Clamp into 1..=50 (for compile-time defaults)
    pub const fn clamped(value: u8) -> Self {
        if value == 0 {
            Self(1)
        } else if value > Self::MAX {
            Self(Self::MAX)
        } else {
            Self(value)
        }
    }

    /// Get the raw multiplier
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Multiplier as a Decimal (for notional math)
    pub fn as_decimal(&self) -> Decimal {
        Decimal::from(self.0)
    }
}

impl fmt::Display for Leverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_instrument_validation() {
        assert!(Instrument::new("SOL").is_ok());
        assert!(Instrument::new("kPEPE").is_ok());
        assert!(Instrument::new("").is_err());
        assert!(Instrument::new("SO L").is_err());
        assert!(Instrument::new("SOL:trend").is_err());
    }

    #[test]
    fn test_instrument_class_parsing() {
        assert_eq!("trend".parse::<InstrumentClass>().unwrap(), InstrumentClass::TrendFollowing);
        assert_eq!("MEME".parse::<InstrumentClass>().unwrap(), InstrumentClass::HighVolatility);
        assert!("sideways".parse::<InstrumentClass>().is_err());
    }

    #[test]
    fn test_side_from_signed_size() {
        assert_eq!(Side::from_signed_size(dec!(1.5)), Some(Side::Long));
        assert_eq!(Side::from_signed_size(dec!(-0.2)), Some(Side::Short));
        assert_eq!(Side::from_signed_size(Decimal::ZERO), None);
    }

    #[test]
    fn test_side_actions() {
        assert_eq!(Side::Long.entry_action(), OrderSide::Buy);
        assert_eq!(Side::Long.exit_action(), OrderSide::Sell);
        assert_eq!(Side::Short.entry_action(), OrderSide::Sell);
        assert_eq!(Side::Short.exit_action(), OrderSide::Buy);
        assert_eq!(OrderSide::Sell.opening_side(), Side::Short);
    }

    #[test]
    fn test_leverage_bounds() {
        assert!(Leverage::new(0).is_err());
        assert!(Leverage::new(51).is_err());
        assert_eq!(Leverage::new(10).unwrap().as_decimal(), dec!(10));
        assert_eq!(Leverage::new(5).unwrap().to_string(), "5x");
        assert_eq!(Leverage::clamped(0).value(), 1);
        assert_eq!(Leverage::clamped(80).value(), 50);
    }
}
