//! Exchange precision rules.
//!
//! Perpetual venues reject sizes with more decimals than the instrument's
//! `szDecimals` and prices with more than 5 significant figures or more than
//! `6 - szDecimals` decimals. Everything sent through the gateway passes
//! through here first.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{ExecError, ExecResult};

/// Significant figures allowed in a price
pub const PRICE_SIGNIFICANT_FIGURES: u32 = 5;

/// Decimal budget shared by size and price on perpetuals
pub const MAX_PRICE_DECIMALS: u32 = 6;

/// Truncate a coin size toward zero to `size_decimals`.
///
/// # Errors
///
/// `ExecError::Precision` when the size truncates to zero (or was not positive).
pub fn round_size(size: Decimal, size_decimals: u32) -> ExecResult<Decimal> {
    let truncated = size.round_dp_with_strategy(size_decimals, RoundingStrategy::ToZero);
    if truncated <= Decimal::ZERO {
        return Err(ExecError::Precision(format!(
            "size {} truncates to zero at {} decimals",
            size, size_decimals
        )));
    }
    Ok(truncated.normalize())
}

/// Round a limit price to 5 significant figures and at most
/// `6 - size_decimals` decimals.
pub fn round_price(price: Decimal, size_decimals: u32) -> ExecResult<Decimal> {
    if price <= Decimal::ZERO {
        return Err(ExecError::Precision(format!("price {} is not positive", price)));
    }
    let max_decimals = MAX_PRICE_DECIMALS.saturating_sub(size_decimals);
    let significant = price
        .round_sf(PRICE_SIGNIFICANT_FIGURES)
        .ok_or_else(|| ExecError::Precision(format!("price {} cannot be rounded", price)))?;
    let rounded = significant.round_dp(max_decimals);
    if rounded <= Decimal::ZERO {
        return Err(ExecError::Precision(format!(
            "price {} rounds to zero at {} decimals",
            price, max_decimals
        )));
    }
    Ok(rounded.normalize())
}

/// Coin size buying `notional` USD at `price`, truncated to `size_decimals`.
///
/// # Example
///
/// ```
/// use luma_exec::precision::size_for_notional;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(size_for_notional(dec!(550), dec!(142.35), 2).unwrap(), dec!(3.86));
/// ```
pub fn size_for_notional(notional: Decimal, price: Decimal, size_decimals: u32) -> ExecResult<Decimal> {
    let coins = notional
        .checked_div(price)
        .ok_or_else(|| ExecError::Precision(format!("cannot size {} at price {}", notional, price)))?;
    round_size(coins, size_decimals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_size_truncates_toward_zero() {
        assert_eq!(round_size(dec!(3.8699), 2).unwrap(), dec!(3.86));
        assert_eq!(round_size(dec!(12.9), 0).unwrap(), dec!(12));
    }

    #[test]
    fn test_size_truncating_to_zero_is_rejected() {
        let err = round_size(dec!(0.004), 2).unwrap_err();
        assert!(matches!(err, ExecError::Precision(_)));
        assert!(round_size(dec!(-1), 2).is_err());
    }

    #[test]
    fn test_price_significant_figures() {
        assert_eq!(round_price(dec!(142.3456), 2).unwrap(), dec!(142.35));
        assert_eq!(round_price(dec!(95123.7), 5).unwrap(), dec!(95124));
        assert_eq!(round_price(dec!(0.123456789), 0).unwrap(), dec!(0.12346));
    }

    #[test]
    fn test_price_decimal_budget() {
        // 5 sig figs would keep 4 decimals, but 6 - 4 leaves only 2
        assert_eq!(round_price(dec!(1.234567), 4).unwrap(), dec!(1.23));
    }

    #[test]
    fn test_price_must_be_positive() {
        assert!(round_price(Decimal::ZERO, 2).is_err());
    }

    #[test]
    fn test_size_for_notional() {
        assert_eq!(size_for_notional(dec!(550), dec!(142.35), 2).unwrap(), dec!(3.86));
        assert!(size_for_notional(dec!(550), Decimal::ZERO, 2).is_err());
        assert!(size_for_notional(dec!(1), dec!(95000), 3).is_err());
    }
}
