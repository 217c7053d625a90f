//! Indicators over candle history.
//!
//! All functions are pure and return `None` when the history is too short
//! or a divisor is zero. Callers treat `None` as "no signal".

use luma_domain::Candle;
use rust_decimal::Decimal;

/// Relative Strength Index over the last `period` close-to-close changes.
///
/// Simple (Cutler) averaging of gains and losses:
/// `RSI = 100 - 100 / (1 + avg_gain / avg_loss)`.
/// Edge case: `avg_loss == 0` → 100.
///
/// # Examples
/// ```
/// # use luma_engine::indicators::rsi;
/// # use rust_decimal_macros::dec;
/// let rising: Vec<_> = (1..=15).map(rust_decimal::Decimal::from).collect();
/// assert_eq!(rsi(&rising, 14), Some(dec!(100)));
/// ```
pub fn rsi(closes: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let window = &closes[closes.len() - period - 1..];
    let (mut gains, mut losses) = (Decimal::ZERO, Decimal::ZERO);
    for pair in window.windows(2) {
        let change = pair[1] - pair[0];
        if change > Decimal::ZERO {
            gains += change;
        } else {
            losses -= change;
        }
    }

    let period = Decimal::from(period as u64);
    let avg_gain = gains.checked_div(period)?;
    let avg_loss = losses.checked_div(period)?;
    if avg_loss.is_zero() {
        return Some(Decimal::ONE_HUNDRED);
    }

    let rs = avg_gain.checked_div(avg_loss)?;
    let denominator = Decimal::ONE + rs;
    Some(Decimal::ONE_HUNDRED - Decimal::ONE_HUNDRED.checked_div(denominator)?)
}

/// Exponential moving average seeded with the first close.
///
/// Requires at least `period` closes.
pub fn ema(closes: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let k = Decimal::TWO.checked_div(Decimal::from(period as u64 + 1))?;
    let mut iter = closes.iter();
    let mut value = *iter.next()?;
    for close in iter {
        value = *close * k + value * (Decimal::ONE - k);
    }
    Some(value)
}

/// Simple moving average of the last `period` values.
pub fn sma(values: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || values.len() < period {
        return None;
    }
    let sum: Decimal = values[values.len() - period..].iter().sum();
    sum.checked_div(Decimal::from(period as u64))
}

/// Average body of the `lookback` candles preceding the last one.
pub fn average_prior_body(candles: &[Candle], lookback: usize) -> Option<Decimal> {
    let prior = prior_window(candles, lookback)?;
    let sum: Decimal = prior.iter().map(Candle::body).sum();
    sum.checked_div(Decimal::from(lookback as u64))
}

/// Average volume of the `lookback` candles preceding the last one.
pub fn average_prior_volume(candles: &[Candle], lookback: usize) -> Option<Decimal> {
    let prior = prior_window(candles, lookback)?;
    let sum: Decimal = prior.iter().map(|c| c.volume).sum();
    sum.checked_div(Decimal::from(lookback as u64))
}

/// Last candle volume is strictly above `factor ×` the prior average.
pub fn volume_spike(candles: &[Candle], lookback: usize, factor: Decimal) -> bool {
    match (candles.last(), average_prior_volume(candles, lookback)) {
        (Some(last), Some(avg)) if avg > Decimal::ZERO => last.volume > avg * factor,
        _ => false,
    }
}

/// Close prices in order.
pub fn closes(candles: &[Candle]) -> Vec<Decimal> {
    candles.iter().map(|c| c.close).collect()
}

fn prior_window(candles: &[Candle], lookback: usize) -> Option<&[Candle]> {
    if lookback == 0 || candles.len() < lookback + 1 {
        return None;
    }
    let end = candles.len() - 1;
    Some(&candles[end - lookback..end])
}
