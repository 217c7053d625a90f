//! Signal Arbitrator
//!
//! Merges independent heuristics into at most one entry proposal per
//! instrument per tick:
//!
//! - **Trap filter**: classifies an outsized candle as organic or suspect
//! - **Momentum**: volume spike in the direction of the EMA baseline
//! - **Structural**: pullback / rejection / breakout setups per class, then
//!   fair-value gaps across the last three candles
//! - **Reversal**: absorption and exhaustion divergences
//!
//! Structural and reversal signals outrank momentum. Short history or a zero
//! divisor means "no signal", never an error. A proposal's reference price is
//! the last close, except for a fair-value gap, which enters at the gap
//! midpoint.

use luma_domain::{Candle, InstrumentClass, InstrumentSpec, Proposal, Side, SignalSource};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EngineError, EngineResult};
use crate::indicators::{average_prior_body, closes, ema, rsi, volume_spike};

// =============================================================================
// Configuration
// =============================================================================

/// Exclusive RSI band `(low, high)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsiBand {
    pub low: Decimal,
    pub high: Decimal,
}

impl RsiBand {
    pub const fn new(low: Decimal, high: Decimal) -> Self {
        Self { low, high }
    }

    /// Strictly inside the band
    pub fn contains(&self, value: Decimal) -> bool {
        self.low < value && value < self.high
    }
}

/// Heuristic parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Candles required before any heuristic runs
    pub min_history: usize,
    pub ema_period: usize,
    pub rsi_period: usize,

    /// Prior candles compared against the last one
    pub lookback: usize,
    pub trap_body_factor: Decimal,
    pub trap_volume_factor: Decimal,
    pub trend_rsi_ceiling: Decimal,
    pub volatile_rsi_ceiling: Decimal,

    pub momentum_volume_factor: Decimal,

    pub trend_pullback: RsiBand,
    pub trend_rejection: RsiBand,
    pub volatile_breakout: RsiBand,
    pub volatile_panic: RsiBand,

    pub absorption_volume_factor: Decimal,
    pub absorption_rsi_max: Decimal,
    pub exhaustion_volume_factor: Decimal,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            min_history: 55,
            ema_period: 50,
            rsi_period: 14,
            lookback: 10,
            trap_body_factor: dec!(3),
            trap_volume_factor: dec!(2),
            trend_rsi_ceiling: dec!(75),
            volatile_rsi_ceiling: dec!(85),
            momentum_volume_factor: dec!(1.5),
            trend_pullback: RsiBand::new(dec!(40), dec!(55)),
            trend_rejection: RsiBand::new(dec!(45), dec!(60)),
            volatile_breakout: RsiBand::new(dec!(55), dec!(75)),
            volatile_panic: RsiBand::new(dec!(25), dec!(45)),
            absorption_volume_factor: dec!(1.5),
            absorption_rsi_max: dec!(50),
            exhaustion_volume_factor: dec!(0.7),
        }
    }
}

impl SignalConfig {
    /// Lookbacks must fit inside the minimum history.
    pub fn validate(&self) -> EngineResult<()> {
        let needed = self.ema_period.max(self.rsi_period + 1).max(self.lookback + 1);
        if self.min_history < needed {
            return Err(EngineError::invalid(format!(
                "min_history {} is shorter than the longest lookback {}",
                self.min_history, needed
            )));
        }
        if self.rsi_period == 0 || self.ema_period == 0 || self.lookback == 0 {
            return Err(EngineError::invalid("indicator periods must be positive"));
        }
        Ok(())
    }

    fn rsi_ceiling(&self, class: InstrumentClass) -> Decimal {
        match class {
            InstrumentClass::TrendFollowing => self.trend_rsi_ceiling,
            InstrumentClass::HighVolatility => self.volatile_rsi_ceiling,
        }
    }
}

// =============================================================================
// Trap Classification
// =============================================================================

/// Verdict of the trap filter on an outsized candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrapClassification {
    /// Organic move up
    RealPump,
    /// Organic move down
    RealDump,
    /// Suspected manipulation in the given direction
    Rejected(Side),
}

impl TrapClassification {
    /// Organic move in `side`'s direction
    pub fn confirms(&self, side: Side) -> bool {
        matches!(
            (self, side),
            (TrapClassification::RealPump, Side::Long) | (TrapClassification::RealDump, Side::Short)
        )
    }

    /// Organic move against `side`
    pub fn opposes(&self, side: Side) -> bool {
        self.confirms(side.opposite())
    }

    /// Suspect move in `side`'s direction
    pub fn rejects(&self, side: Side) -> bool {
        matches!(self, TrapClassification::Rejected(s) if *s == side)
    }
}

impl fmt::Display for TrapClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrapClassification::RealPump => write!(f, "REAL_PUMP"),
            TrapClassification::RealDump => write!(f, "REAL_DUMP"),
            TrapClassification::Rejected(side) => write!(f, "REJECTED_{side}"),
        }
    }
}

// =============================================================================
// Evaluation
// =============================================================================

/// A heuristic that fired, before arbitration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalCandidate {
    pub side: Side,
    pub source: SignalSource,
    pub reason: &'static str,
    /// Entry price named by the setup; the last close otherwise
    pub price: Option<Decimal>,
}

/// Why a candidate did not become the proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Veto {
    /// Trap filter flagged a suspect move in the candidate's direction
    SuspectMove,
    /// Trap filter confirmed an organic move against the candidate
    OpposingMove,
    /// Guard flags are up and there is no organic confirmation
    Unconfirmed,
}

/// Full result of one arbitration, for logging and tests.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Evaluation {
    pub trap: Option<TrapClassification>,
    pub momentum: Option<SignalCandidate>,
    pub structural: Option<SignalCandidate>,
    pub momentum_veto: Option<Veto>,
    pub structural_veto: Option<Veto>,
    pub proposal: Option<Proposal>,
}

// =============================================================================
// Arbitrator
// =============================================================================

/// Stateless arbitrator over one instrument's candle history.
#[derive(Debug, Clone)]
pub struct SignalArbitrator {
    config: SignalConfig,
}

impl SignalArbitrator {
    /// Create an arbitrator with validated config.
    pub fn new(config: SignalConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Parameters in use
    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Classify the last candle against the prior `lookback` candles.
    ///
    /// A candle qualifies when its body exceeds `trap_body_factor ×` the
    /// average prior body and its volume exceeds `trap_volume_factor ×` the
    /// previous candle's volume. Green candles are organic when RSI is at or
    /// below the class ceiling; red candles when RSI is at or above
    /// `100 - ceiling`.
    pub fn classify_trap(&self, class: InstrumentClass, candles: &[Candle]) -> Option<TrapClassification> {
        let (last, prev) = last_two(candles)?;
        let avg_body = average_prior_body(candles, self.config.lookback)?;

        let outsized = last.body() > avg_body * self.config.trap_body_factor;
        let heavy = last.volume > prev.volume * self.config.trap_volume_factor;
        if !outsized || !heavy {
            return None;
        }

        let rsi = rsi(&closes(candles), self.config.rsi_period)?;
        let ceiling = self.config.rsi_ceiling(class);

        if last.is_bullish() {
            Some(if rsi <= ceiling {
                TrapClassification::RealPump
            } else {
                TrapClassification::Rejected(Side::Long)
            })
        } else if last.is_bearish() {
            Some(if rsi >= Decimal::ONE_HUNDRED - ceiling {
                TrapClassification::RealDump
            } else {
                TrapClassification::Rejected(Side::Short)
            })
        } else {
            None
        }
    }

    /// Volume spike in the direction of the EMA baseline.
    fn momentum(&self, last_close: Decimal, baseline: Decimal, spike: bool) -> Option<SignalCandidate> {
        if !spike {
            return None;
        }
        let side = if last_close > baseline {
            Side::Long
        } else if last_close < baseline {
            Side::Short
        } else {
            return None;
        };
        Some(SignalCandidate {
            side,
            source: SignalSource::Momentum,
            reason: "VOLUME_MOMENTUM",
            price: None,
        })
    }

    /// Class-specific structure setups.
    fn structural(
        &self,
        class: InstrumentClass,
        last_close: Decimal,
        baseline: Decimal,
        rsi: Decimal,
        spike: bool,
    ) -> Option<SignalCandidate> {
        let c = &self.config;
        let above = last_close > baseline;
        let below = last_close < baseline;

        let (side, reason) = match class {
            InstrumentClass::TrendFollowing => {
                if above && c.trend_pullback.contains(rsi) {
                    (Side::Long, "TREND_PULLBACK")
                } else if below && c.trend_rejection.contains(rsi) {
                    (Side::Short, "TREND_REJECTION")
                } else {
                    return None;
                }
            },
            InstrumentClass::HighVolatility => {
                if above && spike && c.volatile_breakout.contains(rsi) {
                    (Side::Long, "MOMENTUM_BREAKOUT")
                } else if below && spike && c.volatile_panic.contains(rsi) {
                    (Side::Short, "PANIC_DUMP")
                } else {
                    return None;
                }
            },
        };

        Some(SignalCandidate {
            side,
            source: SignalSource::Structural,
            reason,
            price: None,
        })
    }

    /// Fair-value gap: the last candle's range does not overlap the candle two
    /// bars back, leaving an untraded band between them. A gap up proposes a
    /// long, a gap down a short, both with a limit at the gap midpoint.
    fn fair_value_gap(&self, candles: &[Candle]) -> Option<SignalCandidate> {
        let [.., first, _, last] = candles else {
            return None;
        };

        let (side, reason, lower, upper) = if last.low > first.high {
            (Side::Long, "FVG_BUY", first.high, last.low)
        } else if last.high < first.low {
            (Side::Short, "FVG_SELL", last.high, first.low)
        } else {
            return None;
        };

        Some(SignalCandidate {
            side,
            source: SignalSource::Structural,
            reason,
            price: Some((lower + upper) / Decimal::TWO),
        })
    }

    /// Absorption (long) and exhaustion (short) divergences.
    fn reversal(&self, last: &Candle, prev: &Candle, rsi: Decimal) -> Option<SignalCandidate> {
        let c = &self.config;
        if last.close < prev.low
            && last.volume > prev.volume * c.absorption_volume_factor
            && rsi < c.absorption_rsi_max
        {
            return Some(SignalCandidate {
                side: Side::Long,
                source: SignalSource::Reversal,
                reason: "ABSORPTION_BUY",
                price: None,
            });
        }
        if last.close > prev.high && last.volume < prev.volume * c.exhaustion_volume_factor {
            return Some(SignalCandidate {
                side: Side::Short,
                source: SignalSource::Reversal,
                reason: "EXHAUSTION_SELL",
                price: None,
            });
        }
        None
    }

    /// Run every heuristic and arbitrate.
    ///
    /// # Arguments
    ///
    /// * `spec` - Instrument and class
    /// * `candles` - History, oldest first
    /// * `require_confirmation` - Shield or titan guard is active
    pub fn evaluate(&self, spec: &InstrumentSpec, candles: &[Candle], require_confirmation: bool) -> Evaluation {
        let mut eval = Evaluation::default();
        if candles.len() < self.config.min_history {
            return eval;
        }
        let Some((last, prev)) = last_two(candles) else {
            return eval;
        };

        let closes = closes(candles);
        let (Some(baseline), Some(rsi)) =
            (ema(&closes, self.config.ema_period), rsi(&closes, self.config.rsi_period))
        else {
            return eval;
        };
        let spike = volume_spike(candles, self.config.lookback, self.config.momentum_volume_factor);

        eval.trap = self.classify_trap(spec.class, candles);
        eval.momentum = self.momentum(last.close, baseline, spike);
        eval.structural = self
            .structural(spec.class, last.close, baseline, rsi, spike)
            .or_else(|| self.fair_value_gap(candles))
            .or_else(|| self.reversal(last, prev, rsi));

        eval.structural_veto = eval
            .structural
            .as_ref()
            .and_then(|s| structural_veto(eval.trap, s.side));
        eval.momentum_veto = eval
            .momentum
            .as_ref()
            .and_then(|m| momentum_veto(eval.trap, m.side, require_confirmation));

        let winner = match (&eval.structural, eval.structural_veto, &eval.momentum, eval.momentum_veto) {
            (Some(s), None, _, _) => Some(s),
            (_, _, Some(m), None) => Some(m),
            _ => None,
        };

        eval.proposal = winner.map(|w| Proposal {
            instrument: spec.instrument.clone(),
            side: w.side,
            reference_price: w.price.unwrap_or(last.close),
            source: w.source,
            reason: w.reason.to_string(),
        });
        eval
    }
}

fn last_two(candles: &[Candle]) -> Option<(&Candle, &Candle)> {
    match candles {
        [.., prev, last] => Some((last, prev)),
        _ => None,
    }
}

fn momentum_veto(trap: Option<TrapClassification>, side: Side, require_confirmation: bool) -> Option<Veto> {
    match trap {
        Some(t) if t.rejects(side) => Some(Veto::SuspectMove),
        Some(t) if t.opposes(side) => Some(Veto::OpposingMove),
        Some(t) if t.confirms(side) => None,
        _ if require_confirmation => Some(Veto::Unconfirmed),
        _ => None,
    }
}

fn structural_veto(trap: Option<TrapClassification>, side: Side) -> Option<Veto> {
    match trap {
        Some(t) if t.opposes(side) => Some(Veto::OpposingMove),
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use luma_domain::Instrument;

    fn spec(class: InstrumentClass) -> InstrumentSpec {
        InstrumentSpec::new(Instrument::new("SOL").unwrap(), class, 2)
    }

    fn arbitrator() -> SignalArbitrator {
        SignalArbitrator::new(SignalConfig::default()).unwrap()
    }

    /// Build candles from (open, close, volume); high/low hug the body.
    fn series(bars: &[(Decimal, Decimal, Decimal)]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 6, 5, 0, 0, 0).unwrap();
        bars.iter()
            .enumerate()
            .map(|(i, (o, c, v))| {
                Candle::new(*o, (*o).max(*c), (*o).min(*c), *c, *v, start + Duration::minutes(15 * i as i64))
            })
            .collect()
    }

    /// Zig-zag around `level` with small bodies and constant volume.
    fn choppy(level: Decimal, n: usize) -> Vec<(Decimal, Decimal, Decimal)> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    (level, level + dec!(0.5), dec!(100))
                } else {
                    (level + dec!(0.5), level, dec!(100))
                }
            })
            .collect()
    }

    #[test]
    fn test_short_history_is_no_signal() {
        let candles = series(&choppy(dec!(100), 40));
        let eval = arbitrator().evaluate(&spec(InstrumentClass::TrendFollowing), &candles, false);
        assert_eq!(eval, Evaluation::default());
    }

    #[test]
    fn test_trap_real_pump_and_rejected() {
        let mut bars = choppy(dec!(100), 60);
        bars.push((dec!(100), dec!(103), dec!(300)));
        let candles = series(&bars);

        // Last 14 changes: gains 6×0.5 + 3, losses 7×0.5 → RSI ≈ 63
        let trap = arbitrator().classify_trap(InstrumentClass::TrendFollowing, &candles);
        assert_eq!(trap, Some(TrapClassification::RealPump));

        let strict = SignalArbitrator::new(SignalConfig {
            trend_rsi_ceiling: dec!(60),
            ..SignalConfig::default()
        })
        .unwrap();
        assert_eq!(
            strict.classify_trap(InstrumentClass::TrendFollowing, &candles),
            Some(TrapClassification::Rejected(Side::Long))
        );
    }

    #[test]
    fn test_trap_requires_volume() {
        let mut bars = choppy(dec!(100), 60);
        bars.push((dec!(100), dec!(103), dec!(150)));
        let candles = series(&bars);
        assert_eq!(arbitrator().classify_trap(InstrumentClass::TrendFollowing, &candles), None);
    }

    #[test]
    fn test_trend_pullback_long() {
        // Long climb leaves the EMA well below price, then a flat pullback
        // with balanced gains and losses puts RSI at 50.
        let mut bars: Vec<_> = (0..50)
            .map(|i| {
                let p = dec!(100) + Decimal::from(i);
                (p, p + dec!(1), dec!(100))
            })
            .collect();
        for i in 0..14 {
            if i % 2 == 0 {
                bars.push((dec!(150.0), dec!(149.9), dec!(100)));
            } else {
                bars.push((dec!(149.9), dec!(150.0), dec!(100)));
            }
        }
        let candles = series(&bars);
        let eval = arbitrator().evaluate(&spec(InstrumentClass::TrendFollowing), &candles, false);

        let proposal = eval.proposal.expect("pullback proposal");
        assert_eq!(proposal.side, Side::Long);
        assert_eq!(proposal.source, SignalSource::Structural);
        assert_eq!(proposal.reason, "TREND_PULLBACK");
        assert_eq!(proposal.reference_price, candles.last().unwrap().close);
    }

    #[test]
    fn test_momentum_vetoed_by_rejected_trap() {
        let trap = Some(TrapClassification::Rejected(Side::Long));
        assert_eq!(momentum_veto(trap, Side::Long, false), Some(Veto::SuspectMove));
        assert_eq!(momentum_veto(trap, Side::Short, false), None);
    }

    #[test]
    fn test_momentum_requires_confirmation_under_guard() {
        assert_eq!(momentum_veto(None, Side::Long, true), Some(Veto::Unconfirmed));
        assert_eq!(momentum_veto(None, Side::Long, false), None);
        assert_eq!(momentum_veto(Some(TrapClassification::RealPump), Side::Long, true), None);
        assert_eq!(
            momentum_veto(Some(TrapClassification::RealDump), Side::Long, true),
            Some(Veto::OpposingMove)
        );
    }

    #[test]
    fn test_structural_never_fights_confirmed_move() {
        assert_eq!(
            structural_veto(Some(TrapClassification::RealDump), Side::Long),
            Some(Veto::OpposingMove)
        );
        assert_eq!(structural_veto(Some(TrapClassification::Rejected(Side::Short)), Side::Long), None);
        assert_eq!(structural_veto(None, Side::Short), None);
    }

    #[test]
    fn test_structural_outranks_momentum() {
        // Flat base, then a heavy green close above the EMA.
        let mut bars = choppy(dec!(100), 60);
        bars.push((dec!(100.2), dec!(101.5), dec!(400)));
        let candles = series(&bars);

        let eval = arbitrator().evaluate(&spec(InstrumentClass::HighVolatility), &candles, false);
        assert!(eval.momentum.is_some());
        assert!(eval.structural.is_some());
        let proposal = eval.proposal.unwrap();
        assert_eq!(proposal.source, SignalSource::Structural);
        assert_eq!(proposal.reason, "MOMENTUM_BREAKOUT");
    }

    #[test]
    fn test_exhaustion_reversal() {
        let mut bars = choppy(dec!(100), 60);
        // previous candle: range 100..100.5 with volume 100 (from choppy)
        bars.push((dec!(100.4), dec!(100.9), dec!(50)));
        let candles = series(&bars);

        let eval = arbitrator().evaluate(&spec(InstrumentClass::HighVolatility), &candles, false);
        let structural = eval.structural.expect("reversal candidate");
        assert_eq!(structural.source, SignalSource::Reversal);
        assert_eq!(structural.side, Side::Short);
        assert_eq!(structural.reason, "EXHAUSTION_SELL");
    }

    /// Flat base, then the given bars. The last base bar (100.5 → 100) is
    /// the candle two bars before a two-bar tail.
    fn base_then(tail: &[(Decimal, Decimal, Decimal)]) -> Vec<Candle> {
        let mut bars = choppy(dec!(100), 60);
        bars.extend_from_slice(tail);
        series(&bars)
    }

    #[test]
    fn test_bullish_fair_value_gap_enters_at_midpoint() {
        // Last low 103.2 clears the high 100.5 two bars back
        let candles = base_then(&[(dec!(100.5), dec!(103), dec!(100)), (dec!(103.2), dec!(104), dec!(100))]);

        let eval = arbitrator().evaluate(&spec(InstrumentClass::TrendFollowing), &candles, false);
        let proposal = eval.proposal.expect("gap proposal");
        assert_eq!(proposal.side, Side::Long);
        assert_eq!(proposal.source, SignalSource::Structural);
        assert_eq!(proposal.reason, "FVG_BUY");
        assert_eq!(proposal.reference_price, dec!(101.85));
    }

    #[test]
    fn test_bearish_fair_value_gap_enters_at_midpoint() {
        // Last high 97.3 stays under the low 100 two bars back
        let candles = base_then(&[(dec!(100), dec!(97.5), dec!(100)), (dec!(97.3), dec!(96.5), dec!(100))]);

        let eval = arbitrator().evaluate(&spec(InstrumentClass::TrendFollowing), &candles, false);
        let proposal = eval.proposal.expect("gap proposal");
        assert_eq!(proposal.side, Side::Short);
        assert_eq!(proposal.reason, "FVG_SELL");
        assert_eq!(proposal.reference_price, dec!(98.65));
    }

    #[test]
    fn test_overlapping_ranges_are_not_a_gap() {
        let candles = series(&choppy(dec!(100), 60));
        assert!(arbitrator().fair_value_gap(&candles).is_none());

        let eval = arbitrator().evaluate(&spec(InstrumentClass::HighVolatility), &candles, false);
        assert!(eval.structural.is_none());
        assert!(eval.proposal.is_none());
    }

    /// Heavy green candle closing at 111: RSI(14) = 80 over the choppy base.
    fn hot_pump() -> Vec<Candle> {
        base_then(&[(dec!(100), dec!(111), dec!(300))])
    }

    #[test]
    fn test_trap_ceiling_depends_on_class() {
        let candles = hot_pump();

        // RSI 80 sits above the trend ceiling (75) but under the volatile one (85)
        let trend = arbitrator().evaluate(&spec(InstrumentClass::TrendFollowing), &candles, false);
        assert_eq!(trend.trap, Some(TrapClassification::Rejected(Side::Long)));
        assert_eq!(trend.momentum_veto, Some(Veto::SuspectMove));
        assert!(trend.proposal.is_none());

        let volatile = arbitrator().evaluate(&spec(InstrumentClass::HighVolatility), &candles, false);
        assert_eq!(volatile.trap, Some(TrapClassification::RealPump));
    }

    #[test]
    fn test_momentum_wins_when_nothing_structural_fires() {
        // RSI 80 is outside the volatile breakout band, so only momentum fires
        let eval = arbitrator().evaluate(&spec(InstrumentClass::HighVolatility), &hot_pump(), false);

        assert!(eval.structural.is_none());
        assert_eq!(eval.momentum_veto, None);
        let proposal = eval.proposal.expect("momentum proposal");
        assert_eq!(proposal.side, Side::Long);
        assert_eq!(proposal.source, SignalSource::Momentum);
        assert_eq!(proposal.reason, "VOLUME_MOMENTUM");
        assert_eq!(proposal.reference_price, dec!(111));
    }

    #[test]
    fn test_absorption_buy() {
        // Close 99 breaks the previous low on 2x volume with RSI 40
        let candles = base_then(&[(dec!(100), dec!(99), dec!(200))]);

        let eval = arbitrator().evaluate(&spec(InstrumentClass::TrendFollowing), &candles, false);
        assert_eq!(eval.trap, None);
        assert_eq!(eval.momentum.as_ref().map(|m| m.side), Some(Side::Short));

        let proposal = eval.proposal.expect("absorption proposal");
        assert_eq!(proposal.side, Side::Long);
        assert_eq!(proposal.source, SignalSource::Reversal);
        assert_eq!(proposal.reason, "ABSORPTION_BUY");
    }

    #[test]
    fn test_guard_requires_confirmed_momentum() {
        // Volume spike above the EMA, no qualifying trap candle, RSI 50
        let candles = base_then(&[(dec!(100), dec!(100.5), dec!(200))]);
        let volatile = spec(InstrumentClass::HighVolatility);

        let open = arbitrator().evaluate(&volatile, &candles, false);
        assert_eq!(open.proposal.map(|p| p.source), Some(SignalSource::Momentum));

        let guarded = arbitrator().evaluate(&volatile, &candles, true);
        assert_eq!(guarded.momentum_veto, Some(Veto::Unconfirmed));
        assert!(guarded.proposal.is_none());

        // An organic pump confirms momentum even under the guard
        let confirmed = arbitrator().evaluate(&volatile, &hot_pump(), true);
        assert_eq!(confirmed.proposal.map(|p| p.source), Some(SignalSource::Momentum));
    }

    #[test]
    fn test_invalid_config() {
        let config = SignalConfig { min_history: 20, ..SignalConfig::default() };
        assert!(SignalArbitrator::new(config).is_err());
    }
}
