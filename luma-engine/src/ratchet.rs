//! Position Ratchet Engine
//!
//! Stateful stop management for every open position. Each tick the book:
//!
//! 1. Prunes records and closing entries whose position left the snapshot
//! 2. Opens a record lazily for a newly observed position
//! 3. Folds the current ROE into the record (high water and stop only rise)
//! 4. Emits a full-size opposite-side close when ROE hits the stop or the
//!    emergency floor
//!
//! A close accepted by the gateway moves the record into a closing ledger.
//! While the position is still reported and the confirmation window has not
//! elapsed, the book takes no further action on it. The trade outcome is
//! counted on the first accepted close only; re-issued closes for the same
//! position do not count again.

use chrono::{DateTime, Duration, Utc};
use luma_domain::{
    Instrument, InstrumentClass, Position, RatchetRecord, Side, Staircase, TradeOutcome, TradeStats,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::actions::{CloseReason, EngineAction};
use crate::error::{EngineError, EngineResult};

// =============================================================================
// Configuration
// =============================================================================

/// Ratchet parameters per instrument class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatchetConfig {
    pub trend: Staircase,
    pub volatile: Staircase,
    /// ROE below which a close always fires
    pub emergency_stop_roe: Decimal,
    /// How long an accepted close suppresses further action
    pub confirmation_window_secs: i64,
}

impl Default for RatchetConfig {
    fn default() -> Self {
        Self {
            trend: Staircase::trend_following(),
            volatile: Staircase::high_volatility(),
            emergency_stop_roe: dec!(-40),
            confirmation_window_secs: 60,
        }
    }
}

impl RatchetConfig {
    /// Staircase for a class
    pub fn staircase(&self, class: InstrumentClass) -> &Staircase {
        match class {
            InstrumentClass::TrendFollowing => &self.trend,
            InstrumentClass::HighVolatility => &self.volatile,
        }
    }

    fn confirmation_window(&self) -> Duration {
        Duration::seconds(self.confirmation_window_secs)
    }

    /// Check staircase ordering and the emergency floor.
    pub fn validate(&self) -> EngineResult<()> {
        if self.emergency_stop_roe >= Decimal::ZERO {
            return Err(EngineError::invalid("emergency_stop_roe must be negative"));
        }
        if self.confirmation_window_secs <= 0 {
            return Err(EngineError::invalid("confirmation window must be positive"));
        }
        for (name, stairs) in [("trend", &self.trend), ("volatile", &self.volatile)] {
            validate_staircase(name, stairs)?;
        }
        Ok(())
    }
}

fn validate_staircase(name: &str, stairs: &Staircase) -> EngineResult<()> {
    if stairs.stop_loss_fraction <= Decimal::ZERO || stairs.stop_loss_fraction >= Decimal::ONE {
        return Err(EngineError::invalid(format!("{name}: stop_loss_fraction must be in (0, 1)")));
    }
    if stairs.breakeven_floor_roe >= stairs.breakeven_activation_roe {
        return Err(EngineError::invalid(format!(
            "{name}: breakeven floor must sit below its activation"
        )));
    }
    if stairs.trail_activation_roe < stairs.breakeven_activation_roe {
        return Err(EngineError::invalid(format!(
            "{name}: trail activation must not precede breakeven activation"
        )));
    }
    if stairs.gap_tiers.is_empty() {
        return Err(EngineError::invalid(format!("{name}: at least one gap tier is required")));
    }
    if stairs
        .gap_tiers
        .windows(2)
        .any(|w| w[1].from_roe <= w[0].from_roe || w[1].gap > w[0].gap)
    {
        return Err(EngineError::invalid(format!(
            "{name}: gap tiers must ascend with non-increasing gaps"
        )));
    }
    Ok(())
}

// =============================================================================
// Events
// =============================================================================

/// Notable ratchet changes, surfaced to the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RatchetEvent {
    Opened {
        instrument: Instrument,
        side: Side,
        roe: Decimal,
        stop: Decimal,
    },
    Secured {
        instrument: Instrument,
        stop: Decimal,
    },
    StopRaised {
        instrument: Instrument,
        from: Decimal,
        to: Decimal,
        high_water: Decimal,
    },
    Pruned {
        instrument: Instrument,
    },
}

/// Output of one pass.
#[derive(Debug, Clone, Default)]
pub struct RatchetPass {
    pub actions: Vec<EngineAction>,
    pub events: Vec<RatchetEvent>,
}

/// Accepted close awaiting disappearance of the position.
#[derive(Debug, Clone, PartialEq)]
struct ClosingEntry {
    submitted_at: DateTime<Utc>,
    record: RatchetRecord,
}

// =============================================================================
// Ratchet Book
// =============================================================================

/// Owns every ratchet record plus the closing ledger and trade stats.
#[derive(Debug, Clone)]
pub struct RatchetBook {
    config: RatchetConfig,
    records: BTreeMap<Instrument, RatchetRecord>,
    closing: BTreeMap<Instrument, ClosingEntry>,
    /// Outcome already counted for a position still being closed
    counted: BTreeMap<Instrument, TradeOutcome>,
    stats: TradeStats,
}

impl RatchetBook {
    /// Create an empty book with validated config.
    pub fn new(config: RatchetConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            records: BTreeMap::new(),
            closing: BTreeMap::new(),
            counted: BTreeMap::new(),
            stats: TradeStats::default(),
        })
    }

    /// Restore persisted records and stats (process start only).
    pub fn restore(&mut self, records: Vec<RatchetRecord>, stats: TradeStats) {
        for record in records {
            self.records.insert(record.instrument.clone(), record);
        }
        self.stats = stats;
        info!(records = self.records.len(), wins = stats.wins, losses = stats.losses, "Ratchet book restored");
    }

    /// Active records, ordered by instrument
    pub fn records(&self) -> impl Iterator<Item = &RatchetRecord> {
        self.records.values()
    }

    /// Record for one instrument
    pub fn record(&self, instrument: &Instrument) -> Option<&RatchetRecord> {
        self.records.get(instrument)
    }

    /// Win/loss counters
    pub fn stats(&self) -> TradeStats {
        self.stats
    }

    /// Parameters in use
    pub fn config(&self) -> &RatchetConfig {
        &self.config
    }

    /// A close was accepted for this instrument and is awaiting confirmation
    pub fn is_closing(&self, instrument: &Instrument) -> bool {
        self.closing.contains_key(instrument)
    }

    /// Run one pass over the current positions.
    ///
    /// # Arguments
    ///
    /// * `positions` - Open positions from this tick's snapshot
    /// * `class_of` - Class lookup for staircase selection
    /// * `now` - Tick timestamp
    pub fn evaluate<F>(&mut self, positions: &[Position], class_of: F, now: DateTime<Utc>) -> RatchetPass
    where
        F: Fn(&Instrument) -> InstrumentClass,
    {
        let mut pass = RatchetPass::default();
        self.prune(positions, &mut pass);

        for position in positions {
            let instrument = &position.instrument;

            if let Some(entry) = self.closing.get(instrument) {
                if now - entry.submitted_at < self.config.confirmation_window() {
                    debug!(%instrument, "Close pending confirmation, skipping");
                    continue;
                }
                warn!(%instrument, "Close not confirmed within window, resuming management");
                if let Some(entry) = self.closing.remove(instrument) {
                    self.records.insert(instrument.clone(), entry.record);
                }
            }

            let Some(roe) = position.roe_percent() else {
                debug!(%instrument, "Zero margin position, skipping ratchet");
                continue;
            };

            let staircase = self.config.staircase(class_of(instrument)).clone();
            let emergency_stop = self.config.emergency_stop_roe;
            let record = self.upsert_record(position, roe, &staircase, now, &mut pass);

            let previous_stop = record.stop;
            let update = record.advance(roe, &staircase, position.leverage);
            if update.stop_tightened {
                pass.events.push(RatchetEvent::StopRaised {
                    instrument: instrument.clone(),
                    from: previous_stop,
                    to: record.stop,
                    high_water: record.high_water,
                });
            }
            if update.newly_secured {
                info!(%instrument, stop = %record.stop, "Position secured");
                pass.events.push(RatchetEvent::Secured {
                    instrument: instrument.clone(),
                    stop: record.stop,
                });
            }

            let reason = if roe < emergency_stop {
                Some(CloseReason::EmergencyStop)
            } else if record.is_triggered(roe) {
                Some(CloseReason::StopHit(
                    staircase.candidate(record.high_water, position.leverage).stage,
                ))
            } else {
                None
            };

            if let Some(reason) = reason {
                info!(
                    %instrument,
                    side = %position.side,
                    %roe,
                    stop = %record.stop,
                    high_water = %record.high_water,
                    %reason,
                    "Ratchet close triggered"
                );
                pass.actions.push(EngineAction::ClosePosition {
                    instrument: instrument.clone(),
                    position_side: position.side,
                    size: position.size,
                    roe,
                    pnl: position.unrealized_pnl,
                    reason,
                });
            }
        }

        pass
    }

    /// The gateway accepted a close: move the record to the closing ledger
    /// and count the outcome.
    ///
    /// Returns `None` when this position's outcome was already counted by an
    /// earlier close that never confirmed.
    pub fn confirm_close(
        &mut self,
        instrument: &Instrument,
        realized_pnl: Decimal,
        now: DateTime<Utc>,
    ) -> Option<TradeOutcome> {
        if let Some(record) = self.records.remove(instrument) {
            self.closing.insert(
                instrument.clone(),
                ClosingEntry {
                    submitted_at: now,
                    record,
                },
            );
        }

        if let Some(previous) = self.counted.get(instrument) {
            info!(%instrument, %realized_pnl, outcome = %previous, "Close re-accepted, outcome already counted");
            return None;
        }

        let outcome = TradeOutcome::from_pnl(realized_pnl);
        self.stats.record(outcome);
        self.counted.insert(instrument.clone(), outcome);

        info!(%instrument, %realized_pnl, %outcome, wins = self.stats.wins, losses = self.stats.losses, "Close accepted");
        Some(outcome)
    }

    /// The gateway rejected a close. The record stays and the close is
    /// retried on the next pass.
    pub fn close_rejected(&self, instrument: &Instrument, reason: &str) {
        warn!(%instrument, %reason, "Close rejected, will retry next tick");
    }

    fn upsert_record(
        &mut self,
        position: &Position,
        roe: Decimal,
        staircase: &Staircase,
        now: DateTime<Utc>,
        pass: &mut RatchetPass,
    ) -> &mut RatchetRecord {
        let instrument = &position.instrument;
        let stale = self
            .records
            .get(instrument)
            .map(|r| r.side != position.side)
            .unwrap_or(false);
        if stale {
            warn!(%instrument, side = %position.side, "Position flipped side, resetting ratchet");
            self.records.remove(instrument);
            self.counted.remove(instrument);
        }

        self.records.entry(instrument.clone()).or_insert_with(|| {
            let record = RatchetRecord::open(
                instrument.clone(),
                position.side,
                roe,
                staircase,
                position.leverage,
                now,
            );
            info!(%instrument, side = %position.side, %roe, stop = %record.stop, "Ratchet opened");
            pass.events.push(RatchetEvent::Opened {
                instrument: instrument.clone(),
                side: position.side,
                roe,
                stop: record.stop,
            });
            record
        })
    }

    fn prune(&mut self, positions: &[Position], pass: &mut RatchetPass) {
        let open = |i: &Instrument| positions.iter().any(|p| &p.instrument == i);

        let gone: Vec<Instrument> = self.records.keys().filter(|i| !open(i)).cloned().collect();
        for instrument in gone {
            self.records.remove(&instrument);
            debug!(%instrument, "Position gone, ratchet record pruned");
            pass.events.push(RatchetEvent::Pruned { instrument });
        }

        self.closing.retain(|instrument, _| open(instrument));
        self.counted.retain(|instrument, _| open(instrument));
    }
}

// =============================================================================
// Tests
// =============================================================================
