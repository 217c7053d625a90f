//! Controller: owns all mutable trading state and runs one tick.
//!
//! A tick is strictly sequential:
//!
//! 1. refresh the account snapshot (a failure skips the whole tick);
//! 2. recompute the regime;
//! 3. scan every unoccupied instrument (lifecycle, then proposals, then entries);
//! 4. run the ratchet pass over all open positions and submit closes;
//! 5. publish a snapshot;
//! 6. persist the restart state.
//!
//! Per-instrument failures are absorbed and logged where they happen. Every
//! provider and gateway call is bounded by the configured call timeout.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use luma_domain::{
    AccountState, CandleInterval, CooldownReason, Instrument, InstrumentClass, InstrumentSpec,
    RegimeState, TradeOutcome,
};
use luma_engine::{
    classify_cycle, seasonality, AllocationSizer, CooldownBook, CycleReading, EngineAction,
    LifecycleDecision, ModeTransition, OrderLifecycleManager, RatchetBook, RatchetEvent,
    RegimeController, SignalArbitrator, TradingSession,
};
use luma_exec::{ActionResult, ExecError, ExecResult, ExecutionGateway, Executor, IndicatorProvider};
use luma_store::{PersistedState, StateRepository, STATE_VERSION};

use crate::config::Config;
use crate::error::DaemonResult;
use crate::event_log::{EventKind, EventLog};
use crate::snapshot::{PositionView, SnapshotSink, TickSnapshot};

// =============================================================================
// Tick Report
// =============================================================================

/// What one tick did, for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub at: DateTime<Utc>,
    pub transition: Option<ModeTransition>,
    pub cycle: CycleReading,
    /// Instruments that got an entry order
    pub entries: Vec<Instrument>,
    /// Instruments whose stale orders were cancelled
    pub cancels: Vec<Instrument>,
    /// Instruments closed by the ratchet
    pub closes: Vec<Instrument>,
    /// Gateway rejections (entries, cancels and closes)
    pub rejections: Vec<Instrument>,
    /// Instruments skipped for missing data
    pub skipped: Vec<Instrument>,
}

impl TickReport {
    fn new(at: DateTime<Utc>) -> Self {
        Self {
            at,
            transition: None,
            cycle: CycleReading::NEUTRAL,
            entries: Vec::new(),
            cancels: Vec::new(),
            closes: Vec::new(),
            rejections: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

// =============================================================================
// Controller
// =============================================================================

/// The single owner of regime, lifecycle, ratchet and cooldown state.
pub struct Controller<P, G, S>
where
    P: IndicatorProvider,
    G: ExecutionGateway,
    S: StateRepository,
{
    config: Config,
    provider: Arc<P>,
    executor: Executor<G>,
    store: Arc<S>,
    sink: Arc<dyn SnapshotSink>,
    specs: HashMap<Instrument, InstrumentSpec>,
    regime: RegimeController,
    sizer: AllocationSizer,
    arbitrator: SignalArbitrator,
    lifecycle: OrderLifecycleManager,
    ratchet: RatchetBook,
    cooldowns: CooldownBook,
    events: EventLog,
    last_snapshot: Option<TickSnapshot>,
}

impl<P, G, S> Controller<P, G, S>
where
    P: IndicatorProvider,
    G: ExecutionGateway,
    S: StateRepository,
{
    /// Build a controller with validated engine components.
    ///
    /// # Errors
    ///
    /// Returns `DaemonError::Engine` if any engine configuration is invalid.
    pub fn new(
        config: Config,
        provider: Arc<P>,
        gateway: Arc<G>,
        store: Arc<S>,
        sink: Arc<dyn SnapshotSink>,
    ) -> DaemonResult<Self> {
        let executor = Executor::new(gateway, &config.instruments, config.call_timeout);
        let specs = config
            .instruments
            .iter()
            .map(|spec| (spec.instrument.clone(), spec.clone()))
            .collect();

        Ok(Self {
            regime: RegimeController::new(config.regime.clone())?,
            sizer: AllocationSizer::new(config.sizing.clone())?,
            arbitrator: SignalArbitrator::new(config.signals.clone())?,
            lifecycle: OrderLifecycleManager::new(config.lifecycle.clone())?,
            ratchet: RatchetBook::new(config.ratchet.clone())?,
            cooldowns: CooldownBook::new(config.cooldown.clone())?,
            events: EventLog::new(config.event_log_capacity),
            last_snapshot: None,
            specs,
            config,
            provider,
            executor,
            store,
            sink,
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn regime(&self) -> &RegimeController {
        &self.regime
    }

    pub fn ratchet(&self) -> &RatchetBook {
        &self.ratchet
    }

    pub fn cooldowns(&self) -> &CooldownBook {
        &self.cooldowns
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn executor(&self) -> &Executor<G> {
        &self.executor
    }

    /// Snapshot published by the last completed tick
    pub fn last_snapshot(&self) -> Option<&TickSnapshot> {
        self.last_snapshot.as_ref()
    }

    // -------------------------------------------------------------------------
    // Restart state
    // -------------------------------------------------------------------------

    /// Load the persisted state. Call once, before the first tick.
    ///
    /// A corrupted state file is logged and treated as empty.
    ///
    /// # Errors
    ///
    /// Returns `DaemonError::Store` for I/O failures other than corruption.
    pub async fn restore(&mut self, now: DateTime<Utc>) -> DaemonResult<()> {
        let state = match self.store.load().await {
            Ok(state) => state,
            Err(e) if e.is_corruption() => {
                warn!(error = %e, "Persisted state corrupted, starting empty");
                PersistedState::default()
            },
            Err(e) => return Err(e.into()),
        };

        if state.version > STATE_VERSION {
            warn!(version = state.version, supported = STATE_VERSION, "Persisted state is newer than this build");
        }

        self.regime.resolve_anchor(state.anchor_equity, self.config.anchor_equity);
        self.cooldowns.restore(state.cooldowns, now);
        self.ratchet.restore(state.ratchet_records, state.stats);

        info!(
            anchor = ?self.regime.anchor(),
            records = self.ratchet.records().count(),
            saved_at = ?state.saved_at,
            "State restored"
        );
        Ok(())
    }

    /// State that would be persisted right now
    pub fn persisted_state(&self, now: DateTime<Utc>) -> PersistedState {
        PersistedState {
            version: STATE_VERSION,
            anchor_equity: self.regime.anchor(),
            cooldowns: self.cooldowns.snapshot(now),
            ratchet_records: self.ratchet.records().cloned().collect(),
            stats: self.ratchet.stats(),
            saved_at: Some(now),
        }
    }

    /// Save the restart state. Failures are logged, never fatal.
    pub async fn persist(&self, now: DateTime<Utc>) {
        let state = self.persisted_state(now);
        if let Err(e) = self.store.save(&state).await {
            error!(error = %e, "Failed to persist state");
        }
    }

    // -------------------------------------------------------------------------
    // Tick
    // -------------------------------------------------------------------------

    /// Run one tick at the current time.
    pub async fn tick(&mut self) -> DaemonResult<TickReport> {
        self.tick_at(Utc::now()).await
    }

    /// Run one tick at `now`.
    ///
    /// # Errors
    ///
    /// Returns `DaemonError::Exec` only when the account state is
    /// unavailable. The regime is kept and nothing else runs.
    pub async fn tick_at(&mut self, now: DateTime<Utc>) -> DaemonResult<TickReport> {
        let mut report = TickReport::new(now);

        let account = match self.fetch_account().await {
            Ok(account) => account,
            Err(e) => {
                self.regime.update(None);
                error!(error = %e, "Account state unavailable, skipping tick");
                self.events.push(now, EventKind::Outage, None, e.to_string());
                return Err(e.into());
            },
        };

        if let Some(transition) = self.regime.update(Some(account.equity)) {
            self.events.push(
                now,
                EventKind::Regime,
                None,
                format!("{} -> {}", transition.from, transition.to),
            );
            report.transition = Some(transition);
        }
        let regime = self.regime.current().cloned();

        self.cooldowns.prune(now);
        report.cycle = self.read_cycle().await;

        match &regime {
            Some(regime) => self.scan_entries(&account, regime, now, &mut report).await,
            None => debug!("No regime yet, entry scan skipped"),
        }

        self.manage_positions(&account, now, &mut report).await;

        let snapshot = self.build_snapshot(&account, regime.as_ref(), now);
        if let Err(e) = self.sink.publish(&snapshot).await {
            warn!(error = %e, "Snapshot publish failed");
        }
        self.last_snapshot = Some(snapshot);

        self.persist(now).await;

        debug!(
            entries = report.entries.len(),
            cancels = report.cancels.len(),
            closes = report.closes.len(),
            skipped = report.skipped.len(),
            "Tick complete"
        );
        Ok(report)
    }

    async fn fetch_account(&self) -> ExecResult<AccountState> {
        bounded(
            self.config.call_timeout,
            "get_account_state",
            self.provider.get_account_state(&self.config.wallet_address),
        )
        .await
    }

    /// Benchmark cycle multiplier; neutral when disabled or unavailable.
    async fn read_cycle(&self) -> CycleReading {
        let cycle = &self.config.cycle;
        let Some(benchmark) = cycle.active_benchmark() else {
            return CycleReading::NEUTRAL;
        };

        let daily = bounded(
            self.config.call_timeout,
            "get_candles",
            self.provider.get_candles(benchmark, CandleInterval::OneDay),
        )
        .await;
        match daily {
            Ok(daily) => {
                let reading = classify_cycle(cycle, &daily);
                debug!(%benchmark, phase = ?reading.phase, multiplier = %reading.multiplier, "Cycle read");
                reading
            },
            Err(e) => {
                warn!(%benchmark, error = %e, "Cycle benchmark unavailable, using neutral");
                CycleReading::NEUTRAL
            },
        }
    }

    // -------------------------------------------------------------------------
    // Entry scan
    // -------------------------------------------------------------------------

    async fn scan_entries(
        &mut self,
        account: &AccountState,
        regime: &RegimeState,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) {
        let mut available = account.withdrawable;
        let instruments = self.config.instruments.clone();

        for spec in &instruments {
            self.scan_instrument(spec, account, regime, now, &mut available, report)
                .await;
        }
    }

    async fn scan_instrument(
        &mut self,
        spec: &InstrumentSpec,
        account: &AccountState,
        regime: &RegimeState,
        now: DateTime<Utc>,
        available: &mut Decimal,
        report: &mut TickReport,
    ) {
        let instrument = &spec.instrument;

        if account.position(instrument).is_some() {
            return;
        }
        if let Some(cooldown) = self.cooldowns.blocking(instrument, now) {
            debug!(%instrument, reason = %cooldown.reason, until = %cooldown.until, "Cooling down, skipping");
            return;
        }

        let candles = match bounded(
            self.config.call_timeout,
            "get_candles",
            self.provider.get_candles(instrument, self.config.candle_interval),
        )
        .await
        {
            Ok(candles) => candles,
            Err(e) => {
                warn!(%instrument, error = %e, "Candles unavailable, skipping instrument");
                report.skipped.push(instrument.clone());
                return;
            },
        };
        let Some(reference) = candles.last().map(|c| c.close) else {
            warn!(%instrument, "Empty candle history, skipping instrument");
            report.skipped.push(instrument.clone());
            return;
        };

        let orders = account.orders_for(instrument);
        let decision = self.lifecycle.reconcile(instrument, &orders, reference);
        if !decision.allows_entry() {
            match decision {
                LifecycleDecision::Cancel(action) => {
                    self.cancel_stale(instrument, &orders, action, now, report).await;
                },
                other => debug!(%instrument, decision = ?other, "Resting order, no proposal"),
            }
            return;
        }

        let evaluation = self
            .arbitrator
            .evaluate(spec, &candles, regime.requires_confirmation());
        let Some(proposal) = evaluation.proposal else {
            return;
        };

        let season = seasonality(spec.class, now);
        let Some(budget) = self.sizer.budget(
            regime.mode,
            spec,
            account.equity,
            *available,
            season.multiplier,
            report.cycle.multiplier,
        ) else {
            debug!(%instrument, available = %available, "No budget for proposal");
            return;
        };

        let set_leverage = EngineAction::SetLeverage {
            instrument: instrument.clone(),
            leverage: budget.leverage,
        };
        if let Err(e) = self.executor.execute(set_leverage).await {
            warn!(%instrument, leverage = %budget.leverage, error = %e, "Leverage update failed, entry skipped");
            self.reject(instrument, format!("leverage {}: {}", budget.leverage, e), now, report);
            return;
        }

        let entry = EngineAction::PlaceEntry {
            instrument: instrument.clone(),
            side: proposal.side,
            limit_price: proposal.reference_price,
            notional: budget.notional,
            margin: budget.margin,
            leverage: budget.leverage,
            source: proposal.source,
            reason: proposal.reason.clone(),
        };
        match self.executor.execute(entry).await {
            Ok(ActionResult::EntryPlaced { order, .. }) => {
                *available -= budget.margin;
                self.cooldowns.start(instrument, CooldownReason::OrderAction, now);
                self.events.push(
                    now,
                    EventKind::Entry,
                    Some(instrument),
                    format!(
                        "{} {} @ {} ({}x, margin {}) {}: {} [{}]",
                        proposal.side,
                        order.size,
                        order.price,
                        budget.leverage,
                        budget.margin.round_dp(2),
                        proposal.source,
                        proposal.reason,
                        season.note
                    ),
                );
                report.entries.push(instrument.clone());
            },
            Ok(other) => debug!(%instrument, result = ?other, "Unexpected entry result"),
            Err(e) => {
                warn!(%instrument, side = %proposal.side, error = %e, "Entry rejected");
                self.reject(instrument, format!("entry: {}", e), now, report);
            },
        }
    }

    async fn cancel_stale(
        &mut self,
        instrument: &Instrument,
        orders: &[&luma_domain::PendingOrder],
        action: EngineAction,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) {
        let detail = match &action {
            EngineAction::CancelStale { order_price, reference_price, drift_pct, .. } => format!(
                "order {} vs {} drifted {}%",
                order_price,
                reference_price,
                drift_pct.round_dp(2)
            ),
            _ => String::new(),
        };

        match self.executor.execute(action).await {
            Ok(result) => {
                self.lifecycle.cancel_confirmed(instrument, orders);
                self.cooldowns.start(instrument, CooldownReason::OrderAction, now);
                let count = match result {
                    ActionResult::Cancelled { count } => count,
                    _ => 0,
                };
                self.events.push(
                    now,
                    EventKind::Cancel,
                    Some(instrument),
                    format!("{} ({} cancelled)", detail, count),
                );
                report.cancels.push(instrument.clone());
            },
            Err(e) => {
                self.lifecycle.cancel_failed(instrument);
                warn!(%instrument, error = %e, "Cancel failed, will retry");
                self.reject(instrument, format!("cancel: {}", e), now, report);
            },
        }
    }

    fn reject(&mut self, instrument: &Instrument, message: String, now: DateTime<Utc>, report: &mut TickReport) {
        self.events.push(now, EventKind::Reject, Some(instrument), message);
        report.rejections.push(instrument.clone());
    }

    // -------------------------------------------------------------------------
    // Ratchet pass
    // -------------------------------------------------------------------------

    async fn manage_positions(&mut self, account: &AccountState, now: DateTime<Utc>, report: &mut TickReport) {
        let specs = &self.specs;
        let class_of = |instrument: &Instrument| {
            specs
                .get(instrument)
                .map(|spec| spec.class)
                .unwrap_or(InstrumentClass::TrendFollowing)
        };
        let pass = self.ratchet.evaluate(&account.positions, class_of, now);

        for event in pass.events {
            self.log_ratchet_event(event, now);
        }

        for action in pass.actions {
            let EngineAction::ClosePosition { instrument, pnl, roe, reason, .. } = &action else {
                continue;
            };
            let (instrument, pnl, roe, reason) = (instrument.clone(), *pnl, *roe, *reason);

            match self.executor.execute(action).await {
                Ok(_) => {
                    let outcome = self.ratchet.confirm_close(&instrument, pnl, now);
                    if outcome == Some(TradeOutcome::Loss) {
                        self.cooldowns.start(&instrument, CooldownReason::Trauma, now);
                    }
                    let counted = match outcome {
                        Some(outcome) => outcome.to_string(),
                        None => "reissued".to_string(),
                    };
                    self.events.push(
                        now,
                        EventKind::Close,
                        Some(&instrument),
                        format!(
                            "{} at {}% ROE, pnl {} ({})",
                            reason,
                            roe.round_dp(2),
                            pnl.round_dp(2),
                            counted
                        ),
                    );
                    report.closes.push(instrument);
                },
                Err(e) => {
                    error!(%instrument, %roe, %reason, error = %e, "Close failed");
                    self.ratchet.close_rejected(&instrument, &e.to_string());
                    self.events.push(
                        now,
                        EventKind::CloseRejected,
                        Some(&instrument),
                        format!("{}: {}", reason, e),
                    );
                    report.rejections.push(instrument);
                },
            }
        }
    }

    fn log_ratchet_event(&mut self, event: RatchetEvent, now: DateTime<Utc>) {
        let (kind, instrument, message) = match event {
            RatchetEvent::Opened { instrument, side, roe, stop } => (
                EventKind::RatchetOpened,
                instrument,
                format!("{} tracked at {}% ROE, stop {}%", side, roe.round_dp(2), stop.round_dp(2)),
            ),
            RatchetEvent::Secured { instrument, stop } => (
                EventKind::Secured,
                instrument,
                format!("breakeven floor {}%", stop.round_dp(2)),
            ),
            RatchetEvent::StopRaised { instrument, from, to, high_water } => (
                EventKind::StopRaised,
                instrument,
                format!(
                    "stop {}% -> {}% (high water {}%)",
                    from.round_dp(2),
                    to.round_dp(2),
                    high_water.round_dp(2)
                ),
            ),
            RatchetEvent::Pruned { instrument } => {
                (EventKind::Pruned, instrument, "position gone".to_string())
            },
        };
        self.events.push(now, kind, Some(&instrument), message);
    }

    // -------------------------------------------------------------------------
    // Snapshot
    // -------------------------------------------------------------------------

    fn build_snapshot(
        &self,
        account: &AccountState,
        regime: Option<&RegimeState>,
        now: DateTime<Utc>,
    ) -> TickSnapshot {
        let positions = account
            .positions
            .iter()
            .map(|position| {
                let record = self.ratchet.record(&position.instrument);
                PositionView {
                    instrument: position.instrument.clone(),
                    side: position.side,
                    size: position.size,
                    pnl: position.unrealized_pnl,
                    roe: position.roe_percent().unwrap_or(Decimal::ZERO),
                    secured: record.map(|r| r.secured).unwrap_or(false),
                    stop: record.map(|r| r.stop),
                    high_water: record.map(|r| r.high_water),
                }
            })
            .collect();

        TickSnapshot {
            timestamp: now,
            mode: regime.map(|r| r.mode),
            shield: regime.map(|r| r.shield_active).unwrap_or(false),
            titan: regime.map(|r| r.titan_active).unwrap_or(false),
            session: TradingSession::at(now),
            equity: account.equity,
            anchor: self.regime.anchor(),
            account_roe: regime.map(|r| r.roe_percent).unwrap_or(Decimal::ZERO),
            total_unrealized_pnl: account.total_unrealized_pnl(),
            positions,
            stats: self.ratchet.stats(),
            win_rate: self.ratchet.stats().win_rate(),
            cooldowns: self.cooldowns.snapshot(now),
            events: self.events.to_vec(),
        }
    }
}

/// Await `call` for at most `limit`.
async fn bounded<T, F>(limit: Duration, call: &'static str, fut: F) -> ExecResult<T>
where
    F: Future<Output = ExecResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ExecError::Timeout(format!("{} exceeded {:?}", call, limit))),
    }
}
