//! E2E tests: one controller tick against stub ports.
//!
//! Flow per test:
//! 1. Seed the StubProvider with an account snapshot (and candles if needed)
//! 2. Run one or more ticks at fixed timestamps
//! 3. Verify gateway calls, ratchet state, cooldowns and the event log

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use luma_domain::{
    AccountState, Candle, CandleInterval, CooldownReason, Instrument, Leverage, OrderSide,
    PendingOrder, Position, RegimeMode, Side,
};
use luma_exec::{GatewayCall, StubGateway, StubProvider};
use luma_store::MemoryStore;
use lumad::{Config, Controller, EventKind, MemorySink};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

type TestController = Controller<StubProvider, StubGateway, MemoryStore>;

struct Harness {
    provider: Arc<StubProvider>,
    gateway: Arc<StubGateway>,
    store: Arc<MemoryStore>,
    sink: Arc<MemorySink>,
    controller: TestController,
}

fn harness() -> Harness {
    let provider = Arc::new(StubProvider::new());
    let gateway = Arc::new(StubGateway::new());
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(MemorySink::new());
    let controller = Controller::new(
        Config::test(),
        provider.clone(),
        gateway.clone(),
        store.clone(),
        sink.clone(),
    )
    .unwrap();

    Harness {
        provider,
        gateway,
        store,
        sink,
        controller,
    }
}

/// Tuesday 10:20 UTC: no seasonality adjustment.
fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 3, 10, 20, 0).unwrap()
}

fn sol() -> Instrument {
    Instrument::new("SOL").unwrap()
}

fn account(positions: Vec<Position>, open_orders: Vec<PendingOrder>) -> AccountState {
    AccountState {
        equity: dec!(1000),
        withdrawable: dec!(1000),
        positions,
        open_orders,
    }
}

/// SOL long, 1 coin from 100 at 5x (margin 20). `pnl` sets the ROE.
fn sol_long(pnl: Decimal) -> Position {
    Position::from_signed_size(sol(), dec!(1), dec!(100), pnl, dec!(20), Leverage::new(5).unwrap()).unwrap()
}

/// Steady climb then a flat pullback: a trend-pullback long at 150.
fn pullback_candles() -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
    let mut bars: Vec<(Decimal, Decimal)> = (0..50)
        .map(|i| {
            let p = dec!(100) + Decimal::from(i);
            (p, p + dec!(1))
        })
        .collect();
    for i in 0..14 {
        if i % 2 == 0 {
            bars.push((dec!(150.0), dec!(149.9)));
        } else {
            bars.push((dec!(149.9), dec!(150.0)));
        }
    }

    bars.iter()
        .enumerate()
        .map(|(i, (o, c))| {
            Candle::new(*o, (*o).max(*c), (*o).min(*c), *c, dec!(100), start + Duration::minutes(15 * i as i64))
        })
        .collect()
}

// =============================================================================
// Ratchet closes
// =============================================================================

#[tokio::test]
async fn test_stop_hit_closes_exactly_once() {
    let mut h = harness();
    // Price 95: ROE -25% through the -20% hard stop
    h.provider.set_account(account(vec![sol_long(dec!(-5))], vec![]));

    let report = h.controller.tick_at(t0()).await.unwrap();
    assert_eq!(report.closes, vec![sol()]);
    assert_eq!(
        h.gateway.closes(),
        vec![GatewayCall::MarketClose {
            instrument: sol(),
            side: OrderSide::Sell,
            size: dec!(1),
        }]
    );

    // Same snapshot again: the close is awaiting confirmation
    let report = h.controller.tick_at(t0() + Duration::seconds(20)).await.unwrap();
    assert!(report.closes.is_empty());
    assert_eq!(h.gateway.closes().len(), 1);

    // Losing close starts a trauma cooldown and counts a loss
    let cooldown = h.controller.cooldowns().blocking(&sol(), t0()).unwrap();
    assert_eq!(cooldown.reason, CooldownReason::Trauma);
    assert_eq!(h.controller.ratchet().stats().losses, 1);
    assert!(h.controller.events().last_of(EventKind::Close).is_some());
}

#[tokio::test]
async fn test_unconfirmed_close_reissued_without_recounting() {
    let mut h = harness();
    h.provider.set_account(account(vec![sol_long(dec!(-5))], vec![]));
    h.controller.tick_at(t0()).await.unwrap();
    let first = h.controller.cooldowns().blocking(&sol(), t0()).unwrap();

    // Still reported after the 60 s window: the close goes out again
    let later = t0() + Duration::seconds(61);
    let report = h.controller.tick_at(later).await.unwrap();
    assert_eq!(report.closes, vec![sol()]);
    assert_eq!(h.gateway.closes().len(), 2);

    // One position, one loss, and the trauma clock is not restarted
    assert_eq!(h.controller.ratchet().stats().losses, 1);
    assert_eq!(h.controller.ratchet().stats().total(), 1);
    assert_eq!(h.controller.cooldowns().blocking(&sol(), later).unwrap().until, first.until);
}

#[tokio::test]
async fn test_rejected_close_keeps_record_and_retries() {
    let mut h = harness();
    h.provider.set_account(account(vec![sol_long(dec!(-5))], vec![]));
    h.gateway.reject_next("insufficient margin");

    let report = h.controller.tick_at(t0()).await.unwrap();
    assert!(report.closes.is_empty());
    assert_eq!(report.rejections, vec![sol()]);
    assert!(h.gateway.closes().is_empty());
    assert!(h.controller.ratchet().record(&sol()).is_some());
    assert!(h.controller.events().last_of(EventKind::CloseRejected).is_some());
    assert_eq!(h.controller.ratchet().stats().total(), 0);

    let report = h.controller.tick_at(t0() + Duration::seconds(20)).await.unwrap();
    assert_eq!(report.closes, vec![sol()]);
    assert_eq!(h.gateway.closes().len(), 1);
}

#[tokio::test]
async fn test_trailing_stop_ratchets_then_closes() {
    let mut h = harness();

    // ROE +12%: trailing at 10.5
    h.provider.set_account(account(vec![sol_long(dec!(2.4))], vec![]));
    h.controller.tick_at(t0()).await.unwrap();
    let record = h.controller.ratchet().record(&sol()).unwrap().clone();
    assert_eq!(record.stop, dec!(10.5));
    assert!(record.secured);

    // ROE +22%: stop 21
    h.provider.set_account(account(vec![sol_long(dec!(4.4))], vec![]));
    h.controller.tick_at(t0() + Duration::seconds(20)).await.unwrap();
    assert_eq!(h.controller.ratchet().record(&sol()).unwrap().stop, dec!(21));
    assert!(h.controller.events().last_of(EventKind::StopRaised).is_some());

    // Retrace to +20%: stop holds at 21 and the position is closed in profit
    h.provider.set_account(account(vec![sol_long(dec!(4))], vec![]));
    let report = h.controller.tick_at(t0() + Duration::seconds(40)).await.unwrap();
    assert_eq!(report.closes, vec![sol()]);
    assert_eq!(h.controller.ratchet().stats().wins, 1);
    assert_eq!(h.sink.last().unwrap().win_rate, Some(dec!(100)));
    assert!(h.controller.cooldowns().blocking(&sol(), t0() + Duration::seconds(40)).is_none());

    // Position gone: the closing entry and record are pruned
    h.provider.set_account(account(vec![], vec![]));
    h.controller.tick_at(t0() + Duration::seconds(60)).await.unwrap();
    assert!(h.controller.ratchet().record(&sol()).is_none());
    assert!(!h.controller.ratchet().is_closing(&sol()));
}

// =============================================================================
// Outages
// =============================================================================

#[tokio::test]
async fn test_account_outage_keeps_regime() {
    let mut h = harness();
    h.provider.set_account(account(vec![], vec![]));
    h.controller.tick_at(t0()).await.unwrap();
    assert_eq!(h.controller.regime().current().unwrap().mode, RegimeMode::Standard);
    let saves = h.store.save_count();
    let published = h.sink.count();

    h.provider.clear_account();
    let result = h.controller.tick_at(t0() + Duration::seconds(20)).await;

    assert!(result.is_err());
    assert_eq!(h.controller.regime().current().unwrap().mode, RegimeMode::Standard);
    assert!(h.controller.events().last_of(EventKind::Outage).is_some());
    // Whole tick skipped: nothing published or saved
    assert_eq!(h.store.save_count(), saves);
    assert_eq!(h.sink.count(), published);
}

#[tokio::test]
async fn test_candle_outage_skips_only_that_instrument() {
    let mut h = harness();
    let wif = Instrument::new("WIF").unwrap();
    // WIF short of 100 coins from 1.00 at 3x: ROE -30% through the -24% hard stop
    let wif_short =
        Position::from_signed_size(wif.clone(), dec!(-100), dec!(1), dec!(-6), dec!(20), Leverage::new(3).unwrap())
            .unwrap();
    h.provider.set_failing(&sol(), true);
    h.provider.set_account(account(vec![wif_short], vec![]));

    let report = h.controller.tick_at(t0()).await.unwrap();
    assert_eq!(report.skipped, vec![sol()]);
    assert_eq!(report.closes, vec![wif.clone()]);
    assert_eq!(
        h.gateway.closes(),
        vec![GatewayCall::MarketClose {
            instrument: wif,
            side: OrderSide::Buy,
            size: dec!(100),
        }]
    );
}

// =============================================================================
// Entries and the order lifecycle
// =============================================================================

#[tokio::test]
async fn test_entry_placed_with_leverage_and_budget() {
    let mut h = harness();
    h.provider.set_account(account(vec![], vec![]));
    h.provider.set_candles(&sol(), CandleInterval::FifteenMinutes, pullback_candles());

    let report = h.controller.tick_at(t0()).await.unwrap();
    assert_eq!(report.entries, vec![sol()]);

    let calls = h.gateway.calls();
    assert_eq!(
        calls[0],
        GatewayCall::SetLeverage {
            instrument: sol(),
            leverage: Leverage::new(5).unwrap(),
        }
    );
    let orders = h.gateway.limit_orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].side, OrderSide::Buy);
    assert_eq!(orders[0].price, dec!(150));
    // 110 margin × 5x = 550 notional; 550 / 150 truncated to 2 decimals
    assert_eq!(orders[0].notional, dec!(550));
    assert_eq!(orders[0].size, dec!(3.66));

    // Action cooldown blocks a second entry on the next tick
    let report = h.controller.tick_at(t0() + Duration::seconds(20)).await.unwrap();
    assert!(report.entries.is_empty());
    assert_eq!(h.gateway.limit_orders().len(), 1);

    let snapshot = h.sink.last().unwrap();
    assert!(snapshot.events.iter().any(|e| e.kind == EventKind::Entry));
    assert_eq!(snapshot.cooldowns.len(), 1);
}

#[tokio::test]
async fn test_leverage_not_resent_when_unchanged() {
    let mut h = harness();
    h.provider.set_account(account(vec![], vec![]));
    h.provider.set_candles(&sol(), CandleInterval::FifteenMinutes, pullback_candles());

    h.controller.tick_at(t0()).await.unwrap();
    h.controller.tick_at(t0() + Duration::seconds(120)).await.unwrap();

    let leverage_calls = h
        .gateway
        .calls()
        .into_iter()
        .filter(|c| matches!(c, GatewayCall::SetLeverage { .. }))
        .count();
    assert_eq!(leverage_calls, 1);
    assert_eq!(h.gateway.limit_orders().len(), 2);
}

#[tokio::test]
async fn test_resting_order_within_tolerance_blocks_entry() {
    let mut h = harness();
    // 150.5 vs close 150: 0.33% drift, inside the 0.5% band
    let order = PendingOrder::new(sol(), dec!(150.5), OrderSide::Buy);
    h.provider.set_account(account(vec![], vec![order]));
    h.provider.set_candles(&sol(), CandleInterval::FifteenMinutes, pullback_candles());

    let report = h.controller.tick_at(t0()).await.unwrap();
    assert!(report.entries.is_empty());
    assert!(report.cancels.is_empty());
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_stale_order_cancelled_once() {
    let mut h = harness();
    // 150.9 vs close 150: 0.6% drift, outside the 0.5% band
    let order = PendingOrder::new(sol(), dec!(150.9), OrderSide::Buy);
    h.provider.set_account(account(vec![], vec![order]));
    h.provider.set_candles(&sol(), CandleInterval::FifteenMinutes, pullback_candles());

    let report = h.controller.tick_at(t0()).await.unwrap();
    assert_eq!(report.cancels, vec![sol()]);
    assert!(report.entries.is_empty());
    assert_eq!(h.gateway.calls(), vec![GatewayCall::CancelAll(sol())]);

    // Still reported after the action cooldown: not cancelled again
    let report = h.controller.tick_at(t0() + Duration::seconds(120)).await.unwrap();
    assert!(report.cancels.is_empty());
    assert_eq!(h.gateway.calls().len(), 1);
    assert!(h.controller.events().last_of(EventKind::Cancel).is_some());
}

#[tokio::test]
async fn test_failed_cancel_is_retried() {
    let mut h = harness();
    let order = PendingOrder::new(sol(), dec!(140), OrderSide::Buy);
    h.provider.set_account(account(vec![], vec![order]));
    h.provider.set_candles(&sol(), CandleInterval::FifteenMinutes, pullback_candles());
    h.gateway.set_fail_next(true);

    let report = h.controller.tick_at(t0()).await.unwrap();
    assert_eq!(report.rejections, vec![sol()]);
    assert!(h.gateway.calls().is_empty());

    let report = h.controller.tick_at(t0() + Duration::seconds(20)).await.unwrap();
    assert_eq!(report.cancels, vec![sol()]);
}

#[tokio::test]
async fn test_recovery_halves_budget() {
    let mut h = harness();
    let mut acct = account(vec![], vec![]);
    h.provider.set_account(acct.clone());
    h.controller.tick_at(t0()).await.unwrap();

    // Anchor 1000, equity 880: -12% puts the account in RECOVERY with the shield up
    acct.equity = dec!(880);
    acct.withdrawable = dec!(880);
    h.provider.set_account(acct);
    h.provider.set_candles(&sol(), CandleInterval::FifteenMinutes, pullback_candles());

    let report = h.controller.tick_at(t0() + Duration::seconds(20)).await.unwrap();
    let transition = report.transition.unwrap();
    assert_eq!(transition.to, RegimeMode::Recovery);
    assert_eq!(report.entries, vec![sol()]);

    // 880 × 0.11 × 0.5 = 48.4 margin, × 5 = 242 notional
    assert_eq!(h.gateway.limit_orders()[0].notional, dec!(242.0));
    let snapshot = h.sink.last().unwrap();
    assert!(snapshot.shield);
    assert_eq!(snapshot.mode, Some(RegimeMode::Recovery));
    assert!(h.controller.events().last_of(EventKind::Regime).is_some());
}

#[tokio::test]
async fn test_snapshot_reports_positions() {
    let mut h = harness();
    h.provider.set_account(account(vec![sol_long(dec!(0.4))], vec![]));

    h.controller.tick_at(t0()).await.unwrap();

    let snapshot = h.sink.last().unwrap();
    let view = snapshot.position(&sol()).unwrap();
    assert_eq!(view.side, Side::Long);
    assert_eq!(view.roe, dec!(2));
    assert!(view.secured);
    assert_eq!(view.stop, Some(dec!(0.5)));
    assert_eq!(view.high_water, Some(dec!(2)));
    assert_eq!(snapshot.total_unrealized_pnl, dec!(0.4));
    assert_eq!(snapshot.anchor, Some(dec!(1000)));
}
