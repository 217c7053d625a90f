//! E2E test: restart recovery.
//!
//! Flow:
//! 1. Controller A runs ticks against a shared store
//! 2. Controller A is dropped (simulated crash / restart)
//! 3. Controller B restores from the same store
//! 4. Verify: anchor, ratchet stops, cooldowns and stats survive; a corrupted
//!    state file starts empty instead of failing

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use luma_domain::{AccountState, CooldownReason, Instrument, Leverage, Position, RegimeMode};
use luma_exec::{StubGateway, StubProvider};
use luma_store::{JsonFileStore, MemoryStore, PersistedState, StateRepository};
use lumad::{Config, Controller, MemorySink};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 3, 10, 20, 0).unwrap()
}

fn sol() -> Instrument {
    Instrument::new("SOL").unwrap()
}

fn sol_long(pnl: Decimal) -> Position {
    Position::from_signed_size(sol(), dec!(1), dec!(100), pnl, dec!(20), Leverage::new(5).unwrap()).unwrap()
}

fn account(equity: Decimal, positions: Vec<Position>) -> AccountState {
    AccountState {
        equity,
        withdrawable: equity,
        positions,
        open_orders: Vec::new(),
    }
}

fn controller<S: StateRepository>(
    config: Config,
    provider: &Arc<StubProvider>,
    gateway: &Arc<StubGateway>,
    store: &Arc<S>,
) -> Controller<StubProvider, StubGateway, S> {
    Controller::new(
        config,
        provider.clone(),
        gateway.clone(),
        store.clone(),
        Arc::new(MemorySink::new()),
    )
    .unwrap()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_restart_restores_ratchet_and_anchor() {
    let provider = Arc::new(StubProvider::new());
    let gateway = Arc::new(StubGateway::new());
    let store = Arc::new(MemoryStore::new());

    // Controller A: position at +12% ROE arms a trailing stop at 10.5
    let mut a = controller(Config::test(), &provider, &gateway, &store);
    a.restore(t0()).await.unwrap();
    provider.set_account(account(dec!(1000), vec![sol_long(dec!(2.4))]));
    a.tick_at(t0()).await.unwrap();
    drop(a);

    let saved = store.saved().unwrap();
    assert_eq!(saved.anchor_equity, Some(dec!(1000)));
    assert_eq!(saved.record(&sol()).unwrap().stop, dec!(10.5));

    // Controller B: a conflicting configured anchor loses to the persisted one
    let config = Config {
        anchor_equity: Some(dec!(5000)),
        ..Config::test()
    };
    let mut b = controller(config, &provider, &gateway, &store);
    b.restore(t0() + Duration::seconds(30)).await.unwrap();
    assert_eq!(b.regime().anchor(), Some(dec!(1000)));
    assert_eq!(b.ratchet().record(&sol()).unwrap().high_water, dec!(12));

    // Equity 1200 against anchor 1000 is +20%: GOD_MODE
    // ROE +8% is below the restored 10.5 stop: closed at once
    provider.set_account(account(dec!(1200), vec![sol_long(dec!(1.6))]));
    let report = b.tick_at(t0() + Duration::seconds(30)).await.unwrap();

    assert_eq!(b.regime().current().unwrap().mode, RegimeMode::GodMode);
    assert_eq!(report.closes, vec![sol()]);
    assert_eq!(gateway.closes().len(), 1);
}

#[tokio::test]
async fn test_fresh_record_without_restore_would_not_close() {
    let provider = Arc::new(StubProvider::new());
    let gateway = Arc::new(StubGateway::new());
    let store = Arc::new(MemoryStore::new());

    // Same +8% position seen for the first time: seeded at 8, stop at 6
    let mut c = controller(Config::test(), &provider, &gateway, &store);
    c.restore(t0()).await.unwrap();
    provider.set_account(account(dec!(1000), vec![sol_long(dec!(1.6))]));
    let report = c.tick_at(t0()).await.unwrap();

    assert!(report.closes.is_empty());
    assert_eq!(c.ratchet().record(&sol()).unwrap().stop, dec!(6));
}

#[tokio::test]
async fn test_restart_keeps_trauma_cooldown_and_stats() {
    let provider = Arc::new(StubProvider::new());
    let gateway = Arc::new(StubGateway::new());
    let store = Arc::new(MemoryStore::new());

    let mut a = controller(Config::test(), &provider, &gateway, &store);
    a.restore(t0()).await.unwrap();
    provider.set_account(account(dec!(1000), vec![sol_long(dec!(-5))]));
    a.tick_at(t0()).await.unwrap();
    drop(a);

    // Ten minutes later: trauma (15 min) still running
    let mut b = controller(Config::test(), &provider, &gateway, &store);
    b.restore(t0() + Duration::minutes(10)).await.unwrap();
    let cooldown = b.cooldowns().blocking(&sol(), t0() + Duration::minutes(10)).unwrap();
    assert_eq!(cooldown.reason, CooldownReason::Trauma);
    assert_eq!(b.ratchet().stats().losses, 1);
    drop(b);

    // Twenty minutes later: expired cooldowns are not restored
    let mut c = controller(Config::test(), &provider, &gateway, &store);
    c.restore(t0() + Duration::minutes(20)).await.unwrap();
    assert!(c.cooldowns().snapshot(t0() + Duration::minutes(20)).is_empty());
}

#[tokio::test]
async fn test_corrupted_state_starts_empty() {
    let provider = Arc::new(StubProvider::new());
    let gateway = Arc::new(StubGateway::new());
    let store = Arc::new(MemoryStore::with_state(PersistedState {
        anchor_equity: Some(dec!(777)),
        ..PersistedState::default()
    }));
    store.corrupt();

    let mut c = controller(Config::test(), &provider, &gateway, &store);
    c.restore(t0()).await.unwrap();
    assert_eq!(c.regime().anchor(), None);

    // Rebuilt from live data: first equity becomes the anchor
    provider.set_account(account(dec!(900), Vec::new()));
    c.tick_at(t0()).await.unwrap();
    assert_eq!(c.regime().anchor(), Some(dec!(900)));
    assert_eq!(store.saved().unwrap().anchor_equity, Some(dec!(900)));
}

#[tokio::test]
async fn test_json_file_store_round_trip() {
    let dir = std::env::temp_dir().join(format!("luma-restart-{}", std::process::id()));
    let provider = Arc::new(StubProvider::new());
    let gateway = Arc::new(StubGateway::new());
    let store = Arc::new(JsonFileStore::in_dir(&dir));

    let mut a = controller(Config::test(), &provider, &gateway, &store);
    a.restore(t0()).await.unwrap();
    provider.set_account(account(dec!(1000), vec![sol_long(dec!(2.4))]));
    a.tick_at(t0()).await.unwrap();
    drop(a);

    let mut b = controller(Config::test(), &provider, &gateway, &store);
    b.restore(t0()).await.unwrap();
    assert_eq!(b.regime().anchor(), Some(dec!(1000)));
    assert_eq!(b.ratchet().record(&sol()).unwrap().stop, dec!(10.5));

    // Garbage on disk is tolerated
    tokio::fs::write(store.path(), b"{ not json").await.unwrap();
    let mut c = controller(Config::test(), &provider, &gateway, &store);
    c.restore(t0()).await.unwrap();
    assert!(c.ratchet().record(&sol()).is_none());

    tokio::fs::remove_dir_all(&dir).await.ok();
}
