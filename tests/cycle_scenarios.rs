//! End-to-end cycles over a real store, the paper venue, and the built-in
//! funding-basis strategy.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;

use treasury_engine::exchange::{ExecutionMode, PaperVenue};
use treasury_engine::harness::{CycleOutcome, ExecutionHarness, StaticSnapshotProvider};
use treasury_engine::persistence::{
    default_funding_basis_memory, FileMemoryStore, MemoryStore, SqliteMemoryStore,
};
use treasury_engine::schema::{PortfolioSnapshot, RiskBucket, StrategyStatus};
use treasury_engine::strategy::StrategyRegistry;

const ID: &str = "basis-btc-kraken";

/// Hourly rate that annualizes to 18% over 8760 periods.
fn eighteen_pct_apr_rate() -> Decimal {
    dec!(0.18) / dec!(8760)
}

fn snapshot(btc_pct: Decimal) -> PortfolioSnapshot {
    PortfolioSnapshot {
        total_portfolio_usd: dec!(50000),
        asset_pct: HashMap::from([("BTC".to_string(), btc_pct)]),
        stable_pct: dec!(80),
        runway_months: dec!(24),
        ..Default::default()
    }
}

async fn paper_venue() -> Arc<PaperVenue> {
    let venue = Arc::new(PaperVenue::default());
    venue
        .set_market_data(
            HashMap::from([("BTC/USD".to_string(), dec!(65000))]),
            HashMap::from([("BTC/USD".to_string(), eighteen_pct_apr_rate())]),
        )
        .await;
    venue
}

fn seed_running(store: &dyn MemoryStore) {
    let memory = default_funding_basis_memory(
        ID,
        "BTC/USD",
        "kraken",
        RiskBucket::Yellow,
        StrategyStatus::Running,
    );
    store.save_strategy_memory(ID, &memory).unwrap();
}

fn harness(
    store: Arc<dyn MemoryStore>,
    venue: Arc<PaperVenue>,
    btc_pct: Decimal,
) -> ExecutionHarness {
    ExecutionHarness::new(
        store,
        venue.clone(),
        venue,
        Arc::new(StaticSnapshotProvider::new(snapshot(btc_pct))),
        StrategyRegistry::with_builtin(),
    )
}

#[tokio::test]
async fn test_high_funding_with_headroom_opens_position() {
    let store: Arc<dyn MemoryStore> = Arc::new(SqliteMemoryStore::new(":memory:").unwrap());
    seed_running(store.as_ref());
    let venue = paper_venue().await;

    let outcome = harness(store.clone(), venue.clone(), dec!(2))
        .run_cycle(ID)
        .await
        .unwrap();

    let CycleOutcome::Executed { order, warnings } = outcome else {
        panic!("expected execution, got {:?}", outcome);
    };
    assert_eq!(order.mode, ExecutionMode::Paper);
    assert_eq!(order.symbol, "BTC/USD");
    assert!(warnings.is_empty());

    let memory = store.load_strategy_memory(ID).unwrap().unwrap();
    assert_eq!(memory.performance.num_trades, 1);
    assert_eq!(memory.logs.len(), 1);

    let entry = &memory.logs[0];
    assert_eq!(entry.action, "OPEN_POSITION");
    assert_eq!(entry.details["target"]["delta_exposure_usd"], "1000");
    assert_eq!(entry.details["target"]["asset_symbols"][0], "BTC");
    assert_eq!(entry.details["target"]["venue"], "kraken");
    assert_eq!(memory.state["position"]["phase"], "positioned");
    assert_eq!(venue.fills().await.len(), 1);
}

#[tokio::test]
async fn test_btc_near_cap_is_denied_and_logged() {
    let store: Arc<dyn MemoryStore> = Arc::new(SqliteMemoryStore::new(":memory:").unwrap());
    seed_running(store.as_ref());
    let before = store.load_strategy_memory(ID).unwrap().unwrap();
    let venue = paper_venue().await;

    let outcome = harness(store.clone(), venue.clone(), dec!(19.9))
        .run_cycle(ID)
        .await
        .unwrap();

    let CycleOutcome::Denied { reasons } = outcome else {
        panic!("expected denial, got {:?}", outcome);
    };
    assert!(reasons.iter().any(|r| r.contains("BTC")));

    let memory = store.load_strategy_memory(ID).unwrap().unwrap();
    assert_eq!(memory.performance, before.performance);
    assert_eq!(memory.state, before.state);
    assert_eq!(memory.logs.len(), 1);
    assert_eq!(memory.logs[0].action, "DENIAL");
    assert!(venue.fills().await.is_empty());
}

#[tokio::test]
async fn test_file_store_cycle_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let venue = paper_venue().await;

    {
        let store: Arc<dyn MemoryStore> = Arc::new(FileMemoryStore::new(dir.path()).unwrap());
        seed_running(store.as_ref());
        let outcome = harness(store, venue.clone(), dec!(2))
            .run_cycle(ID)
            .await
            .unwrap();
        assert_eq!(outcome.label(), "executed");
    }

    let reopened: Arc<dyn MemoryStore> = Arc::new(FileMemoryStore::new(dir.path()).unwrap());
    let memory = reopened.load_strategy_memory(ID).unwrap().unwrap();
    assert_eq!(memory.performance.num_trades, 1);
    assert_eq!(memory.performance.lifetime_pnl_usd, dec!(-1));

    // Positioned: another cycle proposes nothing and writes nothing
    let outcome = harness(reopened.clone(), venue, dec!(2))
        .run_cycle(ID)
        .await
        .unwrap();
    assert_eq!(outcome, CycleOutcome::NoProposal);
    assert_eq!(reopened.load_strategy_memory(ID).unwrap().unwrap(), memory);
}

#[tokio::test]
async fn test_paused_strategy_is_left_alone() {
    let store: Arc<dyn MemoryStore> = Arc::new(SqliteMemoryStore::new(":memory:").unwrap());
    let memory = default_funding_basis_memory(
        ID,
        "BTC/USD",
        "kraken",
        RiskBucket::Yellow,
        StrategyStatus::Paused,
    );
    store.save_strategy_memory(ID, &memory).unwrap();
    let venue = paper_venue().await;

    let outcome = harness(store.clone(), venue.clone(), dec!(2))
        .run_cycle(ID)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Inactive {
            status: StrategyStatus::Paused
        }
    );
    assert_eq!(store.load_strategy_memory(ID).unwrap().unwrap(), memory);
    assert!(venue.fills().await.is_empty());
}
