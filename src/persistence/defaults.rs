//! Seed records written on first access.

use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::schema::{
    AllocationPolicy, DefiVenueLimit, DomainMemory, RiskBucket, RunwayModel, StrategyDescriptor,
    StrategyMemory, StrategyMeta, StrategyStatus, TreasuryProfile, VenueLimit, VenueLimits,
    VenueStatus, LONG_TAIL_KEY,
};
use crate::strategy::FundingBasisState;

/// Domain memory used when the store holds none.
pub fn default_domain_memory() -> DomainMemory {
    let max_per_risk_bucket_pct = BTreeMap::from([
        (RiskBucket::Green, dec!(40)),
        (RiskBucket::Yellow, dec!(20)),
        (RiskBucket::Red, dec!(5)),
    ]);

    let max_per_asset_pct = BTreeMap::from([
        ("BTC".to_string(), dec!(20)),
        ("ETH".to_string(), dec!(15)),
        ("SOL".to_string(), dec!(8)),
        (LONG_TAIL_KEY.to_string(), dec!(5)),
    ]);

    let cex = BTreeMap::from([
        (
            "kraken".to_string(),
            VenueLimit {
                status: VenueStatus::Approved,
                max_exposure_pct: dec!(25),
            },
        ),
        (
            "coinbase".to_string(),
            VenueLimit {
                status: VenueStatus::Approved,
                max_exposure_pct: dec!(25),
            },
        ),
        (
            "binance".to_string(),
            VenueLimit {
                status: VenueStatus::Restricted,
                max_exposure_pct: dec!(0),
            },
        ),
    ]);

    let defi = BTreeMap::from([
        (
            "aave".to_string(),
            DefiVenueLimit {
                status: VenueStatus::Approved,
                max_exposure_pct: dec!(10),
                approved_chains: vec!["ethereum".to_string(), "arbitrum".to_string()],
            },
        ),
        (
            "uniswap".to_string(),
            DefiVenueLimit {
                status: VenueStatus::Restricted,
                max_exposure_pct: dec!(0),
                approved_chains: Vec::new(),
            },
        ),
    ]);

    DomainMemory {
        treasury_profile: TreasuryProfile {
            entity_name: "Default Treasury".to_string(),
            base_currency: "USD".to_string(),
            reporting_cadence: "monthly".to_string(),
        },
        runway_model: RunwayModel {
            monthly_burn_usd: dec!(50000),
            min_runway_months: dec!(12),
            warning_runway_months: dec!(18),
        },
        allocation_policy: AllocationPolicy {
            max_total_crypto_pct: dec!(40),
            max_per_risk_bucket_pct,
            max_per_asset_pct,
        },
        venue_limits: VenueLimits { cex, defi },
        strategy_registry: vec![StrategyDescriptor {
            id: "basis-btc-kraken".to_string(),
            name: "BTC funding basis (Kraken)".to_string(),
            risk_bucket: RiskBucket::Yellow,
            venue: "kraken".to_string(),
            status: StrategyStatus::Planned,
            target_allocation_pct: dec!(5),
            hard_loss_limit_pct: Some(dec!(2)),
        }],
    }
}

/// Fresh strategy record: zeroed performance, no logs.
pub fn seed_strategy_memory(meta: StrategyMeta, config: Value, state: Value) -> StrategyMemory {
    StrategyMemory::seed(meta, config, state)
}

/// Fresh funding-basis strategy record: flat, default tunables.
pub fn default_funding_basis_memory(
    strategy_id: &str,
    pair: &str,
    venue: &str,
    risk_bucket: RiskBucket,
    status: StrategyStatus,
) -> StrategyMemory {
    let asset = pair.split('/').next().unwrap_or(pair).to_string();

    let meta = StrategyMeta {
        id: strategy_id.to_string(),
        kind: crate::strategy::FUNDING_BASIS_KIND.to_string(),
        pair: Some(pair.to_string()),
        venue: venue.to_string(),
        risk_bucket,
        status,
    };

    let config = json!({
        "instrument": pair,
        "asset": asset,
        "min_funding_apr": "0.10",
        "periods_per_year": 8760,
        "notional_usd": "1000",
        "fee_usd": "1",
    });

    let state = serde_json::to_value(FundingBasisState::default()).unwrap_or_default();

    seed_strategy_memory(meta, config, state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_funding_basis_seed_is_flat_and_empty() {
        let memory = default_funding_basis_memory(
            "basis-eth",
            "ETH/USD",
            "kraken",
            RiskBucket::Yellow,
            StrategyStatus::Planned,
        );

        assert_eq!(memory.config["asset"], "ETH");
        assert_eq!(memory.state["position"]["phase"], "flat");
        assert!(memory.logs.is_empty());
        assert_eq!(memory.performance.num_trades, 0);
    }
}
