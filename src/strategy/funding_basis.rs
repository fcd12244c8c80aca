//! Funding-rate basis capture.
//!
//! Opens a fixed-notional perpetual position when the annualized funding rate
//! clears a threshold, then holds it. One entry per flat period; closing is
//! left to an operator or a future exit rule.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{Strategy, StrategyActionTarget, StrategyError, StrategyResult};
use crate::exchange::{MarketContext, OrderResult, OrderSide, OrderType};
use crate::schema::{ActionType, StrategyMemory, Symbol};
use crate::utils::{display_pct, round_down_to_lot};

pub const FUNDING_BASIS_KIND: &str = "funding_basis";

/// Smallest order increment in base units
const LOT_SIZE: Decimal = dec!(0.0001);

/// Tunables stored in `StrategyMemory::config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingBasisConfig {
    #[serde(default = "default_instrument")]
    pub instrument: Symbol,
    #[serde(default = "default_asset")]
    pub asset: Symbol,
    /// Annualized funding threshold, e.g. 0.10 = 10% APR
    #[serde(default = "default_min_funding_apr")]
    pub min_funding_apr: Decimal,
    /// Funding periods per year (hourly funding = 8760)
    #[serde(default = "default_periods_per_year")]
    pub periods_per_year: u32,
    #[serde(default = "default_notional_usd")]
    pub notional_usd: Decimal,
    /// Flat fee booked per execution
    #[serde(default = "default_fee_usd")]
    pub fee_usd: Decimal,
}

fn default_instrument() -> Symbol {
    "BTC/USD".to_string()
}

fn default_asset() -> Symbol {
    "BTC".to_string()
}

fn default_min_funding_apr() -> Decimal {
    dec!(0.10)
}

fn default_periods_per_year() -> u32 {
    8760
}

fn default_notional_usd() -> Decimal {
    dec!(1000)
}

fn default_fee_usd() -> Decimal {
    dec!(1)
}

impl Default for FundingBasisConfig {
    fn default() -> Self {
        Self {
            instrument: default_instrument(),
            asset: default_asset(),
            min_funding_apr: default_min_funding_apr(),
            periods_per_year: default_periods_per_year(),
            notional_usd: default_notional_usd(),
            fee_usd: default_fee_usd(),
        }
    }
}

/// Position lifecycle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PositionPhase {
    #[default]
    Flat,
    Positioned { size_usd: Decimal },
}

/// Runtime state stored in `StrategyMemory::state`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FundingBasisState {
    #[serde(default)]
    pub position: PositionPhase,
}

/// Reference strategy: funding-rate basis capture on a single perpetual.
#[derive(Debug, Clone, Copy, Default)]
pub struct FundingBasisStrategy;

impl FundingBasisStrategy {
    fn config(&self, memory: &StrategyMemory) -> StrategyResult<FundingBasisConfig> {
        if memory.config.is_null() {
            return Ok(FundingBasisConfig::default());
        }
        serde_json::from_value(memory.config.clone()).map_err(|source| {
            StrategyError::InvalidConfig {
                strategy_id: memory.strategy_meta.id.clone(),
                source,
            }
        })
    }

    fn state(&self, memory: &StrategyMemory) -> StrategyResult<FundingBasisState> {
        if memory.state.is_null() {
            return Ok(FundingBasisState::default());
        }
        serde_json::from_value(memory.state.clone()).map_err(|source| {
            StrategyError::InvalidState {
                strategy_id: memory.strategy_meta.id.clone(),
                source,
            }
        })
    }
}

impl Strategy for FundingBasisStrategy {
    fn kind(&self) -> &'static str {
        FUNDING_BASIS_KIND
    }

    fn instruments(&self, memory: &StrategyMemory) -> StrategyResult<Vec<Symbol>> {
        Ok(vec![self.config(memory)?.instrument])
    }

    fn on_tick(
        &self,
        memory: &StrategyMemory,
        market: &MarketContext,
    ) -> StrategyResult<Option<StrategyActionTarget>> {
        let config = self.config(memory)?;
        let state = self.state(memory)?;
        let strategy_id = &memory.strategy_meta.id;

        if let PositionPhase::Positioned { size_usd } = state.position {
            debug!(strategy_id = %strategy_id, size_usd = %size_usd, "Already positioned");
            return Ok(None);
        }

        let (Some(price), Some(rate)) = (
            market.price(&config.instrument),
            market.funding_rate(&config.instrument),
        ) else {
            debug!(
                strategy_id = %strategy_id,
                instrument = %config.instrument,
                "Price or funding rate unavailable this tick"
            );
            return Ok(None);
        };

        if price <= Decimal::ZERO {
            return Ok(None);
        }

        let apr = rate * Decimal::from(config.periods_per_year);
        if apr <= config.min_funding_apr {
            debug!(
                strategy_id = %strategy_id,
                apr = %apr,
                threshold = %config.min_funding_apr,
                "Funding below threshold"
            );
            return Ok(None);
        }

        let amount = round_down_to_lot(config.notional_usd / price, LOT_SIZE);
        if amount <= Decimal::ZERO {
            debug!(
                strategy_id = %strategy_id,
                notional_usd = %config.notional_usd,
                price = %price,
                "Notional below one lot"
            );
            return Ok(None);
        }

        let venue = &memory.strategy_meta.venue;
        Ok(Some(StrategyActionTarget {
            action_type: ActionType::OpenPosition,
            symbol: config.instrument.clone(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            amount,
            delta_exposure_usd: config.notional_usd,
            asset_symbols: vec![config.asset.clone()],
            venue: venue.clone(),
            reference_price: Some(price),
            reason: format!(
                "Funding APR {}% on {} exceeds {}% threshold; opening {} USD on {}",
                display_pct(apr * Decimal::ONE_HUNDRED),
                config.instrument,
                display_pct(config.min_funding_apr * Decimal::ONE_HUNDRED),
                config.notional_usd,
                venue
            ),
        }))
    }

    fn on_fill(
        &self,
        memory: &StrategyMemory,
        target: &StrategyActionTarget,
        order: &OrderResult,
    ) -> StrategyResult<Value> {
        let mut state = self.state(memory)?;

        if order.filled_amount > Decimal::ZERO {
            let price = order.avg_price.or(target.reference_price).ok_or_else(|| {
                StrategyError::Fill {
                    strategy_id: memory.strategy_meta.id.clone(),
                    message: format!("order {} has no fill or reference price", order.order_id),
                }
            })?;
            state.position = PositionPhase::Positioned {
                size_usd: order.filled_amount * price,
            };
        }

        serde_json::to_value(&state).map_err(|source| StrategyError::InvalidState {
            strategy_id: memory.strategy_meta.id.clone(),
            source,
        })
    }

    fn execution_cost_usd(&self, memory: &StrategyMemory, _target: &StrategyActionTarget) -> Decimal {
        self.config(memory)
            .map(|c| c.fee_usd)
            .unwrap_or_else(|_| default_fee_usd())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{ExecutionMode, OrderStatus};
    use crate::persistence::default_funding_basis_memory;
    use crate::schema::{RiskBucket, StrategyStatus};
    use serde_json::json;
    use std::collections::HashMap;

    fn memory() -> StrategyMemory {
        default_funding_basis_memory(
            "basis-btc-kraken",
            "BTC/USD",
            "kraken",
            RiskBucket::Yellow,
            StrategyStatus::Running,
        )
    }

    fn market(price: Option<Decimal>, rate: Option<Decimal>) -> MarketContext {
        let mut ticks = HashMap::new();
        let mut rates = HashMap::new();
        if let Some(p) = price {
            ticks.insert("BTC/USD".to_string(), p);
        }
        if let Some(r) = rate {
            rates.insert("BTC/USD".to_string(), r);
        }
        MarketContext::new(ticks, rates)
    }

    fn fill(target: &StrategyActionTarget, avg_price: Option<Decimal>) -> OrderResult {
        OrderResult {
            order_id: "paper-1-0".to_string(),
            symbol: target.symbol.clone(),
            side: target.side,
            order_type: target.order_type,
            status: OrderStatus::Filled,
            requested_amount: target.amount,
            filled_amount: target.amount,
            avg_price,
            fee: Decimal::ZERO,
            mode: ExecutionMode::Paper,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_high_funding_proposes_open() {
        let strategy = FundingBasisStrategy;
        // 0.00002 * 8760 = 17.52% APR
        let ctx = market(Some(dec!(50000)), Some(dec!(0.00002)));

        let target = strategy.on_tick(&memory(), &ctx).unwrap().unwrap();

        assert_eq!(target.action_type, ActionType::OpenPosition);
        assert_eq!(target.side, OrderSide::Buy);
        assert_eq!(target.amount, dec!(0.02));
        assert_eq!(target.delta_exposure_usd, dec!(1000));
        assert_eq!(target.asset_symbols, vec!["BTC".to_string()]);
        assert_eq!(target.venue, "kraken");
        assert!(target.reason.contains("17.52%"));
    }

    #[test]
    fn test_low_funding_proposes_nothing() {
        let strategy = FundingBasisStrategy;
        // 0.00001 * 8760 = 8.76% APR
        let ctx = market(Some(dec!(50000)), Some(dec!(0.00001)));

        assert!(strategy.on_tick(&memory(), &ctx).unwrap().is_none());
    }

    #[test]
    fn test_missing_market_data_proposes_nothing() {
        let strategy = FundingBasisStrategy;

        assert!(strategy
            .on_tick(&memory(), &market(None, Some(dec!(0.001))))
            .unwrap()
            .is_none());
        assert!(strategy
            .on_tick(&memory(), &market(Some(dec!(50000)), None))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_positioned_proposes_nothing() {
        let strategy = FundingBasisStrategy;
        let mut memory = memory();
        memory.state = json!({"position": {"phase": "positioned", "size_usd": "1000"}});

        let ctx = market(Some(dec!(50000)), Some(dec!(0.001)));
        assert!(strategy.on_tick(&memory, &ctx).unwrap().is_none());
    }

    #[test]
    fn test_fill_moves_to_positioned() {
        let strategy = FundingBasisStrategy;
        let memory = memory();
        let ctx = market(Some(dec!(50000)), Some(dec!(0.00002)));
        let target = strategy.on_tick(&memory, &ctx).unwrap().unwrap();

        let state = strategy
            .on_fill(&memory, &target, &fill(&target, Some(dec!(50100))))
            .unwrap();
        let state: FundingBasisState = serde_json::from_value(state).unwrap();

        assert_eq!(
            state.position,
            PositionPhase::Positioned {
                size_usd: dec!(1002)
            }
        );
    }

    #[test]
    fn test_fill_without_price_uses_reference() {
        let strategy = FundingBasisStrategy;
        let memory = memory();
        let ctx = market(Some(dec!(50000)), Some(dec!(0.00002)));
        let target = strategy.on_tick(&memory, &ctx).unwrap().unwrap();

        let state = strategy.on_fill(&memory, &target, &fill(&target, None)).unwrap();
        assert_eq!(state["position"]["phase"], "positioned");
    }

    #[test]
    fn test_missing_config_uses_defaults_and_bad_config_errors() {
        let strategy = FundingBasisStrategy;
        let mut memory = memory();
        memory.config = Value::Null;
        assert_eq!(strategy.instruments(&memory).unwrap(), vec!["BTC/USD".to_string()]);

        memory.config = json!({"notional_usd": "lots"});
        assert!(matches!(
            strategy.instruments(&memory),
            Err(StrategyError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_execution_cost_is_configured_fee() {
        let strategy = FundingBasisStrategy;
        let memory = memory();
        let ctx = market(Some(dec!(50000)), Some(dec!(0.00002)));
        let target = strategy.on_tick(&memory, &ctx).unwrap().unwrap();

        assert_eq!(strategy.execution_cost_usd(&memory, &target), dec!(1));
    }
}
