//! Strategy implementations.
//!
//! A strategy reads its memory and the latest market context and may propose
//! one capital-affecting action per tick. It never executes anything itself:
//! the harness routes the proposal through policy and the venue, then hands
//! the fill back via `on_fill` to obtain the next state.

mod funding_basis;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::exchange::{MarketContext, OrderRequest, OrderResult, OrderSide, OrderType};
use crate::schema::{ActionType, StrategyMemory, Symbol};

pub use funding_basis::{
    FundingBasisConfig, FundingBasisState, FundingBasisStrategy, PositionPhase, FUNDING_BASIS_KIND,
};

/// Strategy-side failures (bad stored config/state, unusable fills).
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Invalid config for strategy {strategy_id}: {source}")]
    InvalidConfig {
        strategy_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid state for strategy {strategy_id}: {source}")]
    InvalidState {
        strategy_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot apply fill for strategy {strategy_id}: {message}")]
    Fill {
        strategy_id: String,
        message: String,
    },
}

pub type StrategyResult<T> = std::result::Result<T, StrategyError>;

/// A proposed action, including everything the policy check needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyActionTarget {
    pub action_type: ActionType,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub order_type: OrderType,
    /// Base units
    pub amount: Decimal,
    /// Signed USD exposure change
    pub delta_exposure_usd: Decimal,
    pub asset_symbols: Vec<Symbol>,
    pub venue: String,
    /// Price the proposal was sized against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_price: Option<Decimal>,
    /// Human-readable explanation for the audit log
    pub reason: String,
}

impl StrategyActionTarget {
    pub fn order_request(&self) -> OrderRequest {
        OrderRequest {
            symbol: self.symbol.clone(),
            order_type: self.order_type,
            side: self.side,
            amount: self.amount,
            limit_price: None,
        }
    }
}

/// A strategy implementation, selected by `strategy_meta.kind`.
pub trait Strategy: Send + Sync {
    /// Identifier stored in `strategy_meta.kind`.
    fn kind(&self) -> &'static str;

    /// Instruments whose market data `on_tick` needs.
    fn instruments(&self, memory: &StrategyMemory) -> StrategyResult<Vec<Symbol>>;

    /// Propose at most one action. Must not mutate anything.
    fn on_tick(
        &self,
        memory: &StrategyMemory,
        market: &MarketContext,
    ) -> StrategyResult<Option<StrategyActionTarget>>;

    /// New `state` after `target` was executed as `order`.
    fn on_fill(
        &self,
        memory: &StrategyMemory,
        target: &StrategyActionTarget,
        order: &OrderResult,
    ) -> StrategyResult<Value>;

    /// Fixed execution cost booked against lifetime PnL.
    fn execution_cost_usd(&self, _memory: &StrategyMemory, _target: &StrategyActionTarget) -> Decimal {
        Decimal::ZERO
    }
}

/// Strategy implementations keyed by kind.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<&'static str, Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in strategy.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FundingBasisStrategy));
        registry
    }

    /// Add or replace the implementation for `strategy.kind()`.
    pub fn register(&mut self, strategy: Arc<dyn Strategy>) {
        self.strategies.insert(strategy.kind(), strategy);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn Strategy>> {
        self.strategies.get(kind).cloned()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.strategies.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }
}
