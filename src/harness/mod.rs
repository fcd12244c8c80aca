//! Execution harness: one gated, policy-checked cycle per strategy.
//!
//! A cycle:
//! 1. Loads strategy memory (absent → not provisioned)
//! 2. Skips anything not `running` before touching the market or venue
//! 3. Asks the strategy for a proposal against fresh market data
//! 4. Checks the proposal against domain memory and a portfolio snapshot
//! 5. Logs the denial, or executes and books the fill (an order that
//!    fills nothing is logged without touching performance or state)
//! 6. Saves memory once, only when a proposal was produced
//!
//! Any error aborts before the save, leaving stored memory untouched.

mod snapshot;

use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::exchange::{MarketDataProvider, OrderResult, OrderStatus, OrderVenue, VenueError};
use crate::persistence::{MemoryStore, StoreError};
use crate::policy::{PolicyEngine, PolicyEvaluator};
use crate::schema::{PolicyCheckRequest, PolicyDecision, StrategyStatus};
use crate::strategy::{StrategyError, StrategyRegistry};

#[cfg(test)]
pub use snapshot::MockSnapshotProvider;
pub use snapshot::{SnapshotProvider, StaticSnapshotProvider};

/// Audit action recorded for a policy denial.
pub const DENIAL_ACTION: &str = "DENIAL";

/// Audit action recorded for an accepted order with no fills.
pub const UNFILLED_ACTION: &str = "ORDER_UNFILLED";

/// Faults that abort a cycle.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Venue(#[from] VenueError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error("Strategy {strategy_id} has unknown kind {kind:?}")]
    UnknownStrategyKind { strategy_id: String, kind: String },

    #[error("Portfolio snapshot unavailable: {0}")]
    Snapshot(String),

    #[error("Failed to encode audit entry: {0}")]
    Audit(#[from] serde_json::Error),
}

pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

/// What a cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No memory stored for the id
    NotProvisioned,
    /// Status is not `running`; nothing was touched
    Inactive { status: StrategyStatus },
    /// Strategy had nothing to do this tick
    NoProposal,
    /// Policy rejected the proposal; a denial was logged
    Denied { reasons: Vec<String> },
    /// Proposal executed; `warnings` carries soft-limit reasons, if any
    Executed {
        order: OrderResult,
        warnings: Vec<String>,
    },
    /// Venue accepted the order but filled nothing; logged, not booked
    Unfilled { order: OrderResult },
}

impl CycleOutcome {
    /// Short label for logs and the CLI.
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::NotProvisioned => "not_provisioned",
            CycleOutcome::Inactive { .. } => "inactive",
            CycleOutcome::NoProposal => "no_proposal",
            CycleOutcome::Denied { .. } => "denied",
            CycleOutcome::Executed { .. } => "executed",
            CycleOutcome::Unfilled { .. } => "unfilled",
        }
    }
}

/// Runs strategy cycles against injected collaborators.
pub struct ExecutionHarness {
    store: Arc<dyn MemoryStore>,
    market: Arc<dyn MarketDataProvider>,
    venue: Arc<dyn OrderVenue>,
    snapshots: Arc<dyn SnapshotProvider>,
    strategies: StrategyRegistry,
    policy: Arc<dyn PolicyEvaluator>,
}

impl ExecutionHarness {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        market: Arc<dyn MarketDataProvider>,
        venue: Arc<dyn OrderVenue>,
        snapshots: Arc<dyn SnapshotProvider>,
        strategies: StrategyRegistry,
    ) -> Self {
        Self {
            store,
            market,
            venue,
            snapshots,
            strategies,
            policy: Arc::new(PolicyEngine::default()),
        }
    }

    /// Replace the policy evaluator.
    pub fn with_policy(mut self, policy: Arc<dyn PolicyEvaluator>) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &Arc<dyn MemoryStore> {
        &self.store
    }

    /// Run one cycle for `strategy_id`.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self, strategy_id: &str) -> HarnessResult<CycleOutcome> {
        // 1. Load
        let Some(mut memory) = self.store.load_strategy_memory(strategy_id)? else {
            debug!(strategy_id = %strategy_id, "No strategy memory; skipping");
            return Ok(CycleOutcome::NotProvisioned);
        };

        // 2. Run-gate
        if !memory.is_running() {
            let status = memory.strategy_meta.status;
            debug!(strategy_id = %strategy_id, status = %status, "Strategy not running");
            return Ok(CycleOutcome::Inactive { status });
        }

        // 3. Propose
        let kind = memory.strategy_meta.kind.clone();
        let strategy =
            self.strategies
                .get(&kind)
                .ok_or_else(|| HarnessError::UnknownStrategyKind {
                    strategy_id: strategy_id.to_string(),
                    kind: kind.clone(),
                })?;

        let instruments = strategy.instruments(&memory)?;
        let market = self.market.fetch_market_context(&instruments).await?;

        let Some(target) = strategy.on_tick(&memory, &market)? else {
            debug!(strategy_id = %strategy_id, "No proposal this tick");
            return Ok(CycleOutcome::NoProposal);
        };

        info!(
            strategy_id = %strategy_id,
            action = %target.action_type,
            symbol = %target.symbol,
            amount = %target.amount,
            delta_usd = %target.delta_exposure_usd,
            reason = %target.reason,
            "Strategy proposed action"
        );

        // 4. Check
        let snapshot = self.snapshots.portfolio_snapshot().await?;
        let domain = self.store.load_domain_memory()?;
        let request = PolicyCheckRequest {
            strategy_id: strategy_id.to_string(),
            action_type: target.action_type,
            delta_exposure_usd: target.delta_exposure_usd,
            asset_symbols: target.asset_symbols.clone(),
            venue: target.venue.clone(),
            current_snapshot: snapshot,
        };
        let result = self.policy.evaluate(&domain, &request);

        let target_json = serde_json::to_value(&target)?;

        // 5. Deny
        if result.is_denied() {
            memory.append_log(
                DENIAL_ACTION,
                json!({ "target": target_json, "reasons": result.reasons }),
                None,
            );
            self.store.save_strategy_memory(strategy_id, &memory)?;
            return Ok(CycleOutcome::Denied {
                reasons: result.reasons,
            });
        }

        let warnings = if result.decision == PolicyDecision::Warn {
            for reason in &result.reasons {
                warn!(strategy_id = %strategy_id, reason = %reason, "Policy warning");
            }
            result.reasons
        } else {
            Vec::new()
        };

        // 6. Execute
        let order = self.venue.execute_order(&target.order_request()).await?;
        if order.status == OrderStatus::Rejected {
            return Err(VenueError::Rejected(format!(
                "order {} for {} rejected by venue",
                order.order_id, order.symbol
            ))
            .into());
        }

        let mut details = json!({
            "target": target_json,
            "order": serde_json::to_value(&order)?,
        });
        if !warnings.is_empty() {
            details["warnings"] = serde_json::to_value(&warnings)?;
        }

        if order.filled_amount <= Decimal::ZERO {
            warn!(
                strategy_id = %strategy_id,
                order_id = %order.order_id,
                status = ?order.status,
                "Order accepted without fills; not booked"
            );
            memory.append_log(UNFILLED_ACTION, details, None);
            self.store.save_strategy_memory(strategy_id, &memory)?;
            return Ok(CycleOutcome::Unfilled { order });
        }

        let cost = strategy.execution_cost_usd(&memory, &target);
        let new_state = strategy.on_fill(&memory, &target, &order)?;

        memory.performance.num_trades += 1;
        memory.performance.lifetime_pnl_usd -= cost;
        memory.state = new_state;
        memory.append_log(target.action_type.as_str(), details, Some(Decimal::ZERO));

        // 7. Persist
        self.store.save_strategy_memory(strategy_id, &memory)?;

        info!(
            strategy_id = %strategy_id,
            order_id = %order.order_id,
            mode = %order.mode,
            filled = %order.filled_amount,
            cost_usd = %cost,
            num_trades = memory.performance.num_trades,
            "Action executed"
        );

        Ok(CycleOutcome::Executed { order, warnings })
    }
}
