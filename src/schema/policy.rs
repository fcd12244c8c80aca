//! Policy check request/result and the portfolio snapshot they project from.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::domain::RiskBucket;
use super::strategy::ActionType;
use super::Symbol;

/// Point-in-time allocation summary, percentages 0-100.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub total_portfolio_usd: Decimal,
    #[serde(default)]
    pub asset_pct: HashMap<Symbol, Decimal>,
    #[serde(default)]
    pub venue_pct: HashMap<String, Decimal>,
    #[serde(default)]
    pub bucket_pct: HashMap<RiskBucket, Decimal>,
    pub stable_pct: Decimal,
    pub runway_months: Decimal,
}

impl PortfolioSnapshot {
    /// Current USD held in an asset; unknown assets hold nothing.
    pub fn asset_usd(&self, symbol: &str) -> Decimal {
        let pct = self.asset_pct.get(symbol).copied().unwrap_or(Decimal::ZERO);
        self.total_portfolio_usd * pct / Decimal::ONE_HUNDRED
    }

    /// Current USD held outside stablecoins.
    pub fn crypto_usd(&self) -> Decimal {
        self.total_portfolio_usd * (Decimal::ONE_HUNDRED - self.stable_pct) / Decimal::ONE_HUNDRED
    }
}

/// Proposed action submitted for a policy decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyCheckRequest {
    pub strategy_id: String,
    pub action_type: ActionType,
    /// Signed change in USD exposure
    pub delta_exposure_usd: Decimal,
    pub asset_symbols: Vec<Symbol>,
    pub venue: String,
    pub current_snapshot: PortfolioSnapshot,
}

impl PolicyCheckRequest {
    /// Whether the allocation checks apply.
    pub fn increases_exposure(&self) -> bool {
        self.action_type.can_increase_exposure() && self.delta_exposure_usd > Decimal::ZERO
    }
}

/// Outcome of a policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyDecision {
    Allow,
    Deny,
    /// Soft-limit tier: execute, but record the reasons
    Warn,
}

impl fmt::Display for PolicyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyDecision::Allow => write!(f, "allow"),
            PolicyDecision::Deny => write!(f, "deny"),
            PolicyDecision::Warn => write!(f, "warn"),
        }
    }
}

/// Decision plus ordered human-readable reasons (empty iff allowed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyCheckResult {
    pub decision: PolicyDecision,
    pub reasons: Vec<String>,
}

impl PolicyCheckResult {
    pub fn allow() -> Self {
        Self {
            decision: PolicyDecision::Allow,
            reasons: Vec::new(),
        }
    }

    pub fn deny(reasons: Vec<String>) -> Self {
        Self {
            decision: PolicyDecision::Deny,
            reasons,
        }
    }

    pub fn is_denied(&self) -> bool {
        self.decision == PolicyDecision::Deny
    }
}
