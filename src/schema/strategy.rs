//! Per-strategy execution memory.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::domain::RiskBucket;

/// Default implementation selector for strategies seeded without one.
pub const DEFAULT_STRATEGY_KIND: &str = "funding_basis";

/// Administrative lifecycle of a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyStatus {
    Planned,
    Running,
    Paused,
    Deprecated,
}

impl fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyStatus::Planned => write!(f, "planned"),
            StrategyStatus::Running => write!(f, "running"),
            StrategyStatus::Paused => write!(f, "paused"),
            StrategyStatus::Deprecated => write!(f, "deprecated"),
        }
    }
}

impl std::str::FromStr for StrategyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "planned" => Ok(StrategyStatus::Planned),
            "running" => Ok(StrategyStatus::Running),
            "paused" => Ok(StrategyStatus::Paused),
            "deprecated" => Ok(StrategyStatus::Deprecated),
            other => Err(format!("unknown strategy status: {other}")),
        }
    }
}

/// Capital-affecting action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    OpenPosition,
    AdjustPosition,
    ClosePosition,
    MoveLiquidity,
}

impl ActionType {
    /// Wire/audit name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::OpenPosition => "OPEN_POSITION",
            ActionType::AdjustPosition => "ADJUST_POSITION",
            ActionType::ClosePosition => "CLOSE_POSITION",
            ActionType::MoveLiquidity => "MOVE_LIQUIDITY",
        }
    }

    /// Whether the action can add exposure and so gets the allocation checks.
    pub fn can_increase_exposure(&self) -> bool {
        matches!(self, ActionType::OpenPosition | ActionType::AdjustPosition)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OPEN_POSITION" => Ok(ActionType::OpenPosition),
            "ADJUST_POSITION" => Ok(ActionType::AdjustPosition),
            "CLOSE_POSITION" => Ok(ActionType::ClosePosition),
            "MOVE_LIQUIDITY" => Ok(ActionType::MoveLiquidity),
            other => Err(format!("unknown action type: {other}")),
        }
    }
}

/// Identity and lifecycle of a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyMeta {
    pub id: String,
    /// Which strategy implementation drives this record
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair: Option<String>,
    pub venue: String,
    pub risk_bucket: RiskBucket,
    pub status: StrategyStatus,
}

fn default_kind() -> String {
    DEFAULT_STRATEGY_KIND.to_string()
}

/// Lifetime bookkeeping, only changed by executed cycles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub lifetime_pnl_usd: Decimal,
    pub pnl_30d_usd: Decimal,
    pub max_drawdown_pct: Decimal,
    pub num_trades: u64,
    pub win_rate: Decimal,
}

/// One audit entry; every harness decision appends exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyLogEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub details: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl_impact_usd: Option<Decimal>,
}

/// Durable memory for one strategy id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyMemory {
    pub strategy_meta: StrategyMeta,
    /// Strategy-defined tunables, opaque to the harness
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub performance: Performance,
    /// Strategy-defined runtime state
    #[serde(default)]
    pub state: Value,
    #[serde(default)]
    pub logs: Vec<StrategyLogEntry>,
}

impl StrategyMemory {
    /// Build a fresh record: zeroed performance, no logs.
    pub fn seed(meta: StrategyMeta, config: Value, state: Value) -> Self {
        Self {
            strategy_meta: meta,
            config,
            performance: Performance::default(),
            state,
            logs: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.strategy_meta.status == StrategyStatus::Running
    }

    /// Append an audit entry stamped now.
    pub fn append_log(&mut self, action: &str, details: Value, pnl_impact_usd: Option<Decimal>) {
        self.logs.push(StrategyLogEntry {
            timestamp: Utc::now(),
            action: action.to_string(),
            details,
            pnl_impact_usd,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_type_wire_names() {
        let json = serde_json::to_string(&ActionType::OpenPosition).unwrap();
        assert_eq!(json, "\"OPEN_POSITION\"");
        assert_eq!(
            "move_liquidity".parse::<ActionType>().unwrap(),
            ActionType::MoveLiquidity
        );
        assert!(ActionType::AdjustPosition.can_increase_exposure());
        assert!(!ActionType::ClosePosition.can_increase_exposure());
    }

    #[test]
    fn test_missing_kind_defaults_to_funding_basis() {
        let raw = json!({
            "strategy_meta": {
                "id": "basis-btc",
                "venue": "kraken",
                "risk_bucket": "yellow",
                "status": "running"
            }
        });

        let memory: StrategyMemory = serde_json::from_value(raw).unwrap();
        assert_eq!(memory.strategy_meta.kind, DEFAULT_STRATEGY_KIND);
        assert!(memory.is_running());
        assert!(memory.logs.is_empty());
        assert_eq!(memory.performance.num_trades, 0);
    }

    #[test]
    fn test_status_parse_rejects_unknown() {
        assert_eq!("Paused".parse::<StrategyStatus>(), Ok(StrategyStatus::Paused));
        assert!("archived".parse::<StrategyStatus>().is_err());
    }
}
