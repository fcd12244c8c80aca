//! Global domain memory: the treasury-wide policy record.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use super::strategy::StrategyStatus;

/// Reserved per-asset cap key applied to any symbol without an explicit cap.
pub const LONG_TAIL_KEY: &str = "LONG_TAIL";

/// Cap used when the allocation policy does not declare `LONG_TAIL`.
pub const DEFAULT_LONG_TAIL_PCT: Decimal = dec!(5);

/// Coarse risk classification used to cap aggregate exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBucket {
    Green,
    Yellow,
    Red,
}

impl fmt::Display for RiskBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskBucket::Green => write!(f, "green"),
            RiskBucket::Yellow => write!(f, "yellow"),
            RiskBucket::Red => write!(f, "red"),
        }
    }
}

impl std::str::FromStr for RiskBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "green" => Ok(RiskBucket::Green),
            "yellow" => Ok(RiskBucket::Yellow),
            "red" => Ok(RiskBucket::Red),
            other => Err(format!("unknown risk bucket: {other}")),
        }
    }
}

/// Who the treasury belongs to and how it reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreasuryProfile {
    pub entity_name: String,
    pub base_currency: String,
    pub reporting_cadence: String,
}

/// Solvency model. Not consulted by the policy engine yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunwayModel {
    pub monthly_burn_usd: Decimal,
    pub min_runway_months: Decimal,
    pub warning_runway_months: Decimal,
}

/// Allocation caps, all expressed 0-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPolicy {
    /// Max share of the portfolio held in non-stable assets
    pub max_total_crypto_pct: Decimal,
    /// Aggregate caps per risk bucket
    #[serde(default)]
    pub max_per_risk_bucket_pct: BTreeMap<RiskBucket, Decimal>,
    /// Per-asset caps keyed by symbol, `LONG_TAIL` is the fallback
    #[serde(default)]
    pub max_per_asset_pct: BTreeMap<String, Decimal>,
}

impl AllocationPolicy {
    /// Cap for an asset, falling back to the long-tail cap.
    pub fn asset_cap(&self, symbol: &str) -> Decimal {
        self.asset_cap_or(symbol, DEFAULT_LONG_TAIL_PCT)
    }

    /// Like [`asset_cap`](Self::asset_cap) with an explicit last-resort cap
    /// for when no `LONG_TAIL` entry is declared.
    pub fn asset_cap_or(&self, symbol: &str, long_tail_default: Decimal) -> Decimal {
        self.max_per_asset_pct
            .get(symbol)
            .or_else(|| self.max_per_asset_pct.get(LONG_TAIL_KEY))
            .copied()
            .unwrap_or(long_tail_default)
    }
}

/// Whether a venue may receive capital.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueStatus {
    Approved,
    Restricted,
}

impl fmt::Display for VenueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VenueStatus::Approved => write!(f, "approved"),
            VenueStatus::Restricted => write!(f, "restricted"),
        }
    }
}

/// Limit entry for a centralized exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueLimit {
    pub status: VenueStatus,
    pub max_exposure_pct: Decimal,
}

/// Limit entry for a decentralized protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefiVenueLimit {
    pub status: VenueStatus,
    pub max_exposure_pct: Decimal,
    #[serde(default)]
    pub approved_chains: Vec<String>,
}

/// Venue limits split by namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VenueLimits {
    #[serde(default)]
    pub cex: BTreeMap<String, VenueLimit>,
    #[serde(default)]
    pub defi: BTreeMap<String, DefiVenueLimit>,
}

impl VenueLimits {
    /// Look up a venue's status, centralized namespace first.
    pub fn status_of(&self, venue: &str) -> Option<VenueStatus> {
        self.cex
            .get(venue)
            .map(|v| v.status)
            .or_else(|| self.defi.get(venue).map(|v| v.status))
    }
}

/// Catalog entry consulted by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDescriptor {
    pub id: String,
    pub name: String,
    pub risk_bucket: RiskBucket,
    pub venue: String,
    pub status: StrategyStatus,
    pub target_allocation_pct: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard_loss_limit_pct: Option<Decimal>,
}

/// Singleton treasury-wide policy record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainMemory {
    pub treasury_profile: TreasuryProfile,
    pub runway_model: RunwayModel,
    pub allocation_policy: AllocationPolicy,
    #[serde(default)]
    pub venue_limits: VenueLimits,
    #[serde(default)]
    pub strategy_registry: Vec<StrategyDescriptor>,
}

impl DomainMemory {
    /// Report internal inconsistencies.
    ///
    /// Findings are advisory: nothing here is enforced at write time and the
    /// policy engine evaluates whatever caps are stored.
    pub fn validate(&self) -> Vec<String> {
        let mut findings = Vec::new();
        let policy = &self.allocation_policy;
        let global = policy.max_total_crypto_pct;

        check_pct(&mut findings, "max_total_crypto_pct", global);

        for (bucket, cap) in &policy.max_per_risk_bucket_pct {
            check_pct(&mut findings, &format!("risk bucket {bucket}"), *cap);
            if *cap > global {
                findings.push(format!(
                    "risk bucket {bucket} cap {cap}% exceeds global crypto cap {global}%"
                ));
            }
        }

        for (symbol, cap) in &policy.max_per_asset_pct {
            check_pct(&mut findings, &format!("asset {symbol}"), *cap);
            if *cap > global {
                findings.push(format!(
                    "asset {symbol} cap {cap}% exceeds global crypto cap {global}%"
                ));
            }
        }

        for (venue, limit) in &self.venue_limits.cex {
            check_pct(&mut findings, &format!("venue {venue}"), limit.max_exposure_pct);
        }
        for (venue, limit) in &self.venue_limits.defi {
            check_pct(&mut findings, &format!("venue {venue}"), limit.max_exposure_pct);
            if limit.status == VenueStatus::Approved && limit.approved_chains.is_empty() {
                findings.push(format!("defi venue {venue} is approved on no chains"));
            }
        }

        let mut seen = HashSet::new();
        for entry in &self.strategy_registry {
            if !seen.insert(entry.id.as_str()) {
                findings.push(format!("duplicate strategy registry id {}", entry.id));
            }
            check_pct(
                &mut findings,
                &format!("strategy {} target allocation", entry.id),
                entry.target_allocation_pct,
            );
        }

        findings
    }

    /// Registry entries for a given status.
    pub fn strategies_with_status(&self, status: StrategyStatus) -> Vec<&StrategyDescriptor> {
        self.strategy_registry
            .iter()
            .filter(|s| s.status == status)
            .collect()
    }
}

fn check_pct(findings: &mut Vec<String>, label: &str, value: Decimal) {
    if value < Decimal::ZERO || value > dec!(100) {
        findings.push(format!("{label} is {value}%, outside 0-100"));
    }
}
