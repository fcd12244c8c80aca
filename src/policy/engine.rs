//! Allocation and venue checks on a proposed action.

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::schema::{
    DomainMemory, PolicyCheckRequest, PolicyCheckResult, VenueStatus, DEFAULT_LONG_TAIL_PCT,
};
use crate::utils::{display_pct, pct_of};

/// Evaluate `request` against the caps in `domain`.
///
/// Allocation checks only apply to `OPEN_POSITION`/`ADJUST_POSITION` with a
/// positive delta; the venue check always applies. Any reason denies.
pub fn check_policy(domain: &DomainMemory, request: &PolicyCheckRequest) -> PolicyCheckResult {
    evaluate(domain, request, DEFAULT_LONG_TAIL_PCT)
}

/// Anything that can rule on a proposed action.
pub trait PolicyEvaluator: Send + Sync {
    fn evaluate(&self, domain: &DomainMemory, request: &PolicyCheckRequest) -> PolicyCheckResult;
}

/// Policy evaluator with logging.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    /// Asset cap used when neither the symbol nor `LONG_TAIL` is declared
    long_tail_default_pct: Decimal,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(DEFAULT_LONG_TAIL_PCT)
    }
}

impl PolicyEngine {
    pub fn new(long_tail_default_pct: Decimal) -> Self {
        Self {
            long_tail_default_pct,
        }
    }

    /// Evaluate a request, logging the decision.
    pub fn check(&self, domain: &DomainMemory, request: &PolicyCheckRequest) -> PolicyCheckResult {
        let result = evaluate(domain, request, self.long_tail_default_pct);

        if result.is_denied() {
            warn!(
                strategy_id = %request.strategy_id,
                action = %request.action_type,
                delta_usd = %request.delta_exposure_usd,
                venue = %request.venue,
                reasons = ?result.reasons,
                "Policy denied action"
            );
        } else {
            info!(
                strategy_id = %request.strategy_id,
                action = %request.action_type,
                delta_usd = %request.delta_exposure_usd,
                venue = %request.venue,
                decision = %result.decision,
                "Policy check passed"
            );
        }

        result
    }
}

impl PolicyEvaluator for PolicyEngine {
    fn evaluate(&self, domain: &DomainMemory, request: &PolicyCheckRequest) -> PolicyCheckResult {
        self.check(domain, request)
    }
}

fn evaluate(
    domain: &DomainMemory,
    request: &PolicyCheckRequest,
    long_tail_default_pct: Decimal,
) -> PolicyCheckResult {
    let mut reasons = Vec::new();

    if request.increases_exposure() {
        check_allocation(domain, request, long_tail_default_pct, &mut reasons);
    }

    check_venue(domain, &request.venue, &mut reasons);

    if reasons.is_empty() {
        PolicyCheckResult::allow()
    } else {
        PolicyCheckResult::deny(reasons)
    }
}

fn check_allocation(
    domain: &DomainMemory,
    request: &PolicyCheckRequest,
    long_tail_default_pct: Decimal,
    reasons: &mut Vec<String>,
) {
    let snapshot = &request.current_snapshot;
    let delta = request.delta_exposure_usd;
    let policy = &domain.allocation_policy;

    let projected_total = snapshot.total_portfolio_usd + delta;
    if projected_total <= Decimal::ZERO {
        reasons.push(format!(
            "projected portfolio value is not positive ({} USD)",
            projected_total
        ));
        return;
    }

    // Global crypto cap
    let projected_crypto_pct = pct_of(snapshot.crypto_usd() + delta, projected_total);
    debug!(
        projected_crypto_pct = %projected_crypto_pct,
        max = %policy.max_total_crypto_pct,
        "Crypto allocation check"
    );
    if projected_crypto_pct > policy.max_total_crypto_pct {
        reasons.push(format!(
            "projected crypto allocation {}% exceeds max {}%",
            display_pct(projected_crypto_pct),
            policy.max_total_crypto_pct
        ));
    }

    // Per-asset caps; the full delta is attributed to every named asset
    for symbol in &request.asset_symbols {
        let projected_asset_pct = pct_of(snapshot.asset_usd(symbol) + delta, projected_total);
        let cap = policy.asset_cap_or(symbol, long_tail_default_pct);
        debug!(
            symbol = %symbol,
            projected_asset_pct = %projected_asset_pct,
            cap = %cap,
            "Asset allocation check"
        );
        if projected_asset_pct > cap {
            reasons.push(format!(
                "projected {} allocation {}% exceeds max {}%",
                symbol,
                display_pct(projected_asset_pct),
                cap
            ));
        }
    }
}

fn check_venue(domain: &DomainMemory, venue: &str, reasons: &mut Vec<String>) {
    match domain.venue_limits.status_of(venue) {
        Some(VenueStatus::Approved) => {}
        Some(VenueStatus::Restricted) => {
            reasons.push(format!("venue {} is not approved (status: restricted)", venue));
        }
        None => {
            reasons.push(format!("venue {} is not explicitly approved", venue));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::default_domain_memory;
    use crate::schema::{ActionType, PolicyDecision, PortfolioSnapshot, LONG_TAIL_KEY};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn snapshot(btc_pct: Decimal) -> PortfolioSnapshot {
        PortfolioSnapshot {
            total_portfolio_usd: dec!(50000),
            asset_pct: HashMap::from([("BTC".to_string(), btc_pct)]),
            stable_pct: dec!(80),
            runway_months: dec!(24),
            ..Default::default()
        }
    }

    fn open_btc(delta: Decimal, venue: &str, snapshot: PortfolioSnapshot) -> PolicyCheckRequest {
        PolicyCheckRequest {
            strategy_id: "basis-btc-kraken".to_string(),
            action_type: ActionType::OpenPosition,
            delta_exposure_usd: delta,
            asset_symbols: vec!["BTC".to_string()],
            venue: venue.to_string(),
            current_snapshot: snapshot,
        }
    }

    #[test]
    fn test_small_btc_open_on_approved_venue_allowed() {
        let domain = default_domain_memory();
        let request = open_btc(dec!(1000), "kraken", snapshot(dec!(2)));

        let result = check_policy(&domain, &request);

        assert_eq!(result.decision, PolicyDecision::Allow);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn test_btc_near_cap_denied_with_symbol_in_reason() {
        let domain = default_domain_memory();
        // (9950 + 1000) / 51000 = 21.47% > 20%
        let request = open_btc(dec!(1000), "kraken", snapshot(dec!(19.9)));

        let result = check_policy(&domain, &request);

        assert_eq!(result.decision, PolicyDecision::Deny);
        assert_eq!(result.reasons.len(), 1);
        assert!(result.reasons[0].contains("BTC"));
    }

    #[test]
    fn test_unknown_symbol_uses_long_tail_cap() {
        let domain = default_domain_memory();
        let mut request = open_btc(dec!(3000), "kraken", snapshot(dec!(0)));
        request.asset_symbols = vec!["PEPE".to_string()];

        // 3000 / 53000 = 5.66% > LONG_TAIL 5%
        let result = check_policy(&domain, &request);
        assert!(result.is_denied());
        assert!(result.reasons[0].contains("PEPE"));
    }

    #[test]
    fn test_engine_fallback_applies_without_long_tail_entry() {
        let mut domain = default_domain_memory();
        domain.allocation_policy.max_per_asset_pct.remove(LONG_TAIL_KEY);
        let mut request = open_btc(dec!(2000), "kraken", snapshot(dec!(0)));
        request.asset_symbols = vec!["PEPE".to_string()];

        // 2000 / 52000 = 3.85%
        assert!(!check_policy(&domain, &request).is_denied());
        assert!(PolicyEngine::new(dec!(3)).check(&domain, &request).is_denied());
    }

    #[test]
    fn test_every_named_asset_gets_full_delta() {
        let domain = default_domain_memory();
        let mut snap = snapshot(dec!(2));
        snap.asset_pct.insert("ETH".to_string(), dec!(14));
        let mut request = open_btc(dec!(1000), "kraken", snap);
        request.asset_symbols = vec!["BTC".to_string(), "ETH".to_string()];

        // BTC: 2000/51000 = 3.9%; ETH: 8000/51000 = 15.7% > 15%
        let result = check_policy(&domain, &request);
        assert_eq!(result.reasons.len(), 1);
        assert!(result.reasons[0].contains("ETH"));
    }

    #[test]
    fn test_unknown_venue_denied_by_default() {
        let domain = default_domain_memory();
        let request = open_btc(dec!(1000), "ftx", snapshot(dec!(2)));

        let result = check_policy(&domain, &request);

        assert!(result.is_denied());
        assert!(result.reasons[0].contains("not explicitly approved"));
    }

    #[test]
    fn test_restricted_venue_reason_differs() {
        let domain = default_domain_memory();

        let cex = check_policy(&domain, &open_btc(dec!(1000), "binance", snapshot(dec!(2))));
        assert!(cex.reasons[0].contains("status: restricted"));

        let defi = check_policy(&domain, &open_btc(dec!(1000), "uniswap", snapshot(dec!(2))));
        assert!(defi.reasons[0].contains("status: restricted"));

        let aave = check_policy(&domain, &open_btc(dec!(1000), "aave", snapshot(dec!(2))));
        assert!(!aave.is_denied());
    }

    #[test]
    fn test_global_cap_denies_regardless_of_asset_headroom() {
        let domain = default_domain_memory();
        let mut snap = snapshot(dec!(0));
        snap.stable_pct = dec!(60);
        let request = open_btc(dec!(1000), "kraken", snap);

        // crypto: (20000 + 1000) / 51000 = 41.18% > 40%; BTC: 1.96%
        let result = check_policy(&domain, &request);

        assert!(result.is_denied());
        assert_eq!(result.reasons.len(), 1);
        assert!(result.reasons[0].contains("crypto"));
        assert!(result.reasons[0].contains("40%"));
    }

    #[test]
    fn test_close_only_gets_venue_check() {
        let domain = default_domain_memory();
        let mut request = open_btc(dec!(100000), "kraken", snapshot(dec!(19.9)));
        request.action_type = ActionType::ClosePosition;
        assert!(!check_policy(&domain, &request).is_denied());

        request.venue = "binance".to_string();
        let result = check_policy(&domain, &request);
        assert_eq!(result.reasons.len(), 1);
        assert!(result.reasons[0].contains("binance"));
    }

    #[test]
    fn test_negative_delta_skips_allocation_checks() {
        let domain = default_domain_memory();
        let mut request = open_btc(dec!(-1000), "kraken", snapshot(dec!(25)));
        request.action_type = ActionType::AdjustPosition;

        assert!(!check_policy(&domain, &request).is_denied());
    }

    #[test]
    fn test_non_positive_projected_total_denied() {
        let domain = default_domain_memory();
        let mut snap = snapshot(dec!(0));
        snap.total_portfolio_usd = Decimal::ZERO;
        snap.stable_pct = Decimal::ZERO;
        let mut request = open_btc(dec!(1000), "kraken", snap);
        request.delta_exposure_usd = dec!(0.0);

        // zero delta is not an increase, only the venue check runs
        assert!(!check_policy(&domain, &request).is_denied());

        request.current_snapshot.total_portfolio_usd = dec!(-5000);
        request.delta_exposure_usd = dec!(1000);
        let result = check_policy(&domain, &request);
        assert!(result.is_denied());
        assert!(result.reasons[0].contains("not positive"));
    }

    #[test]
    fn test_denial_collects_all_reasons_in_order() {
        let domain = default_domain_memory();
        let mut snap = snapshot(dec!(19.9));
        snap.stable_pct = dec!(60);
        let request = open_btc(dec!(1000), "ftx", snap);

        let result = check_policy(&domain, &request);

        assert_eq!(result.reasons.len(), 3);
        assert!(result.reasons[0].contains("crypto"));
        assert!(result.reasons[1].contains("BTC"));
        assert!(result.reasons[2].contains("ftx"));
    }
}
