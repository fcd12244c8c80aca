//! Portfolio snapshot sources for policy checks.

use async_trait::async_trait;

use super::HarnessResult;
use crate::schema::PortfolioSnapshot;

/// Supplies the current portfolio allocation at check time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn portfolio_snapshot(&self) -> HarnessResult<PortfolioSnapshot>;
}

/// Serves a fixed, configured snapshot.
///
/// Stands in until balances are aggregated from venues and custody.
#[derive(Debug, Clone)]
pub struct StaticSnapshotProvider {
    snapshot: PortfolioSnapshot,
}

impl StaticSnapshotProvider {
    pub fn new(snapshot: PortfolioSnapshot) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl SnapshotProvider for StaticSnapshotProvider {
    async fn portfolio_snapshot(&self) -> HarnessResult<PortfolioSnapshot> {
        Ok(self.snapshot.clone())
    }
}
