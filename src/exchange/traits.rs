//! Venue-agnostic traits for market data and order execution.
//!
//! The harness only ever talks to these two seams, so any venue (or a test
//! double) can stand behind them.

use async_trait::async_trait;

use super::types::{MarketContext, OrderRequest, OrderResult};
use super::VenueResult;
use crate::schema::Symbol;

/// Source of prices and funding signals.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch prices and funding rates for `symbols`.
    ///
    /// Symbols without a price or funding rate are omitted from the
    /// respective map. Only a failure to reach the venue at all is an error.
    async fn fetch_market_context(&self, symbols: &[Symbol]) -> VenueResult<MarketContext>;
}

/// Destination for orders.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderVenue: Send + Sync {
    async fn execute_order(&self, order: &OrderRequest) -> VenueResult<OrderResult>;
}
