//! Paper venue: simulated fills without moving capital.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::traits::{MarketDataProvider, OrderVenue};
use super::types::*;
use super::VenueResult;
use crate::schema::Symbol;

/// Most recent fills kept in memory.
const DEFAULT_FILL_HISTORY: usize = 500;

/// Simulated venue that fills every order in full.
pub struct PaperVenue {
    order_id_counter: AtomicU64,
    /// Simulated prices (used for fill price and fees)
    prices: Arc<RwLock<HashMap<Symbol, Decimal>>>,
    /// Simulated funding rates
    funding_rates: Arc<RwLock<HashMap<Symbol, Decimal>>>,
    /// Most recent fills, oldest first
    fills: Arc<RwLock<VecDeque<OrderResult>>>,
    fill_history: usize,
    /// Taker fee rate applied to notional when a price is known
    fee_rate: Decimal,
}

impl Default for PaperVenue {
    fn default() -> Self {
        Self::new(dec!(0.0005))
    }
}

impl PaperVenue {
    /// Create a paper venue with the given taker fee rate.
    pub fn new(fee_rate: Decimal) -> Self {
        Self {
            order_id_counter: AtomicU64::new(1),
            prices: Arc::new(RwLock::new(HashMap::new())),
            funding_rates: Arc::new(RwLock::new(HashMap::new())),
            fills: Arc::new(RwLock::new(VecDeque::new())),
            fill_history: DEFAULT_FILL_HISTORY,
            fee_rate,
        }
    }

    /// Keep at most `limit` fills in the ledger.
    pub fn with_fill_history(mut self, limit: usize) -> Self {
        self.fill_history = limit;
        self
    }

    /// Replace simulated market data.
    pub async fn set_market_data(
        &self,
        prices: HashMap<Symbol, Decimal>,
        funding_rates: HashMap<Symbol, Decimal>,
    ) {
        *self.prices.write().await = prices;
        *self.funding_rates.write().await = funding_rates;
    }

    /// Most recent fills, oldest first.
    pub async fn fills(&self) -> Vec<OrderResult> {
        self.fills.read().await.iter().cloned().collect()
    }

    fn next_order_id(&self) -> String {
        let n = self.order_id_counter.fetch_add(1, Ordering::SeqCst);
        format!("paper-{}-{}", n, Utc::now().timestamp_millis())
    }
}

#[async_trait]
impl OrderVenue for PaperVenue {
    async fn execute_order(&self, order: &OrderRequest) -> VenueResult<OrderResult> {
        let price = order
            .limit_price
            .or(self.prices.read().await.get(&order.symbol).copied());
        let fee = price
            .map(|p| order.amount * p * self.fee_rate)
            .unwrap_or(Decimal::ZERO);

        let result = OrderResult {
            order_id: self.next_order_id(),
            symbol: order.symbol.clone(),
            side: order.side,
            order_type: order.order_type,
            status: OrderStatus::Filled,
            requested_amount: order.amount,
            filled_amount: order.amount,
            avg_price: price,
            fee,
            mode: ExecutionMode::Paper,
            timestamp: Utc::now(),
        };

        info!(
            order_id = %result.order_id,
            symbol = %order.symbol,
            side = %order.side,
            amount = %order.amount,
            price = ?price,
            fee = %fee,
            "Paper order filled"
        );

        let mut fills = self.fills.write().await;
        fills.push_back(result.clone());
        while fills.len() > self.fill_history {
            fills.pop_front();
        }
        drop(fills);

        Ok(result)
    }
}

#[async_trait]
impl MarketDataProvider for PaperVenue {
    async fn fetch_market_context(&self, symbols: &[Symbol]) -> VenueResult<MarketContext> {
        let prices = self.prices.read().await;
        let rates = self.funding_rates.read().await;

        let ticks: HashMap<Symbol, Decimal> = symbols
            .iter()
            .filter_map(|s| prices.get(s).map(|p| (s.clone(), *p)))
            .collect();
        let funding_rates: HashMap<Symbol, Decimal> = symbols
            .iter()
            .filter_map(|s| rates.get(s).map(|r| (s.clone(), *r)))
            .collect();

        debug!(
            requested = symbols.len(),
            priced = ticks.len(),
            funded = funding_rates.len(),
            "Paper market context"
        );

        Ok(MarketContext::new(ticks, funding_rates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn venue_with_btc() -> PaperVenue {
        let venue = PaperVenue::new(dec!(0.001));
        venue
            .set_market_data(
                HashMap::from([("BTC/USD".to_string(), dec!(50000))]),
                HashMap::from([("BTC/USD".to_string(), dec!(0.00002))]),
            )
            .await;
        venue
    }

    #[tokio::test]
    async fn test_paper_order_fills_full_amount() {
        let venue = venue_with_btc().await;
        let order = OrderRequest::market("BTC/USD", OrderSide::Buy, dec!(0.02));

        let result = venue.execute_order(&order).await.unwrap();

        assert_eq!(result.status, OrderStatus::Filled);
        assert_eq!(result.filled_amount, dec!(0.02));
        assert_eq!(result.avg_price, Some(dec!(50000)));
        assert_eq!(result.fee, dec!(1)); // 0.02 * 50000 * 0.001
        assert_eq!(result.mode, ExecutionMode::Paper);
        assert!(result.order_id.starts_with("paper-1-"));
    }

    #[tokio::test]
    async fn test_paper_order_without_price_still_fills() {
        let venue = PaperVenue::default();
        let order = OrderRequest::market("DOGE/USD", OrderSide::Sell, dec!(1000));

        let result = venue.execute_order(&order).await.unwrap();

        assert_eq!(result.status, OrderStatus::Filled);
        assert_eq!(result.filled_amount, dec!(1000));
        assert_eq!(result.avg_price, None);
        assert_eq!(result.fee, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_order_ids_unique_and_fills_recorded() {
        let venue = venue_with_btc().await;
        let order = OrderRequest::market("BTC/USD", OrderSide::Buy, dec!(0.01));

        let a = venue.execute_order(&order).await.unwrap();
        let b = venue.execute_order(&order).await.unwrap();

        assert_ne!(a.order_id, b.order_id);
        assert_eq!(venue.fills().await.len(), 2);
    }

    #[tokio::test]
    async fn test_fill_ledger_keeps_most_recent() {
        let venue = venue_with_btc().await.with_fill_history(2);
        let order = OrderRequest::market("BTC/USD", OrderSide::Buy, dec!(0.01));

        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(venue.execute_order(&order).await.unwrap().order_id);
        }

        let fills = venue.fills().await;
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].order_id, ids[3]);
        assert_eq!(fills[1].order_id, ids[4]);
    }

    #[tokio::test]
    async fn test_market_context_omits_unknown_symbols() {
        let venue = venue_with_btc().await;
        let symbols = vec!["BTC/USD".to_string(), "ETH/USD".to_string()];

        let ctx = venue.fetch_market_context(&symbols).await.unwrap();

        assert_eq!(ctx.ticks.len(), 1);
        assert_eq!(ctx.funding_rate("BTC/USD"), Some(dec!(0.00002)));
        assert!(!ctx.ticks.contains_key("ETH/USD"));
        assert!(!ctx.funding_rates.contains_key("ETH/USD"));
    }
}
