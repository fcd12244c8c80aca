//! Paper/live execution boundary.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::client::KrakenClient;
use super::paper::PaperVenue;
use super::traits::{MarketDataProvider, OrderVenue};
use super::types::*;
use super::VenueResult;
use crate::config::VenueConfig;
use crate::schema::Symbol;

/// Routes market data to a provider and orders to paper or live execution.
///
/// Live routing needs both credentials and `live_trading_enabled`; anything
/// less stays on paper.
pub struct VenueAdapter {
    market: Arc<dyn MarketDataProvider>,
    paper: Arc<PaperVenue>,
    live: Option<Arc<dyn OrderVenue>>,
}

impl VenueAdapter {
    /// Paper-only adapter over any market data source.
    pub fn paper(market: Arc<dyn MarketDataProvider>, paper: Arc<PaperVenue>) -> Self {
        Self {
            market,
            paper,
            live: None,
        }
    }

    /// Adapter with a live order route.
    pub fn live(
        market: Arc<dyn MarketDataProvider>,
        paper: Arc<PaperVenue>,
        live: Arc<dyn OrderVenue>,
    ) -> Self {
        Self {
            market,
            paper,
            live: Some(live),
        }
    }

    /// Build from configuration: Kraken market data, paper or live orders.
    pub fn from_config(config: &VenueConfig) -> VenueResult<Self> {
        let credentials = config.credentials();
        let has_credentials = credentials.is_configured();

        let client = Arc::new(KrakenClient::with_base_url(&config.base_url, credentials)?);
        let paper = Arc::new(PaperVenue::new(config.paper_fee_rate));

        match (has_credentials, config.live_trading_enabled) {
            (true, true) => {
                warn!(venue = %config.name, "LIVE execution enabled - real capital at risk");
                Ok(Self::live(client.clone(), paper, client))
            }
            (true, false) => {
                warn!(
                    venue = %config.name,
                    "Credentials configured but live trading is disabled; staying in paper mode"
                );
                Ok(Self::paper(client, paper))
            }
            (false, live_requested) => {
                if live_requested {
                    warn!(venue = %config.name, "Live trading requested without credentials");
                }
                info!(venue = %config.name, "No venue credentials; paper mode");
                Ok(Self::paper(client, paper))
            }
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        if self.live.is_some() {
            ExecutionMode::Live
        } else {
            ExecutionMode::Paper
        }
    }
}

#[async_trait]
impl MarketDataProvider for VenueAdapter {
    async fn fetch_market_context(&self, symbols: &[Symbol]) -> VenueResult<MarketContext> {
        let ctx = self.market.fetch_market_context(symbols).await?;

        // Keep paper fills priced at the latest observed marks
        if self.live.is_none() {
            self.paper
                .set_market_data(ctx.ticks.clone(), ctx.funding_rates.clone())
                .await;
        }
        Ok(ctx)
    }
}

#[async_trait]
impl OrderVenue for VenueAdapter {
    async fn execute_order(&self, order: &OrderRequest) -> VenueResult<OrderResult> {
        match &self.live {
            Some(live) => live.execute_order(order).await,
            None => self.paper.execute_order(order).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{MockOrderVenue, OrderStatus};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn venue_config(api_key: &str, live: bool) -> VenueConfig {
        VenueConfig {
            api_key: api_key.to_string(),
            api_secret: if api_key.is_empty() {
                String::new()
            } else {
                "c2VjcmV0".to_string()
            },
            live_trading_enabled: live,
            ..Default::default()
        }
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(
            VenueAdapter::from_config(&venue_config("", false)).unwrap().mode(),
            ExecutionMode::Paper
        );
        assert_eq!(
            VenueAdapter::from_config(&venue_config("", true)).unwrap().mode(),
            ExecutionMode::Paper
        );
        assert_eq!(
            VenueAdapter::from_config(&venue_config("key", false)).unwrap().mode(),
            ExecutionMode::Paper
        );
        assert_eq!(
            VenueAdapter::from_config(&venue_config("key", true)).unwrap().mode(),
            ExecutionMode::Live
        );
    }

    #[tokio::test]
    async fn test_paper_mode_never_touches_live_route() {
        let paper = Arc::new(PaperVenue::default());
        let adapter = VenueAdapter::paper(paper.clone(), paper.clone());

        let order = OrderRequest::market("BTC/USD", OrderSide::Buy, dec!(0.5));
        let result = adapter.execute_order(&order).await.unwrap();

        assert_eq!(result.mode, ExecutionMode::Paper);
        assert_eq!(result.filled_amount, dec!(0.5));
        assert_eq!(paper.fills().await.len(), 1);
    }

    #[tokio::test]
    async fn test_live_mode_routes_to_live_venue() {
        let mut live = MockOrderVenue::new();
        live.expect_execute_order().times(1).returning(|order| {
            Ok(OrderResult {
                order_id: "live-1".to_string(),
                symbol: order.symbol.clone(),
                side: order.side,
                order_type: order.order_type,
                status: OrderStatus::Filled,
                requested_amount: order.amount,
                filled_amount: order.amount,
                avg_price: None,
                fee: dec!(0),
                mode: ExecutionMode::Live,
                timestamp: chrono::Utc::now(),
            })
        });

        let paper = Arc::new(PaperVenue::default());
        let adapter = VenueAdapter::live(paper.clone(), paper.clone(), Arc::new(live));

        let order = OrderRequest::market("BTC/USD", OrderSide::Buy, dec!(0.5));
        let result = adapter.execute_order(&order).await.unwrap();

        assert_eq!(result.order_id, "live-1");
        assert!(paper.fills().await.is_empty());
    }

    #[tokio::test]
    async fn test_paper_prices_follow_market_context() {
        let source = Arc::new(PaperVenue::default());
        source
            .set_market_data(
                HashMap::from([("BTC/USD".to_string(), dec!(60000))]),
                HashMap::new(),
            )
            .await;
        let paper = Arc::new(PaperVenue::default());
        let adapter = VenueAdapter::paper(source, paper.clone());

        adapter
            .fetch_market_context(&["BTC/USD".to_string()])
            .await
            .unwrap();
        let fill = adapter
            .execute_order(&OrderRequest::market("BTC/USD", OrderSide::Buy, dec!(1)))
            .await
            .unwrap();

        assert_eq!(fill.avg_price, Some(dec!(60000)));
    }
}
