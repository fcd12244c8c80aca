//! Kraken Futures REST client.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256, Sha512};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::traits::{MarketDataProvider, OrderVenue};
use super::types::*;
use super::{VenueError, VenueResult};
use crate::schema::Symbol;

const FUTURES_BASE_URL: &str = "https://futures.kraken.com";
const TICKERS_PATH: &str = "/derivatives/api/v3/tickers";
const SEND_ORDER_PATH: &str = "/derivatives/api/v3/sendorder";

/// API key pair. Both halves must be present for live trading.
#[derive(Debug, Clone, Default)]
pub struct VenueCredentials {
    pub api_key: String,
    /// Base64-encoded API secret
    pub api_secret: String,
}

impl VenueCredentials {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_secret.trim().is_empty()
    }
}

/// Kraken Futures client for perpetual market data and market orders.
#[derive(Debug, Clone)]
pub struct KrakenClient {
    http: Client,
    base_url: String,
    credentials: VenueCredentials,
}

impl KrakenClient {
    /// Create a client against production.
    pub fn new(credentials: VenueCredentials) -> VenueResult<Self> {
        Self::with_base_url(FUTURES_BASE_URL, credentials)
    }

    /// Create a client against a custom base URL.
    pub fn with_base_url(base_url: &str, credentials: VenueCredentials) -> VenueResult<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Map a `BASE/QUOTE` pair to the Kraken perpetual symbol.
    ///
    /// Kraken lists bitcoin as XBT: `BTC/USD` -> `PF_XBTUSD`.
    pub fn perpetual_symbol(pair: &str) -> Option<String> {
        let (base, quote) = pair.split_once('/')?;
        if base.is_empty() || quote.is_empty() {
            return None;
        }
        let base = match base.to_ascii_uppercase().as_str() {
            "BTC" => "XBT".to_string(),
            other => other.to_string(),
        };
        Some(format!("PF_{}{}", base, quote.to_ascii_uppercase()))
    }

    /// Sign a private request.
    ///
    /// `Authent = base64(HMAC-SHA512(base64_decode(secret), SHA256(post_data + nonce + path)))`
    /// where `path` omits the `/derivatives` prefix.
    fn sign(&self, endpoint_path: &str, post_data: &str, nonce: &str) -> VenueResult<String> {
        let secret = BASE64
            .decode(self.credentials.api_secret.trim())
            .map_err(|e| VenueError::Credentials(format!("API secret is not base64: {e}")))?;

        let mut hasher = Sha256::new();
        hasher.update(post_data.as_bytes());
        hasher.update(nonce.as_bytes());
        hasher.update(endpoint_path.trim_start_matches("/derivatives").as_bytes());
        let digest = hasher.finalize();

        let mut mac = Hmac::<Sha512>::new_from_slice(&secret)
            .map_err(|e| VenueError::Credentials(e.to_string()))?;
        mac.update(&digest);
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    // ==================== Market Data (Public) ====================

    /// Get all tickers.
    #[instrument(skip(self))]
    pub async fn get_tickers(&self) -> VenueResult<Vec<KrakenTicker>> {
        let url = format!("{}{}", self.base_url, TICKERS_PATH);
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VenueError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: KrakenTickersResponse = response
            .json()
            .await
            .map_err(|e| VenueError::Decode(e.to_string()))?;

        if data.result != "success" {
            return Err(VenueError::Api {
                status: status.as_u16(),
                message: format!("tickers result: {}", data.result),
            });
        }

        debug!("Fetched {} tickers from Kraken", data.tickers.len());
        Ok(data.tickers)
    }

    // ==================== Orders (Authenticated) ====================

    /// Place an order.
    #[instrument(skip(self))]
    pub async fn send_order(&self, order: &OrderRequest) -> VenueResult<OrderResult> {
        if !self.credentials.is_configured() {
            return Err(VenueError::Credentials(
                "API key and secret are required for order placement".to_string(),
            ));
        }

        let symbol = Self::perpetual_symbol(&order.symbol)
            .ok_or_else(|| VenueError::UnsupportedInstrument(order.symbol.clone()))?;

        let mut post_data = match (order.order_type, order.limit_price) {
            (OrderType::Limit, Some(price)) => format!("orderType=lmt&limitPrice={price}"),
            (OrderType::Limit, None) => {
                return Err(VenueError::Rejected(
                    "limit order without limit price".to_string(),
                ))
            }
            (OrderType::Market, _) => "orderType=mkt".to_string(),
        };
        post_data.push_str(&format!(
            "&symbol={}&side={}&size={}",
            urlencoding::encode(&symbol),
            order.side,
            order.amount
        ));

        let nonce = Utc::now().timestamp_millis().to_string();
        let authent = self.sign(SEND_ORDER_PATH, &post_data, &nonce)?;

        let url = format!("{}{}", self.base_url, SEND_ORDER_PATH);
        let response = self
            .http
            .post(&url)
            .header("APIKey", &self.credentials.api_key)
            .header("Nonce", &nonce)
            .header("Authent", authent)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(post_data)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VenueError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: KrakenSendOrderResponse = response
            .json()
            .await
            .map_err(|e| VenueError::Decode(e.to_string()))?;

        if data.result != "success" {
            return Err(VenueError::Api {
                status: status.as_u16(),
                message: data.error.unwrap_or(data.result),
            });
        }

        let send_status = data
            .send_status
            .ok_or_else(|| VenueError::Decode("missing sendStatus".to_string()))?;
        if send_status.status != "placed" {
            warn!(symbol = %order.symbol, status = %send_status.status, "Kraken rejected order");
            return Err(VenueError::Rejected(send_status.status));
        }

        let result = Self::order_result(order, send_status);
        info!(
            order_id = %result.order_id,
            symbol = %order.symbol,
            side = %order.side,
            filled = %result.filled_amount,
            "Live order placed"
        );
        Ok(result)
    }

    /// Fold execution events into a fill summary.
    fn order_result(order: &OrderRequest, send_status: KrakenSendStatus) -> OrderResult {
        let (filled, notional) = send_status
            .order_events
            .iter()
            .filter(|e| e.event_type == "EXECUTION")
            .fold((Decimal::ZERO, Decimal::ZERO), |(qty, notional), e| {
                let amount = e.amount.unwrap_or(Decimal::ZERO);
                let price = e.price.unwrap_or(Decimal::ZERO);
                (qty + amount, notional + amount * price)
            });

        let status = if filled >= order.amount {
            OrderStatus::Filled
        } else if filled > Decimal::ZERO {
            OrderStatus::PartiallyFilled
        } else {
            OrderStatus::New
        };

        OrderResult {
            order_id: send_status.order_id.unwrap_or_default(),
            symbol: order.symbol.clone(),
            side: order.side,
            order_type: order.order_type,
            status,
            requested_amount: order.amount,
            filled_amount: filled,
            avg_price: (filled > Decimal::ZERO).then(|| notional / filled),
            fee: Decimal::ZERO,
            mode: ExecutionMode::Live,
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
impl MarketDataProvider for KrakenClient {
    async fn fetch_market_context(&self, symbols: &[Symbol]) -> VenueResult<MarketContext> {
        let tickers: HashMap<String, KrakenTicker> = self
            .get_tickers()
            .await?
            .into_iter()
            .filter(|t| !t.suspended)
            .map(|t| (t.symbol.clone(), t))
            .collect();

        let mut ticks = HashMap::new();
        let mut funding_rates = HashMap::new();

        for pair in symbols {
            let Some(ticker) = Self::perpetual_symbol(pair).and_then(|s| tickers.get(&s)) else {
                debug!(%pair, "No Kraken ticker for instrument");
                continue;
            };

            let price = ticker
                .mark_price
                .or(ticker.last)
                .filter(|p| *p > Decimal::ZERO);
            if let Some(price) = price {
                ticks.insert(pair.clone(), price);
                if let Some(rate) = ticker.funding_rate {
                    funding_rates.insert(pair.clone(), rate / price);
                }
            }
        }

        Ok(MarketContext::new(ticks, funding_rates))
    }
}

#[async_trait]
impl OrderVenue for KrakenClient {
    async fn execute_order(&self, order: &OrderRequest) -> VenueResult<OrderResult> {
        self.send_order(order).await
    }
}
