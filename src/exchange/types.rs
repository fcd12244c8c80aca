//! Venue-agnostic market and order types, plus Kraken Futures wire shapes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::schema::Symbol;

/// Prices and funding signals for the instruments a strategy asked for.
///
/// Instruments without data are absent, never zero-filled.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketContext {
    pub ticks: HashMap<Symbol, Decimal>,
    /// Relative funding rate per funding period
    pub funding_rates: HashMap<Symbol, Decimal>,
    pub fetched_at: DateTime<Utc>,
}

impl MarketContext {
    pub fn new(ticks: HashMap<Symbol, Decimal>, funding_rates: HashMap<Symbol, Decimal>) -> Self {
        Self {
            ticks,
            funding_rates,
            fetched_at: Utc::now(),
        }
    }

    pub fn price(&self, symbol: &str) -> Option<Decimal> {
        self.ticks.get(symbol).copied()
    }

    pub fn funding_rate(&self, symbol: &str) -> Option<Decimal> {
        self.funding_rates.get(symbol).copied()
    }
}

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Rejected,
}

/// Which path executed an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Paper,
    Live,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Paper => write!(f, "paper"),
            ExecutionMode::Live => write!(f, "live"),
        }
    }
}

/// Order to place. `amount` is in base units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
}

impl OrderRequest {
    pub fn market(symbol: &str, side: OrderSide, amount: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            order_type: OrderType::Market,
            side,
            amount,
            limit_price: None,
        }
    }
}

/// Venue response for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: String,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub requested_amount: Decimal,
    pub filled_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_price: Option<Decimal>,
    pub fee: Decimal,
    pub mode: ExecutionMode,
    pub timestamp: DateTime<Utc>,
}

// ==================== Kraken Futures Wire Types ====================

/// `GET /derivatives/api/v3/tickers`
#[derive(Debug, Clone, Deserialize)]
pub struct KrakenTickersResponse {
    pub result: String,
    #[serde(default)]
    pub tickers: Vec<KrakenTicker>,
}

/// One perpetual or spot ticker.
///
/// `funding_rate` is quoted in quote currency per contract per hour, not as a
/// relative rate; divide by the mark price to normalize.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KrakenTicker {
    pub symbol: String,
    #[serde(default)]
    pub last: Option<Decimal>,
    #[serde(default)]
    pub mark_price: Option<Decimal>,
    #[serde(default)]
    pub funding_rate: Option<Decimal>,
    #[serde(default)]
    pub suspended: bool,
}

/// `POST /derivatives/api/v3/sendorder`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KrakenSendOrderResponse {
    pub result: String,
    #[serde(default)]
    pub send_status: Option<KrakenSendStatus>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KrakenSendStatus {
    #[serde(default, rename = "order_id")]
    pub order_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub order_events: Vec<KrakenOrderEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KrakenOrderEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub price: Option<Decimal>,
}
