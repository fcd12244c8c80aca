//! Market data and order venue integrations.
//!
//! ## Paper
//! Simulated fills for every environment without trading credentials. Also
//! serves injected prices/funding rates for offline runs.
//!
//! ## Kraken Futures
//! - Public tickers (mark price, funding rate)
//! - Authenticated market orders (only when live trading is explicitly enabled)
//!
//! `VenueAdapter` picks between the two per configuration.

mod adapter;
mod client;
mod paper;
mod traits;
mod types;

use thiserror::Error;

pub use adapter::VenueAdapter;
pub use client::{KrakenClient, VenueCredentials};
pub use paper::PaperVenue;
pub use traits::{MarketDataProvider, OrderVenue};
#[cfg(test)]
pub use traits::{MockMarketDataProvider, MockOrderVenue};
pub use types::*;

/// Venue faults: transport, API, or decoding failures.
#[derive(Debug, Error)]
pub enum VenueError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Venue API error (status={status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode venue response: {0}")]
    Decode(String),

    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Unsupported instrument: {0}")]
    UnsupportedInstrument(String),
}

pub type VenueResult<T> = std::result::Result<T, VenueError>;
