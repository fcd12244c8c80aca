//! Configuration management for the treasury engine.
//!
//! Loads settings from an optional `config` file and `TREASURY__*`
//! environment variables (e.g. `TREASURY__VENUE__API_KEY`).

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::exchange::VenueCredentials;
use crate::schema::{PortfolioSnapshot, RiskBucket};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Memory store backend
    #[serde(default)]
    pub store: StoreConfig,
    /// Market data and order venue
    #[serde(default)]
    pub venue: VenueConfig,
    /// Tick loop settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Portfolio snapshot served to the policy engine
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,
    /// SQLite database file, or root directory for the file backend
    #[serde(default = "default_store_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Venue identifier as it appears in the venue limits
    #[serde(default = "default_venue_name")]
    pub name: String,
    /// API key; empty means paper mode
    #[serde(default)]
    pub api_key: String,
    /// Base64 API secret
    #[serde(default)]
    pub api_secret: String,
    #[serde(default = "default_venue_base_url")]
    pub base_url: String,
    /// Second gate for live order routing, on top of credentials
    #[serde(default)]
    pub live_trading_enabled: bool,
    /// Simulated taker fee for paper fills (0.0-1.0)
    #[serde(default = "default_paper_fee_rate")]
    pub paper_fee_rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between ticks
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
}

/// Placeholder snapshot until real balances are wired in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_total_portfolio")]
    pub total_portfolio_usd: Decimal,
    /// Stablecoin share (0-100)
    #[serde(default = "default_stable_pct")]
    pub stable_pct: Decimal,
    #[serde(default = "default_runway_months")]
    pub runway_months: Decimal,
    /// Share per asset symbol. Keys arrive lowercased from the config
    /// sources and are uppercased in `to_snapshot`.
    #[serde(default)]
    pub asset_pct: HashMap<String, Decimal>,
    #[serde(default)]
    pub venue_pct: HashMap<String, Decimal>,
    #[serde(default)]
    pub bucket_pct: HashMap<RiskBucket, Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_log_prefix")]
    pub file_prefix: String,
}

// Default value functions
fn default_store_backend() -> StoreBackend {
    StoreBackend::Sqlite
}

fn default_store_path() -> String {
    "data/treasury.db".to_string()
}

fn default_venue_name() -> String {
    "kraken".to_string()
}

fn default_venue_base_url() -> String {
    "https://futures.kraken.com".to_string()
}

fn default_paper_fee_rate() -> Decimal {
    Decimal::new(5, 4) // 0.0005 (0.05%)
}

fn default_tick_interval() -> u64 {
    60
}

fn default_total_portfolio() -> Decimal {
    Decimal::new(1_000_000, 0) // $1M
}

fn default_stable_pct() -> Decimal {
    Decimal::new(80, 0)
}

fn default_runway_months() -> Decimal {
    Decimal::new(24, 0)
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_prefix() -> String {
    "treasury-engine.log".to_string()
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("TREASURY"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        let hundred = Decimal::ONE_HUNDRED;

        anyhow::ensure!(
            !self.store.path.trim().is_empty(),
            "store.path must not be empty"
        );

        anyhow::ensure!(
            self.venue.paper_fee_rate >= Decimal::ZERO && self.venue.paper_fee_rate < Decimal::ONE,
            "venue.paper_fee_rate must be between 0 and 1"
        );

        anyhow::ensure!(
            self.scheduler.tick_interval_secs > 0,
            "scheduler.tick_interval_secs must be positive"
        );

        anyhow::ensure!(
            self.snapshot.total_portfolio_usd >= Decimal::ZERO,
            "snapshot.total_portfolio_usd must not be negative"
        );

        anyhow::ensure!(
            self.snapshot.stable_pct >= Decimal::ZERO && self.snapshot.stable_pct <= hundred,
            "snapshot.stable_pct must be between 0 and 100"
        );

        for (symbol, pct) in &self.snapshot.asset_pct {
            anyhow::ensure!(
                *pct >= Decimal::ZERO && *pct <= hundred,
                "snapshot.asset_pct.{} must be between 0 and 100",
                symbol
            );
        }

        Ok(())
    }
}

impl VenueConfig {
    pub fn credentials(&self) -> VenueCredentials {
        VenueCredentials {
            api_key: self.api_key.clone(),
            api_secret: self.api_secret.clone(),
        }
    }
}

impl SnapshotConfig {
    pub fn to_snapshot(&self) -> PortfolioSnapshot {
        PortfolioSnapshot {
            total_portfolio_usd: self.total_portfolio_usd,
            asset_pct: self
                .asset_pct
                .iter()
                .map(|(symbol, pct)| (symbol.to_ascii_uppercase(), *pct))
                .collect(),
            venue_pct: self.venue_pct.clone(),
            bucket_pct: self.bucket_pct.clone(),
            stable_pct: self.stable_pct,
            runway_months: self.runway_months,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            name: default_venue_name(),
            api_key: String::new(),
            api_secret: String::new(),
            base_url: default_venue_base_url(),
            live_trading_enabled: false,
            paper_fee_rate: default_paper_fee_rate(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            total_portfolio_usd: default_total_portfolio(),
            stable_pct: default_stable_pct(),
            runway_months: default_runway_months(),
            asset_pct: HashMap::new(),
            venue_pct: HashMap::new(),
            bucket_pct: HashMap::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            file_prefix: default_log_prefix(),
        }
    }
}
