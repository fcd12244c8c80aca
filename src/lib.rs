//! # Treasury Engine
//!
//! Runs pluggable treasury strategies under a central risk policy. Every
//! proposed capital movement is checked against global allocation caps and
//! venue approvals before anything is executed, and every decision lands in
//! the strategy's audit log.
//!
//! ## Architecture
//!
//! - `schema`: Domain memory, strategy memory, and policy request/result types
//! - `persistence`: Memory store trait with SQLite and JSON-file backends
//! - `exchange`: Market data and order venues (paper, Kraken Futures)
//! - `policy`: Allocation and venue checks on projected portfolios
//! - `strategy`: Strategy trait and the funding-basis implementation
//! - `harness`: The gated propose/check/execute cycle
//! - `scheduler`: Periodic, lease-guarded cycles across strategies
//! - `config`: Configuration management and validation
//! - `utils`: Shared decimal helpers

pub mod config;
pub mod exchange;
pub mod harness;
pub mod persistence;
pub mod policy;
pub mod scheduler;
pub mod schema;
pub mod strategy;
pub mod utils;

pub use config::Config;
pub use harness::{CycleOutcome, ExecutionHarness};
