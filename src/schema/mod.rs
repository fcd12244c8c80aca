//! Domain model shared by every component.
//!
//! - `domain`: global treasury policy (allocation caps, venue limits, registry)
//! - `strategy`: per-strategy execution memory and audit log
//! - `policy`: policy check request/result and portfolio snapshot shapes
//!
//! These are plain serde records; behavior lives in the modules that use them.

mod domain;
mod policy;
mod strategy;

pub use domain::*;
pub use policy::*;
pub use strategy::*;

/// Instrument or asset symbol (e.g. `BTC/USD`, `BTC`).
pub type Symbol = String;
