//! Policy enforcement over projected portfolio allocations.
//!
//! Provides:
//! - `check_policy`: pure evaluation of a proposed action against domain memory
//! - `PolicyEngine`: the same evaluation with tracing and a configurable
//!   long-tail fallback cap
//! - `PolicyEvaluator`: the seam the harness checks proposals through

mod engine;

pub use engine::{check_policy, PolicyEngine, PolicyEvaluator};
