//! Shared helpers.

pub mod decimal;

pub use decimal::*;
