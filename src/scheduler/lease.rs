//! Per-strategy in-flight leases.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Set of strategy ids with a cycle in flight.
///
/// The memory store has no locking of its own, so every read-modify-write
/// cycle must hold the lease for its id.
#[derive(Debug, Clone, Default)]
pub struct LeaseTable {
    held: Arc<Mutex<HashSet<String>>>,
}

impl LeaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lease for `strategy_id`; `None` if already held.
    pub fn try_acquire(&self, strategy_id: &str) -> Option<Lease> {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if !held.insert(strategy_id.to_string()) {
            return None;
        }
        Some(Lease {
            table: self.held.clone(),
            strategy_id: strategy_id.to_string(),
        })
    }

    pub fn is_held(&self, strategy_id: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(strategy_id)
    }
}

/// Released on drop.
#[derive(Debug)]
pub struct Lease {
    table: Arc<Mutex<HashSet<String>>>,
    strategy_id: String,
}

impl Lease {
    pub fn strategy_id(&self) -> &str {
        &self.strategy_id
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.table
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.strategy_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_is_exclusive_until_dropped() {
        let table = LeaseTable::new();

        let lease = table.try_acquire("basis-btc").unwrap();
        assert_eq!(lease.strategy_id(), "basis-btc");
        assert!(table.is_held("basis-btc"));
        assert!(table.try_acquire("basis-btc").is_none());
        assert!(table.try_acquire("basis-eth").is_some());

        drop(lease);
        assert!(!table.is_held("basis-btc"));
        assert!(table.try_acquire("basis-btc").is_some());
    }
}
