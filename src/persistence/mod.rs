//! Durable memory for the treasury engine.
//!
//! Persists two kinds of record:
//! - One global domain memory (allocation policy, venue limits, registry)
//! - One strategy memory per strategy id (meta, config, performance, state, logs)
//!
//! Saves are whole-record overwrites. The store provides no mutual exclusion;
//! callers must keep at most one read-modify-write in flight per strategy id.

mod defaults;
mod file;
mod sqlite;

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};
use crate::schema::{DomainMemory, StrategyMemory};

pub use defaults::{default_domain_memory, default_funding_basis_memory, seed_strategy_memory};
pub use file::FileMemoryStore;
pub use sqlite::SqliteMemoryStore;

/// Storage faults. These are hard failures for a cycle.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Malformed record {key}: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),

    #[error("Storage lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Key-value persistence for domain and strategy memory.
pub trait MemoryStore: Send + Sync {
    /// Load the global record, seeding the default on first access.
    fn load_domain_memory(&self) -> StoreResult<DomainMemory>;

    fn save_domain_memory(&self, memory: &DomainMemory) -> StoreResult<()>;

    /// Load a strategy record; `None` means not provisioned.
    fn load_strategy_memory(&self, strategy_id: &str) -> StoreResult<Option<StrategyMemory>>;

    fn save_strategy_memory(&self, strategy_id: &str, memory: &StrategyMemory) -> StoreResult<()>;

    /// Ids of every provisioned strategy, sorted.
    fn list_strategy_ids(&self) -> StoreResult<Vec<String>>;
}

/// Open the configured backend, creating parent directories as needed.
pub fn open_store(config: &StoreConfig) -> StoreResult<Arc<dyn MemoryStore>> {
    let path = Path::new(&config.path);

    match config.backend {
        StoreBackend::Sqlite => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
            Ok(Arc::new(SqliteMemoryStore::new(path)?))
        }
        StoreBackend::File => Ok(Arc::new(FileMemoryStore::new(path)?)),
    }
}

/// Reject ids that cannot be used as a stable storage key.
pub(crate) fn validate_key(strategy_id: &str) -> StoreResult<()> {
    let bad = strategy_id.is_empty()
        || strategy_id.starts_with("__")
        || strategy_id.contains('/')
        || strategy_id.contains('\\')
        || strategy_id.contains("..")
        || strategy_id.chars().any(char::is_control);

    if bad {
        return Err(StoreError::InvalidKey(strategy_id.to_string()));
    }
    Ok(())
}

fn decode<T: serde::de::DeserializeOwned>(key: &str, body: &str) -> StoreResult<T> {
    serde_json::from_str(body).map_err(|source| StoreError::Malformed {
        key: key.to_string(),
        source,
    })
}

fn encode<T: serde::Serialize>(key: &str, value: &T) -> StoreResult<String> {
    serde_json::to_string_pretty(value).map_err(|source| StoreError::Malformed {
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("basis-btc").is_ok());
        assert!(validate_key("basis_eth.v2").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("__domain__").is_err());
    }

    #[test]
    fn test_open_store_creates_backends() {
        let dir = tempfile::tempdir().unwrap();

        for (backend, path) in [
            (StoreBackend::Sqlite, dir.path().join("nested/treasury.db")),
            (StoreBackend::File, dir.path().join("memory")),
        ] {
            let store = open_store(&StoreConfig {
                backend,
                path: path.display().to_string(),
            })
            .unwrap();

            let domain = store.load_domain_memory().unwrap();
            assert_eq!(domain, default_domain_memory());
            assert!(store.list_strategy_ids().unwrap().is_empty());
        }
    }
}
