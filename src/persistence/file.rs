//! Flat file-per-key JSON memory store.
//!
//! Layout under the root directory:
//! - `domain_memory.json`
//! - `strategies/<strategy_id>.json`

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{decode, encode, validate_key, MemoryStore, StoreError, StoreResult};
use crate::persistence::default_domain_memory;
use crate::schema::{DomainMemory, StrategyMemory};

const DOMAIN_FILE: &str = "domain_memory.json";
const STRATEGY_DIR: &str = "strategies";

/// JSON documents on the local filesystem.
pub struct FileMemoryStore {
    root: PathBuf,
}

impl FileMemoryStore {
    /// Create the store, making the directory tree if needed.
    pub fn new<P: AsRef<Path>>(root: P) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        let strategies = root.join(STRATEGY_DIR);
        fs::create_dir_all(&strategies).map_err(|source| io_error(&strategies, source))?;

        info!("File memory store initialized at {:?}", root);
        Ok(Self { root })
    }

    fn domain_path(&self) -> PathBuf {
        self.root.join(DOMAIN_FILE)
    }

    fn strategy_path(&self, strategy_id: &str) -> PathBuf {
        self.root
            .join(STRATEGY_DIR)
            .join(format!("{strategy_id}.json"))
    }

    fn read(path: &Path) -> StoreResult<Option<String>> {
        match fs::read_to_string(path) {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(path, e)),
        }
    }

    /// Write to a sibling temp file, then rename over the target.
    fn write(path: &Path, body: &str) -> StoreResult<()> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|source| io_error(&tmp, source))?;
        fs::rename(&tmp, path).map_err(|source| io_error(path, source))?;
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl MemoryStore for FileMemoryStore {
    fn load_domain_memory(&self) -> StoreResult<DomainMemory> {
        let path = self.domain_path();
        if let Some(body) = Self::read(&path)? {
            return decode(DOMAIN_FILE, &body);
        }

        warn!(path = %path.display(), "No domain memory found, seeding defaults");
        let memory = default_domain_memory();
        self.save_domain_memory(&memory)?;
        Ok(memory)
    }

    fn save_domain_memory(&self, memory: &DomainMemory) -> StoreResult<()> {
        let body = encode(DOMAIN_FILE, memory)?;
        Self::write(&self.domain_path(), &body)?;
        debug!("Domain memory saved");
        Ok(())
    }

    fn load_strategy_memory(&self, strategy_id: &str) -> StoreResult<Option<StrategyMemory>> {
        validate_key(strategy_id)?;
        match Self::read(&self.strategy_path(strategy_id))? {
            Some(body) => decode(strategy_id, &body).map(Some),
            None => Ok(None),
        }
    }

    fn save_strategy_memory(&self, strategy_id: &str, memory: &StrategyMemory) -> StoreResult<()> {
        validate_key(strategy_id)?;
        let body = encode(strategy_id, memory)?;
        Self::write(&self.strategy_path(strategy_id), &body)?;

        debug!(
            %strategy_id,
            logs = memory.logs.len(),
            num_trades = memory.performance.num_trades,
            "Strategy memory saved"
        );
        Ok(())
    }

    fn list_strategy_ids(&self) -> StoreResult<Vec<String>> {
        let dir = self.root.join(STRATEGY_DIR);
        let entries = fs::read_dir(&dir).map_err(|source| io_error(&dir, source))?;

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry.map_err(|source| io_error(&dir, source))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
