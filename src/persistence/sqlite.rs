//! SQLite-backed memory store.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::{decode, encode, validate_key, MemoryStore, StoreError, StoreResult};
use crate::persistence::default_domain_memory;
use crate::schema::{DomainMemory, StrategyMemory};

const DOMAIN_KEY: &str = "__domain__";
const KIND_DOMAIN: &str = "domain";
const KIND_STRATEGY: &str = "strategy";

/// Stores every record as a JSON document in one table.
pub struct SqliteMemoryStore {
    conn: Mutex<Connection>,
}

impl SqliteMemoryStore {
    /// Open (or create) the database and initialize the schema.
    pub fn new<P: AsRef<Path>>(db_path: P) -> StoreResult<Self> {
        let conn = Connection::open(db_path.as_ref())?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;

        info!("Memory store initialized at {:?}", db_path.as_ref());
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS memory_records (
                key TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_memory_kind ON memory_records(kind);
            "#,
        )?;

        debug!("Memory store schema initialized");
        Ok(())
    }

    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let body = conn
            .query_row(
                "SELECT body FROM memory_records WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(body)
    }

    fn write(&self, key: &str, kind: &str, body: &str) -> StoreResult<()> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            r#"
            INSERT INTO memory_records (key, kind, body, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(key) DO UPDATE SET
                body = ?3,
                updated_at = ?4
            "#,
            params![key, kind, body, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

impl MemoryStore for SqliteMemoryStore {
    fn load_domain_memory(&self) -> StoreResult<DomainMemory> {
        if let Some(body) = self.read(DOMAIN_KEY)? {
            return decode(DOMAIN_KEY, &body);
        }

        warn!("No domain memory found, seeding defaults");
        let memory = default_domain_memory();
        self.save_domain_memory(&memory)?;
        Ok(memory)
    }

    fn save_domain_memory(&self, memory: &DomainMemory) -> StoreResult<()> {
        let body = encode(DOMAIN_KEY, memory)?;
        self.write(DOMAIN_KEY, KIND_DOMAIN, &body)?;
        debug!("Domain memory saved");
        Ok(())
    }

    fn load_strategy_memory(&self, strategy_id: &str) -> StoreResult<Option<StrategyMemory>> {
        validate_key(strategy_id)?;
        match self.read(strategy_id)? {
            Some(body) => decode(strategy_id, &body).map(Some),
            None => Ok(None),
        }
    }

    fn save_strategy_memory(&self, strategy_id: &str, memory: &StrategyMemory) -> StoreResult<()> {
        validate_key(strategy_id)?;
        let body = encode(strategy_id, memory)?;
        self.write(strategy_id, KIND_STRATEGY, &body)?;

        debug!(
            %strategy_id,
            logs = memory.logs.len(),
            num_trades = memory.performance.num_trades,
            "Strategy memory saved"
        );
        Ok(())
    }

    fn list_strategy_ids(&self) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt =
            conn.prepare("SELECT key FROM memory_records WHERE kind = ?1 ORDER BY key")?;

        let ids = stmt
            .query_map(params![KIND_STRATEGY], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}
