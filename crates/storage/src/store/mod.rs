#![forbid(unsafe_code)]

mod cache;
mod cascade;
mod config;
mod copy;
mod delete;
mod error;
mod move_record;
mod observer;
mod paste;
mod position;
mod records;
mod requests;
mod support;
mod types;
mod undo;

pub use cascade::CascadeNode;
pub use config::*;
pub use error::StoreError;
pub use observer::*;
pub use requests::*;
pub use types::*;

use cache::ListingCache;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tg_core::ids::{RecordId, TableName};
use tg_core::{SchemaCatalog, TableShape};

const DB_FILE_NAME: &str = "treegrid.db";

/// Mutation engine bound to one SQLite database.
pub struct SqliteStore {
    conn: Connection,
    storage_dir: Option<PathBuf>,
    engine: Engine,
    cache: ListingCache,
}

/// Everything an operation needs besides the connection. Kept apart from
/// `conn` so a transaction can borrow the connection while helpers read it.
struct Engine {
    catalog: SchemaCatalog,
    observers: Vec<Box<dyn MutationObserver>>,
    cipher: Option<Box<dyn FieldCipher>>,
    undo_period_ms: i64,
}

impl Engine {
    fn shape(&self, table: &TableName) -> Result<&TableShape, StoreError> {
        self.catalog
            .shape_of(table)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }

    fn cipher(&self) -> Option<&dyn FieldCipher> {
        self.cipher.as_deref()
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("storage_dir", &self.storage_dir)
            .field("tables", &self.engine.catalog.len())
            .field("observers", &self.engine.observers.len())
            .field("undo_period_ms", &self.engine.undo_period_ms)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>, catalog: SchemaCatalog) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let conn = Connection::open(storage_dir.join(DB_FILE_NAME))?;
        let mut store = Self::from_connection(conn, catalog)?;
        store.storage_dir = Some(storage_dir);
        Ok(store)
    }

    /// Opens the store described by `config` (storage dir, undo period and
    /// catalog).
    pub fn open_with_config(config: &EngineConfig) -> Result<Self, StoreError> {
        let storage_dir = config
            .storage_dir
            .as_ref()
            .ok_or_else(|| StoreError::Config("storage_dir is not set".to_string()))?;
        let mut store = Self::open(storage_dir, config.tables.clone())?;
        store.set_undo_period(Duration::from_secs(config.undo_period_secs));
        Ok(store)
    }

    pub fn from_connection(conn: Connection, catalog: SchemaCatalog) -> Result<Self, StoreError> {
        catalog
            .validate()
            .map_err(|err| StoreError::Config(err.to_string()))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        support::install_engine_schema(&conn)?;

        tracing::debug!(tables = catalog.len(), "mutation engine ready");
        Ok(Self {
            conn,
            storage_dir: None,
            engine: Engine {
                catalog,
                observers: Vec::new(),
                cipher: None,
                undo_period_ms: DEFAULT_UNDO_PERIOD_SECS.saturating_mul(1000) as i64,
            },
            cache: ListingCache::default(),
        })
    }

    pub fn storage_dir(&self) -> Option<&Path> {
        self.storage_dir.as_deref()
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.engine.catalog
    }

    /// Direct access for statements outside the engine (schema setup,
    /// plain reads).
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Observers run in registration order.
    pub fn add_observer(&mut self, observer: impl MutationObserver + 'static) {
        self.engine.observers.push(Box::new(observer));
    }

    pub fn set_cipher(&mut self, cipher: impl FieldCipher + 'static) {
        self.engine.cipher = Some(Box::new(cipher));
    }

    pub fn set_undo_period(&mut self, period: Duration) {
        self.engine.undo_period_ms = i64::try_from(period.as_millis()).unwrap_or(i64::MAX);
    }

    fn invalidate_tables<'a>(&mut self, tables: impl IntoIterator<Item = &'a TableName>) {
        for table in tables {
            self.cache.invalidate_table(table);
        }
    }
}

fn validate_record_id(id: RecordId) -> Result<RecordId, StoreError> {
    if id <= 0 {
        return Err(StoreError::InvalidInput("record id must be positive"));
    }
    Ok(id)
}
