//! SQLite-backed record store.
//!
//! A single key-value table holds the serialized timer record, one key per
//! tracked timer. The database lives at `~/.config/pagelock/pagelock.db`.

use std::path::Path;

use rusqlite::{params, Connection};

use super::data_dir;
use super::store::RecordStore;
use crate::error::StorageError;
use crate::record::TimerRecord;

const DEFAULT_KEY: &str = "pagelock.timer";

/// SQLite store for the persisted timer record.
pub struct SqliteStore {
    conn: Connection,
    key: String,
}

impl SqliteStore {
    /// Open the store at `~/.config/pagelock/pagelock.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StorageError> {
        let path = data_dir()?.join("pagelock.db");
        Self::open_at(&path)
    }

    /// Open the store at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (for tests).
    #[cfg(test)]
    pub fn open_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory().map_err(StorageError::from)?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        let store = Self {
            conn,
            key: DEFAULT_KEY.to_string(),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Use a non-default record key (one key per tracked timer).
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }
}

impl RecordStore for SqliteStore {
    fn load(&self) -> Result<Option<TimerRecord>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM kv WHERE key = ?1")
            .map_err(StorageError::from)?;
        let result = stmt.query_row(params![self.key], |row| row.get::<_, String>(0));
        match result {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, record: &TimerRecord) -> Result<(), StorageError> {
        let raw = serde_json::to_string(record)?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![self.key, raw],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![self.key])
            .map_err(StorageError::from)?;
        Ok(())
    }
}
