use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised by a key/value storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("storage is unavailable")]
    Unavailable,

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare storage directory: {0}")]
    Io(#[from] std::io::Error),
}

/// String key/value storage with local-storage semantics
///
/// Values are whole documents; a write replaces whatever was stored
/// under the key.
pub trait KeyValueStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    items: HashMap<String, String>,
    quota: Option<usize>,
    disabled: bool,
}

/// In-process storage
///
/// Clones share the same map, so a fresh store built over a clone
/// sees everything written through the original.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that refuses writes once keys and values exceed `quota` bytes
    pub fn with_quota(quota: usize) -> Self {
        let storage = Self::default();
        storage.lock().quota = Some(quota);
        storage
    }

    /// Simulate storage being switched off (private browsing, policy)
    pub fn set_disabled(&self, disabled: bool) {
        self.lock().disabled = disabled;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // Poisoning is ignored, each write is a single insert or remove
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let inner = self.lock();
        if inner.disabled {
            return Err(StorageError::Unavailable);
        }
        Ok(inner.items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.disabled {
            return Err(StorageError::Unavailable);
        }
        if let Some(quota) = inner.quota {
            let others: usize = inner
                .items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }
        inner.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.disabled {
            return Err(StorageError::Unavailable);
        }
        inner.items.remove(key);
        Ok(())
    }
}

/// SQLite-backed local storage.
/// One row per key, mirroring the browser's local storage on the desktop.
pub struct SqliteStorage {
    conn: Connection,
    db_path: PathBuf,
    quota: Option<usize>,
}

impl SqliteStorage {
    /// Open the storage database in the user's data directory:
    /// - Linux: ~/.local/share/dream-garage/dream_garage.db
    /// - macOS: ~/Library/Application Support/dream-garage/dream_garage.db
    /// - Windows: %APPDATA%\dream-garage\dream_garage.db
    pub fn new() -> Result<Self, StorageError> {
        let db_path = Self::default_db_path().ok_or(StorageError::Unavailable)?;
        Self::open(db_path)
    }

    /// Open or create the storage database at `db_path`
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&db_path)?;
        info!("📁 Garage storage opened at: {}", db_path.display());

        let storage = SqliteStorage {
            conn,
            db_path,
            quota: None,
        };
        storage.init_schema()?;

        Ok(storage)
    }

    /// Limit the total bytes of keys and values, like a browser origin quota
    pub fn with_quota(mut self, quota: Option<usize>) -> Self {
        self.quota = quota;
        self
    }

    /// Where the database lives when no path is configured
    pub fn default_db_path() -> Option<PathBuf> {
        let mut path = dirs::data_dir().or_else(dirs::home_dir)?;
        path.push("dream-garage");
        path.push("dream_garage.db");
        Some(path)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS local_storage (
                key             TEXT PRIMARY KEY,
                value           TEXT NOT NULL,
                updated_at      INTEGER NOT NULL
            )",
            [],
        )?;
        debug!("local_storage schema ready");
        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn bytes_used_excluding(&self, key: &str) -> Result<usize, StorageError> {
        let used: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
             FROM local_storage WHERE key != ?1",
            [key],
            |row| row.get(0),
        )?;
        Ok(used.max(0) as usize)
    }
}

impl KeyValueStorage for SqliteStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota {
            let needed = self.bytes_used_excluding(key)? + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }

        self.conn.execute(
            "INSERT INTO local_storage (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE
             SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![key, value, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM local_storage WHERE key = ?1", [key])?;
        Ok(())
    }
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("db_path", &self.db_path)
            .field("quota", &self.quota)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_clones_share_items() {
        let storage = MemoryStorage::new();
        let reloaded = storage.clone();

        storage.set_item("k", "v").unwrap();
        assert_eq!(reloaded.get_item("k").unwrap().as_deref(), Some("v"));

        reloaded.remove_item("k").unwrap();
        assert_eq!(storage.get_item("k").unwrap(), None);
    }

    #[test]
    fn test_memory_quota_and_disabled() {
        let storage = MemoryStorage::with_quota(10);
        storage.set_item("key", "1234567").unwrap();
        // Replacing a value only counts the new value
        storage.set_item("key", "7654321").unwrap();
        assert!(matches!(
            storage.set_item("key", "12345678"),
            Err(StorageError::QuotaExceeded { needed: 11, quota: 10 })
        ));

        storage.set_disabled(true);
        assert!(matches!(storage.get_item("key"), Err(StorageError::Unavailable)));
    }

    #[test]
    fn test_sqlite_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("garage.db");

        {
            let storage = SqliteStorage::open(&db_path).unwrap();
            storage.set_item("garage", "[1]").unwrap();
            storage.set_item("garage", "[1,2]").unwrap();
        }

        let storage = SqliteStorage::open(&db_path).unwrap();
        assert_eq!(storage.get_item("garage").unwrap().as_deref(), Some("[1,2]"));
        assert_eq!(storage.get_item("missing").unwrap(), None);

        storage.remove_item("garage").unwrap();
        assert_eq!(storage.get_item("garage").unwrap(), None);
    }

    #[test]
    fn test_sqlite_quota_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::open(dir.path().join("q.db"))
            .unwrap()
            .with_quota(Some(16));

        storage.set_item("a", "0123456789").unwrap();
        let err = storage.set_item("b", "0123456789").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { quota: 16, .. }));
        assert_eq!(storage.get_item("b").unwrap(), None);
    }
}
