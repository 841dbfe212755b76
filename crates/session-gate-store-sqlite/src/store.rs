// crates/session-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Durable Storage
// Description: DurableStorage backed by SQLite WAL.
// Purpose: Persist key/value blobs with integrity digests.
// Dependencies: session-gate-core, rusqlite, serde, sha2, thiserror
// ============================================================================

//! ## Overview
//! This module implements [`DurableStorage`] on top of `SQLite`. Every write
//! replaces the value for its key inside one transaction and records a
//! SHA-256 digest of the bytes. Reads re-hash the stored bytes and return
//! [`StorageError::Corrupt`] on mismatch, so a damaged row is never handed to
//! callers as valid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use session_gate_core::DurableStorage;
use session_gate_core::StorageError;
use session_gate_core::runtime::store::MAX_STORAGE_VALUE_BYTES;
use session_gate_core::runtime::store::validate_storage_key;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Lowercase hex alphabet.
const HEX: &[u8; 16] = b"0123456789abcdef";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a configuration with default pragmas for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` storage errors.
#[derive(Debug, Error)]
pub enum SqliteStorageError {
    /// Store I/O error.
    #[error("sqlite storage io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite storage db error: {0}")]
    Db(String),
    /// Digest mismatch or inconsistent rows.
    #[error("sqlite storage corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite storage version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid request or stored data.
    #[error("sqlite storage invalid data: {0}")]
    Invalid(String),
    /// Value exceeded the size limit.
    #[error("sqlite storage value too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStorageError> for StorageError {
    fn from(error: SqliteStorageError) -> Self {
        match error {
            SqliteStorageError::Io(message) => Self::Io(message),
            SqliteStorageError::Db(message) => Self::Unavailable(message),
            SqliteStorageError::Corrupt(message) => Self::Corrupt(message),
            SqliteStorageError::VersionMismatch(message) | SqliteStorageError::Invalid(message) => {
                Self::Invalid(message)
            }
            SqliteStorageError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "value exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed durable storage with WAL support.
#[derive(Clone)]
pub struct SqliteDurableStorage {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteDurableStorage {
    /// Opens (and initializes if needed) the database at `config.path`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStorageError`] when the database cannot be opened or
    /// its schema version is not supported.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStorageError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Reads the value stored for `key`, verifying its digest.
    fn read_value(&self, key: &str) -> Result<Option<Vec<u8>>, SqliteStorageError> {
        validate_storage_key(key).map_err(|err| SqliteStorageError::Invalid(err.to_string()))?;
        let row = {
            let guard = self
                .connection
                .lock()
                .map_err(|_| SqliteStorageError::Db("mutex poisoned".to_string()))?;
            let length: Option<i64> = guard
                .query_row("SELECT length(value) FROM entries WHERE key = ?1", params![key], |row| {
                    row.get(0)
                })
                .optional()
                .map_err(|err| SqliteStorageError::Db(err.to_string()))?;
            match length {
                None => None,
                Some(length) => {
                    let length = usize::try_from(length).map_err(|_| {
                        SqliteStorageError::Corrupt(format!("negative value length for {key}"))
                    })?;
                    if length > MAX_STORAGE_VALUE_BYTES {
                        return Err(SqliteStorageError::TooLarge {
                            max_bytes: MAX_STORAGE_VALUE_BYTES,
                            actual_bytes: length,
                        });
                    }
                    let row: (Vec<u8>, String) = guard
                        .query_row(
                            "SELECT value, value_hash FROM entries WHERE key = ?1",
                            params![key],
                            |row| Ok((row.get(0)?, row.get(1)?)),
                        )
                        .map_err(|err| SqliteStorageError::Db(err.to_string()))?;
                    Some(row)
                }
            }
        };
        let Some((bytes, stored_hash)) = row else {
            return Ok(None);
        };
        if sha256_hex(&bytes) != stored_hash {
            return Err(SqliteStorageError::Corrupt(format!("hash mismatch for {key}")));
        }
        Ok(Some(bytes))
    }

    /// Replaces the value stored for `key`.
    fn write_value(&self, key: &str, bytes: &[u8]) -> Result<(), SqliteStorageError> {
        validate_storage_key(key).map_err(|err| SqliteStorageError::Invalid(err.to_string()))?;
        if bytes.len() > MAX_STORAGE_VALUE_BYTES {
            return Err(SqliteStorageError::TooLarge {
                max_bytes: MAX_STORAGE_VALUE_BYTES,
                actual_bytes: bytes.len(),
            });
        }
        let digest = sha256_hex(bytes);
        let saved_at = unix_millis();
        let mut guard = self
            .connection
            .lock()
            .map_err(|_| SqliteStorageError::Db("mutex poisoned".to_string()))?;
        let tx = guard.transaction().map_err(|err| SqliteStorageError::Db(err.to_string()))?;
        tx.execute(
            "INSERT INTO entries (key, value, value_hash, saved_at) VALUES (?1, ?2, ?3, ?4) ON \
             CONFLICT(key) DO UPDATE SET value = excluded.value, value_hash = \
             excluded.value_hash, saved_at = excluded.saved_at",
            params![key, bytes, digest, saved_at],
        )
        .map_err(|err| SqliteStorageError::Db(err.to_string()))?;
        tx.commit().map_err(|err| SqliteStorageError::Db(err.to_string()))?;
        drop(guard);
        Ok(())
    }
}

impl DurableStorage for SqliteDurableStorage {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.read_value(key).map_err(StorageError::from)
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.write_value(key, bytes).map_err(StorageError::from)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStorageError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStorageError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStorageError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStorageError> {
    let path_string = path.display().to_string();
    if path_string.is_empty() {
        return Err(SqliteStorageError::Invalid("store path must be non-empty".to_string()));
    }
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStorageError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStorageError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStorageError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with durable defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStorageError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStorageError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStorageError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStorageError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStorageError::Db(err.to_string()))?;
    Ok(connection)
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStorageError> {
    let tx = connection.transaction().map_err(|err| SqliteStorageError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStorageError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStorageError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStorageError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS entries (
                    key TEXT PRIMARY KEY,
                    value BLOB NOT NULL,
                    value_hash TEXT NOT NULL,
                    saved_at INTEGER NOT NULL
                );",
            )
            .map_err(|err| SqliteStorageError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStorageError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStorageError::Db(err.to_string()))?;
    Ok(())
}

/// Returns the lowercase hex SHA-256 digest of `bytes`.
fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}

/// Returns the current unix epoch in milliseconds.
fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
