// crates/session-gate-core/src/runtime/store.rs
// ============================================================================
// Module: Session Gate Durable Storage Backends
// Description: In-memory and file-backed durable storage implementations.
// Purpose: Provide storage backends without a database dependency.
// Dependencies: crate::interfaces, tempfile
// ============================================================================

//! ## Overview
//! This module provides an in-memory [`DurableStorage`] for tests and demos,
//! a directory-backed store that replaces files atomically, and a shared
//! wrapper so a single backend can be handed to several owners.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tempfile::NamedTempFile;

use crate::interfaces::DurableStorage;
use crate::interfaces::StorageError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of a storage key.
pub const MAX_STORAGE_KEY_LENGTH: usize = 128;
/// Maximum size of a single stored value in bytes.
pub const MAX_STORAGE_VALUE_BYTES: usize = 1024 * 1024;
/// File extension used by the file-backed store.
const FILE_EXTENSION: &str = "json";

// ============================================================================
// SECTION: In-Memory Storage
// ============================================================================

/// In-memory durable storage for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDurableStorage {
    /// Stored values protected by a mutex.
    entries: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    /// When set, writes fail as if storage were full.
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryDurableStorage {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with one entry.
    #[must_use]
    pub fn with_entry(key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(key.into(), bytes.into());
        Self {
            entries: Arc::new(Mutex::new(entries)),
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl DurableStorage for InMemoryDurableStorage {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| StorageError::Io("durable storage mutex poisoned".to_string()))?;
        Ok(guard.get(key).cloned())
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("in-memory storage rejected write".to_string()));
        }
        self.entries
            .lock()
            .map_err(|_| StorageError::Io("durable storage mutex poisoned".to_string()))?
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

// ============================================================================
// SECTION: File Storage
// ============================================================================

/// Directory-backed durable storage; one file per key.
///
/// # Invariants
/// - Writes replace the target file atomically, so readers never observe a
///   partially written value.
#[derive(Debug, Clone)]
pub struct FileDurableStorage {
    /// Directory holding one file per key.
    root: PathBuf,
}

impl FileDurableStorage {
    /// Opens (and creates if needed) a storage directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the root is not a usable directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        if root.exists() && !root.is_dir() {
            return Err(StorageError::Invalid("storage root must be a directory".to_string()));
        }
        fs::create_dir_all(&root).map_err(|err| map_io_error(&err))?;
        Ok(Self {
            root,
        })
    }

    /// Returns the storage directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves the file path for a validated key.
    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_storage_key(key)?;
        Ok(self.root.join(format!("{key}.{FILE_EXTENSION}")))
    }
}

impl DurableStorage for FileDurableStorage {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(map_io_error(&err)),
        };
        let length = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if length > MAX_STORAGE_VALUE_BYTES {
            return Err(StorageError::Invalid(format!(
                "stored value exceeds size limit: {length} bytes (max {MAX_STORAGE_VALUE_BYTES})"
            )));
        }
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(map_io_error(&err)),
        }
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if bytes.len() > MAX_STORAGE_VALUE_BYTES {
            return Err(StorageError::Invalid(format!(
                "value exceeds size limit: {} bytes (max {MAX_STORAGE_VALUE_BYTES})",
                bytes.len()
            )));
        }
        let mut temp = NamedTempFile::new_in(&self.root).map_err(|err| map_io_error(&err))?;
        temp.write_all(bytes).map_err(|err| map_io_error(&err))?;
        temp.as_file().sync_all().map_err(|err| map_io_error(&err))?;
        temp.persist(&path).map_err(|err| map_io_error(&err.error))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Shared Storage Wrapper
// ============================================================================

/// Shared durable storage backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedDurableStorage {
    /// Inner storage implementation.
    inner: Arc<dyn DurableStorage + Send + Sync>,
}

impl SharedDurableStorage {
    /// Wraps a storage backend in a shared, clonable wrapper.
    #[must_use]
    pub fn from_storage(storage: impl DurableStorage + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(storage),
        }
    }

    /// Wraps an existing shared backend.
    #[must_use]
    pub const fn new(storage: Arc<dyn DurableStorage + Send + Sync>) -> Self {
        Self {
            inner: storage,
        }
    }
}

impl DurableStorage for SharedDurableStorage {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.inner.read(key)
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.inner.write(key, bytes)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates a storage key for use as a file name or table key.
///
/// # Errors
///
/// Returns [`StorageError::Invalid`] when the key is empty, overlong, starts
/// with a dot, or contains characters outside `[A-Za-z0-9_.-]`.
pub fn validate_storage_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::Invalid("storage key must be non-empty".to_string()));
    }
    if key.len() > MAX_STORAGE_KEY_LENGTH {
        return Err(StorageError::Invalid("storage key exceeds length limit".to_string()));
    }
    if key.starts_with('.') {
        return Err(StorageError::Invalid("storage key must not start with a dot".to_string()));
    }
    if !key.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.')) {
        return Err(StorageError::Invalid(
            "storage key contains disallowed characters".to_string(),
        ));
    }
    Ok(())
}

/// Maps an I/O error onto the storage error taxonomy.
fn map_io_error(err: &io::Error) -> StorageError {
    match err.kind() {
        io::ErrorKind::StorageFull
        | io::ErrorKind::PermissionDenied
        | io::ErrorKind::ReadOnlyFilesystem => StorageError::Unavailable(err.to_string()),
        _ => StorageError::Io(err.to_string()),
    }
}
